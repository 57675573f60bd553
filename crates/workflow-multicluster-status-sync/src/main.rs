use std::path::{Path, PathBuf};

use clap::Parser;
use kube::{
    Client, Config,
    config::{KubeConfigOptions, Kubeconfig},
};
use snafu::{ResultExt, Snafu};
use workflow_multicluster_operator::{controllers, logging::initialize_logging};

mod agent;

pub const APP_NAME: &str = "status-sync-addon";

const ENV_VAR_LOG: &str = "STATUS_SYNC_ADDON_LOG";

#[derive(Debug, Parser)]
#[command(about = "Syncs executing Workflow status from managed clusters back to the hub")]
enum Command {
    /// Run the hub-side status ingress.
    Manager,

    /// Run the status agent on a managed cluster.
    Agent(AgentArguments),
}

#[derive(Debug, clap::Args)]
struct AgentArguments {
    /// Name of the managed cluster this agent runs on; status records are
    /// published into the hub namespace of the same name
    #[arg(long, env)]
    cluster_name: String,

    /// Path to a kubeconfig granting access to the hub cluster
    #[arg(long, env)]
    hub_kubeconfig: PathBuf,
}

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to create the Kubernetes client"))]
    CreateClient { source: kube::Error },

    #[snafu(display("failed to read the hub kubeconfig at {path:?}"))]
    ReadHubKubeconfig {
        source: kube::config::KubeconfigError,
        path: PathBuf,
    },

    #[snafu(display("failed to load the hub kubeconfig"))]
    LoadHubKubeconfig { source: kube::config::KubeconfigError },

    #[snafu(display("failed to create the hub Kubernetes client"))]
    CreateHubClient { source: kube::Error },
}

async fn hub_client(path: &Path) -> Result<Client, Error> {
    let kubeconfig = Kubeconfig::read_from(path).context(ReadHubKubeconfigSnafu { path })?;
    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .context(LoadHubKubeconfigSnafu)?;

    Client::try_from(config).context(CreateHubClientSnafu)
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), Error> {
    let command = Command::parse();
    initialize_logging(ENV_VAR_LOG, APP_NAME);

    match command {
        Command::Manager => {
            let client = Client::try_default().await.context(CreateClientSnafu)?;
            tracing::info!("starting hub status ingress");
            controllers::run_status_ingress(client).await;
        }
        Command::Agent(arguments) => {
            let spoke_client = Client::try_default().await.context(CreateClientSnafu)?;
            let hub_client = hub_client(&arguments.hub_kubeconfig).await?;
            tracing::info!(cluster = %arguments.cluster_name, "starting status agent");
            agent::run(spoke_client, hub_client, arguments.cluster_name).await;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;

        Command::command().debug_assert();
    }
}
