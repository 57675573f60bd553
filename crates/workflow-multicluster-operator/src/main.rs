use clap::Parser;
use kube::Client;
use snafu::{ResultExt, Snafu};
use workflow_multicluster_operator::{
    StatusSyncSource, controllers, install,
    logging::initialize_logging,
    namespace::WatchNamespace,
};

pub const APP_NAME: &str = "workflow-multicluster-operator";

const ENV_VAR_LOG: &str = "WORKFLOW_MULTICLUSTER_OPERATOR_LOG";

#[derive(Debug, Parser)]
#[command(about = "Propagates Argo Workflows from a hub cluster to managed clusters")]
enum Command {
    /// Run the hub controllers.
    Run(RunArguments),

    /// Apply the embedded install bundle to the hub cluster.
    Install,
}

#[derive(Debug, clap::Args)]
struct RunArguments {
    /// Provides a specific namespace to watch (instead of watching all namespaces)
    #[arg(long, env, default_value = "")]
    watch_namespace: WatchNamespace,

    /// Which channel reports workflow status back to the hub
    #[arg(long, env, value_enum, default_value_t = StatusSyncSource::StatusResults)]
    status_sync: StatusSyncSource,
}

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to create the Kubernetes client"))]
    CreateClient { source: kube::Error },

    #[snafu(display("failed to apply the install bundle"))]
    ApplyInstallBundle { source: install::Error },
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), Error> {
    let command = Command::parse();
    initialize_logging(ENV_VAR_LOG, APP_NAME);

    let client = Client::try_default().await.context(CreateClientSnafu)?;

    match command {
        Command::Install => {
            install::apply_bundle(&client)
                .await
                .context(ApplyInstallBundleSnafu)?;
        }
        Command::Run(arguments) => {
            tracing::info!(
                status_sync = %arguments.status_sync,
                "starting hub controllers",
            );
            controllers::run(client, &arguments.watch_namespace, arguments.status_sync).await;
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
