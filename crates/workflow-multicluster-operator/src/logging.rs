//! Logging setup for the binaries, plus the per-event reconcile reporter the
//! controller loops feed their results into.

use std::path::PathBuf;

use kube::runtime::{controller, reflector::ObjectRef};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes `tracing` logging with options from the environment variable
/// given in the `env` parameter.
///
/// We force callers to provide a variable name so it can be different per
/// binary, the product name plus `_LOG`, e.g. `WORKFLOW_MULTICLUSTER_OPERATOR_LOG`.
/// If no environment variable is provided, the maximum log level is set to INFO.
///
/// Log output can be copied to a file by setting `{env}_DIRECTORY` to a
/// directory path. This file will be rotated regularly.
pub fn initialize_logging(env: &str, app_name: &str) {
    let filter = match EnvFilter::try_from_env(env) {
        Ok(env_filter) => env_filter,
        _ => EnvFilter::try_new(tracing::Level::INFO.to_string())
            .expect("Failed to initialize default tracing level to INFO"),
    };

    let terminal_fmt = tracing_subscriber::fmt::layer();

    let file_appender_directory = std::env::var_os(format!("{env}_DIRECTORY")).map(PathBuf::from);
    let file_fmt = file_appender_directory.as_deref().map(|log_dir| {
        let file_appender = RollingFileAppender::builder()
            .rotation(Rotation::HOURLY)
            .filename_prefix(app_name.to_string())
            .filename_suffix("tracing-rs.json")
            .max_log_files(6)
            .build(log_dir)
            .expect("failed to initialize rolling file appender");
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(file_appender)
    });

    Registry::default()
        .with(filter)
        .with(terminal_fmt)
        .with(file_fmt)
        .init();

    // need to delay logging until after tracing is initialized
    match file_appender_directory {
        Some(dir) => tracing::info!(directory = %dir.display(), "file logging enabled"),
        None => tracing::debug!("file logging disabled, because no log directory set"),
    }
}

/// Logs the outcome of a single reconciliation, keyed by controller name.
pub fn report_controller_reconciled<K, ReconcileErr, QueueErr>(
    controller: &str,
    result: &Result<(ObjectRef<K>, controller::Action), controller::Error<ReconcileErr, QueueErr>>,
) where
    K: kube::Resource,
    ReconcileErr: std::error::Error + 'static,
    QueueErr: std::error::Error + 'static,
{
    match result {
        Ok((object, _)) => {
            tracing::info!(controller.name = %controller, object = %object, "Reconciled object");
        }
        Err(error) => {
            tracing::error!(
                controller.name = %controller,
                error = error as &dyn std::error::Error,
                "Failed to reconcile object",
            );
        }
    }
}
