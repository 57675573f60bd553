//! The hub-side reconciliation loops. Each controller is an independent
//! queue-worker over a watch stream; items for the same object are
//! serialized, different objects reconcile in parallel, and nothing is
//! shared between reconciliations beyond the apiserver.

use std::sync::Arc;

use futures::StreamExt;
use kube::{
    Api, Client,
    runtime::{Controller, watcher},
};
use workflow_multicluster_api::{
    status_result::WorkflowStatusResult, work::ManifestWork, workflow::Workflow,
};

use crate::{StatusSyncSource, logging::report_controller_reconciled, namespace::WatchNamespace};

pub mod dispatch;
pub mod feedback;
pub mod placement;
pub mod status;

/// Runs the placement, dispatch and status ingress controllers until a
/// termination signal arrives. Which ingress variant runs is a deployment
/// choice; the two are mutually exclusive.
pub async fn run(client: Client, watch_namespace: &WatchNamespace, status_sync: StatusSyncSource) {
    let workflows: Api<Workflow> = watch_namespace.get_api(&client);

    let placement_controller = Controller::new(workflows.clone(), watcher::Config::default())
        .shutdown_on_signal()
        .run(
            placement::reconcile,
            placement::error_policy,
            Arc::new(placement::Ctx {
                client: client.clone(),
            }),
        )
        .for_each(|result| async move {
            report_controller_reconciled("workflow-placement", &result);
        });

    let dispatch_controller = Controller::new(workflows, watcher::Config::default())
        .shutdown_on_signal()
        .run(
            dispatch::reconcile,
            dispatch::error_policy,
            Arc::new(dispatch::Ctx {
                client: client.clone(),
                status_sync,
            }),
        )
        .for_each(|result| async move {
            report_controller_reconciled("workflow-dispatch", &result);
        });

    match status_sync {
        StatusSyncSource::StatusResults => {
            futures::join!(
                placement_controller,
                dispatch_controller,
                run_status_ingress(client),
            );
        }
        StatusSyncSource::WorkFeedback => {
            let works: Api<ManifestWork> = Api::all(client.clone());
            let feedback_controller = Controller::new(works, watcher::Config::default())
                .shutdown_on_signal()
                .run(
                    feedback::reconcile,
                    feedback::error_policy,
                    Arc::new(feedback::Ctx { client }),
                )
                .for_each(|result| async move {
                    report_controller_reconciled("workflow-status-feedback", &result);
                });

            futures::join!(placement_controller, dispatch_controller, feedback_controller);
        }
    }
}

/// Runs the result-path status ingress on its own. Used by the hub operator
/// and by the status-sync addon's `manager` subcommand, which binds this
/// controller standalone.
pub async fn run_status_ingress(client: Client) {
    let results: Api<WorkflowStatusResult> = Api::all(client.clone());

    Controller::new(results, watcher::Config::default())
        .shutdown_on_signal()
        .run(
            status::reconcile,
            status::error_policy,
            Arc::new(status::Ctx { client }),
        )
        .for_each(|result| async move {
            report_controller_reconciled("workflow-status", &result);
        })
        .await;
}
