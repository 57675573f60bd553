//! The managed-cluster status agent: watches local Workflows that reference
//! a dormant hub Workflow and publishes their observed status as
//! WorkflowStatusResult records into this cluster's namespace on the hub.
//!
//! The agent only ever writes WorkflowStatusResults in its own cluster
//! namespace; the hub-side status ingress takes it from there.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use futures::StreamExt;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{
    Api, Client, Resource, ResourceExt,
    api::PostParams,
    runtime::{Controller, controller::Action, watcher},
};
use snafu::{OptionExt, ResultExt, Snafu};
use workflow_multicluster_api::{
    constants::{ANNOTATION_KEY_HUB_WORKFLOW_NAME, ANNOTATION_KEY_HUB_WORKFLOW_NAMESPACE},
    helpers::{contains_valid_hub_workflow_uid_annotation, generate_status_result_name},
    status_result::WorkflowStatusResult,
    workflow::Workflow,
};
use workflow_multicluster_operator::logging::report_controller_reconciled;

pub struct Ctx {
    pub spoke_client: Client,
    pub hub_client: Client,
    pub cluster_name: String,
}

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Workflow has no namespace set"))]
    NoNamespace,

    #[snafu(display("failed to fetch Workflow {workflow:?}"))]
    GetWorkflow {
        source: kube::Error,
        workflow: String,
    },

    #[snafu(display("failed to fetch hub WorkflowStatusResult {result:?}"))]
    GetStatusResult {
        source: kube::Error,
        result: String,
    },

    #[snafu(display("failed to create hub WorkflowStatusResult {result:?}"))]
    CreateStatusResult {
        source: kube::Error,
        result: String,
    },

    #[snafu(display("failed to update hub WorkflowStatusResult {result:?}"))]
    UpdateStatusResult {
        source: kube::Error,
        result: String,
    },
}

/// Runs the agent until a termination signal arrives.
pub async fn run(spoke_client: Client, hub_client: Client, cluster_name: String) {
    let workflows: Api<Workflow> = Api::all(spoke_client.clone());

    Controller::new(workflows, watcher::Config::default())
        .shutdown_on_signal()
        .run(
            reconcile,
            error_policy,
            Arc::new(Ctx {
                spoke_client,
                hub_client,
                cluster_name,
            }),
        )
        .for_each(|result| async move {
            report_controller_reconciled("workflow-status-agent", &result);
        })
        .await;
}

/// The WorkflowStatusResult an executing Workflow should be mirrored as,
/// carrying the hub back-references through from the Workflow's annotations.
fn desired_status_result(workflow: &Workflow, cluster_name: &str) -> WorkflowStatusResult {
    let annotations = workflow.annotations();
    let back_refs = [
        ANNOTATION_KEY_HUB_WORKFLOW_NAME,
        ANNOTATION_KEY_HUB_WORKFLOW_NAMESPACE,
    ]
    .into_iter()
    .map(|key| {
        (
            key.to_owned(),
            annotations.get(key).cloned().unwrap_or_default(),
        )
    })
    .collect::<BTreeMap<_, _>>();

    WorkflowStatusResult {
        types: Some(WorkflowStatusResult::type_meta()),
        metadata: ObjectMeta {
            name: Some(generate_status_result_name(workflow)),
            namespace: Some(cluster_name.to_owned()),
            annotations: Some(back_refs),
            ..ObjectMeta::default()
        },
        workflow_status: workflow.status.clone().unwrap_or_default(),
    }
}

pub async fn reconcile(workflow: Arc<Workflow>, ctx: Arc<Ctx>) -> Result<Action> {
    if !contains_valid_hub_workflow_uid_annotation(&workflow) {
        return Ok(Action::await_change());
    }

    let namespace = workflow.namespace().context(NoNamespaceSnafu)?;
    let name = workflow.name_any();
    let workflows: Api<Workflow> = Api::namespaced(ctx.spoke_client.clone(), &namespace);

    let Some(workflow) = workflows
        .get_opt(&name)
        .await
        .with_context(|_| GetWorkflowSnafu {
            workflow: name.clone(),
        })?
    else {
        return Ok(Action::await_change());
    };

    if workflow.meta().deletion_timestamp.is_some() {
        return Ok(Action::await_change());
    }

    let result_name = generate_status_result_name(&workflow);
    let results: Api<WorkflowStatusResult> =
        Api::namespaced(ctx.hub_client.clone(), &ctx.cluster_name);

    match results
        .get_opt(&result_name)
        .await
        .with_context(|_| GetStatusResultSnafu {
            result: result_name.clone(),
        })? {
        None => {
            let desired = desired_status_result(&workflow, &ctx.cluster_name);
            results
                .create(&PostParams::default(), &desired)
                .await
                .with_context(|_| CreateStatusResultSnafu {
                    result: result_name.clone(),
                })?;

            // requeue so a status change racing the create is picked up by
            // the update branch
            Ok(Action::requeue(Duration::ZERO))
        }
        Some(mut existing) => {
            let observed = workflow.status.clone().unwrap_or_default();
            if existing.workflow_status == observed {
                return Ok(Action::await_change());
            }

            existing.workflow_status = observed;
            results
                .replace(&result_name, &PostParams::default(), &existing)
                .await
                .with_context(|_| UpdateStatusResultSnafu {
                    result: result_name.clone(),
                })?;

            Ok(Action::await_change())
        }
    }
}

pub fn error_policy(_workflow: Arc<Workflow>, _error: &Error, _ctx: Arc<Ctx>) -> Action {
    Action::requeue(Duration::from_secs(5))
}

#[cfg(test)]
mod tests {
    use workflow_multicluster_api::{
        constants::ANNOTATION_KEY_HUB_WORKFLOW_UID,
        workflow::{WorkflowSpec, WorkflowStatus},
    };

    use super::*;

    #[test]
    fn desired_record_carries_back_references_and_status() {
        let workflow = Workflow {
            types: None,
            metadata: ObjectMeta {
                name: Some("wf1".to_owned()),
                namespace: Some("argo".to_owned()),
                annotations: Some(BTreeMap::from([
                    (
                        ANNOTATION_KEY_HUB_WORKFLOW_UID.to_owned(),
                        "abcde".to_owned(),
                    ),
                    (
                        ANNOTATION_KEY_HUB_WORKFLOW_NAME.to_owned(),
                        "wf1".to_owned(),
                    ),
                    (
                        ANNOTATION_KEY_HUB_WORKFLOW_NAMESPACE.to_owned(),
                        "argo-hub".to_owned(),
                    ),
                ])),
                ..ObjectMeta::default()
            },
            spec: WorkflowSpec::default(),
            status: Some(WorkflowStatus {
                phase: Some("Succeeded".to_owned()),
                ..WorkflowStatus::default()
            }),
        };

        let result = desired_status_result(&workflow, "cluster1");

        assert_eq!(result.metadata.name.as_deref(), Some("wf1-abcde"));
        assert_eq!(result.metadata.namespace.as_deref(), Some("cluster1"));
        assert_eq!(
            result.annotations().get(ANNOTATION_KEY_HUB_WORKFLOW_NAME),
            Some(&"wf1".to_owned())
        );
        assert_eq!(
            result
                .annotations()
                .get(ANNOTATION_KEY_HUB_WORKFLOW_NAMESPACE),
            Some(&"argo-hub".to_owned())
        );
        assert_eq!(result.workflow_status.phase.as_deref(), Some("Succeeded"));
    }
}
