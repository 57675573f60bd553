//! Status ingress controller, result path: copies the status snapshot a
//! WorkflowStatusResult carries onto the dormant hub Workflow it references.
//!
//! The status sync flow: the dormant Workflow on the hub is propagated to a
//! managed cluster, where the executing copy carries back-reference
//! annotations. The status agent on the managed cluster publishes a
//! WorkflowStatusResult into the hub-side cluster namespace, and this
//! controller resolves the back-references and populates the hub status.

use std::{sync::Arc, time::Duration};

use kube::{Api, Client, Resource, ResourceExt, api::PostParams, runtime::controller::Action};
use snafu::{OptionExt, ResultExt, Snafu};
use workflow_multicluster_api::{
    constants::{ANNOTATION_KEY_HUB_WORKFLOW_NAME, ANNOTATION_KEY_HUB_WORKFLOW_NAMESPACE},
    status_result::WorkflowStatusResult,
    workflow::Workflow,
};

pub struct Ctx {
    pub client: Client,
}

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("WorkflowStatusResult has no namespace set"))]
    NoNamespace,

    #[snafu(display("failed to fetch WorkflowStatusResult {result:?}"))]
    GetStatusResult {
        source: kube::Error,
        result: String,
    },

    #[snafu(display("WorkflowStatusResult {result:?} is missing its hub Workflow back-references"))]
    MissingHubReference { result: String },

    #[snafu(display("failed to fetch the referenced hub Workflow {workflow:?}"))]
    GetWorkflow {
        source: kube::Error,
        workflow: String,
    },

    #[snafu(display("failed to update Workflow {workflow:?}"))]
    UpdateWorkflow {
        source: kube::Error,
        workflow: String,
    },
}

pub async fn reconcile(result: Arc<WorkflowStatusResult>, ctx: Arc<Ctx>) -> Result<Action> {
    let namespace = result.namespace().context(NoNamespaceSnafu)?;
    let name = result.name_any();
    let results: Api<WorkflowStatusResult> = Api::namespaced(ctx.client.clone(), &namespace);

    let Some(result) = results
        .get_opt(&name)
        .await
        .with_context(|_| GetStatusResultSnafu {
            result: name.clone(),
        })?
    else {
        return Ok(Action::await_change());
    };

    if result.meta().deletion_timestamp.is_some() {
        return Ok(Action::await_change());
    }

    let annotations = result.annotations();
    let workflow_name = annotations
        .get(ANNOTATION_KEY_HUB_WORKFLOW_NAME)
        .filter(|value| !value.is_empty())
        .with_context(|| MissingHubReferenceSnafu {
            result: name.clone(),
        })?;
    let workflow_namespace = annotations
        .get(ANNOTATION_KEY_HUB_WORKFLOW_NAMESPACE)
        .filter(|value| !value.is_empty())
        .with_context(|| MissingHubReferenceSnafu {
            result: name.clone(),
        })?;

    // The hub Workflow must exist for the lifetime of its spoke copy, so a
    // missing Workflow here is an error, not a stale event.
    let workflows: Api<Workflow> = Api::namespaced(ctx.client.clone(), workflow_namespace);
    let mut workflow =
        workflows
            .get(workflow_name)
            .await
            .with_context(|_| GetWorkflowSnafu {
                workflow: workflow_name.clone(),
            })?;

    if workflow.status.as_ref() == Some(&result.workflow_status) {
        return Ok(Action::await_change());
    }

    workflow.status = Some(result.workflow_status.clone());
    workflows
        .replace(workflow_name, &PostParams::default(), &workflow)
        .await
        .with_context(|_| UpdateWorkflowSnafu {
            workflow: workflow_name.clone(),
        })?;

    Ok(Action::await_change())
}

pub fn error_policy(_result: Arc<WorkflowStatusResult>, _error: &Error, _ctx: Arc<Ctx>) -> Action {
    Action::requeue(Duration::from_secs(5))
}
