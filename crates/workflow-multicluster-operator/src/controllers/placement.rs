//! Placement controller: resolves the Placement annotation on an eligible hub
//! Workflow into a concrete managed cluster name by evaluating the scheduler's
//! PlacementDecisions.

use std::{sync::Arc, time::Duration};

use kube::{
    Api, Client, Resource, ResourceExt,
    api::{ListParams, PostParams},
    runtime::controller::Action,
};
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::info;
use workflow_multicluster_api::{
    cluster::PlacementDecision,
    constants::{
        ANNOTATION_KEY_OCM_MANAGED_CLUSTER, ANNOTATION_KEY_OCM_PLACEMENT,
        PLACEMENT_DECISION_LABEL_KEY,
    },
    helpers::{contains_valid_ocm_label, contains_valid_ocm_placement_annotation},
    workflow::Workflow,
};

/// How long to wait for the external scheduler when no usable decision
/// exists yet.
const MISSING_DECISION_REQUEUE: Duration = Duration::from_secs(10);

pub struct Ctx {
    pub client: Client,
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

    #[snafu(display("failed to list PlacementDecisions for placement {placement:?}"))]
    ListPlacementDecisions {
        source: kube::Error,
        placement: String,
    },

    #[snafu(display("failed to update Workflow {workflow:?}"))]
    UpdateWorkflow {
        source: kube::Error,
        workflow: String,
    },
}

pub async fn reconcile(workflow: Arc<Workflow>, ctx: Arc<Ctx>) -> Result<Action> {
    if !contains_valid_ocm_label(&workflow) || !contains_valid_ocm_placement_annotation(&workflow) {
        return Ok(Action::await_change());
    }

    let namespace = workflow.namespace().context(NoNamespaceSnafu)?;
    let name = workflow.name_any();
    let workflows: Api<Workflow> = Api::namespaced(ctx.client.clone(), &namespace);

    // Re-read the Workflow, the watch event may be stale by the time this
    // reconciliation runs. A vanished Workflow means there is nothing to do.
    let Some(mut workflow) = workflows
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

    let placement_ref = workflow
        .annotations()
        .get(ANNOTATION_KEY_OCM_PLACEMENT)
        .cloned()
        .unwrap_or_default();
    if placement_ref.is_empty() {
        return Ok(Action::await_change());
    }

    let decisions: Api<PlacementDecision> = Api::namespaced(ctx.client.clone(), &namespace);
    let selector = format!("{PLACEMENT_DECISION_LABEL_KEY}={placement_ref}");
    let decision_list = decisions
        .list(&ListParams::default().labels(&selector))
        .await
        .with_context(|_| ListPlacementDecisionsSnafu {
            placement: placement_ref.clone(),
        })?;

    let Some(decision) = decision_list.items.first() else {
        info!(
            placement = %placement_ref,
            "unable to find any PlacementDecision, trying again later"
        );
        return Ok(Action::requeue(MISSING_DECISION_REQUEUE));
    };

    let Some(cluster_name) = decision.first_cluster_name() else {
        info!(
            placement = %placement_ref,
            "unable to find a valid ManagedCluster decision, trying again later"
        );
        return Ok(Action::requeue(MISSING_DECISION_REQUEUE));
    };
    let cluster_name = cluster_name.to_owned();

    info!(cluster = %cluster_name, "updating Workflow with the resolved managed cluster");

    // Clearing the placement reference and recording the target is a single
    // update; it must never be split into two writes.
    let annotations = workflow.annotations_mut();
    annotations.insert(ANNOTATION_KEY_OCM_PLACEMENT.to_owned(), String::new());
    annotations.insert(ANNOTATION_KEY_OCM_MANAGED_CLUSTER.to_owned(), cluster_name);

    workflows
        .replace(&name, &PostParams::default(), &workflow)
        .await
        .with_context(|_| UpdateWorkflowSnafu {
            workflow: name.clone(),
        })?;

    Ok(Action::await_change())
}

pub fn error_policy(_workflow: Arc<Workflow>, _error: &Error, _ctx: Arc<Ctx>) -> Action {
    Action::requeue(Duration::from_secs(5))
}
