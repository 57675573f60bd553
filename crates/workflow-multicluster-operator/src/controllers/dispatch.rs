//! Dispatch controller: keeps exactly one ManifestWork envelope per eligible
//! hub Workflow in the hub-side namespace of its target cluster, and tears
//! envelope and status record down again before a deleted Workflow's cleanup
//! finalizer is released.

use std::{sync::Arc, time::Duration};

use kube::{
    Api, Client, Resource, ResourceExt,
    api::{DeleteParams, PostParams},
    runtime::controller::Action,
};
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::info;
use workflow_multicluster_api::{
    cluster::ManagedCluster,
    constants::{ANNOTATION_KEY_OCM_MANAGED_CLUSTER, FINALIZER_CLEANUP_MANIFEST_WORK},
    helpers::{
        contains_valid_ocm_annotation, contains_valid_ocm_label, generate_manifest_work_name,
    },
    status_result::WorkflowStatusResult,
    work::ManifestWork,
    workflow::Workflow,
};

use crate::{
    StatusSyncSource,
    workload::{self, generate_manifest_work, prepare_workflow_for_work_payload},
};

pub struct Ctx {
    pub client: Client,
    pub status_sync: StatusSyncSource,
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

    #[snafu(display("failed to fetch ManagedCluster {cluster:?}"))]
    GetManagedCluster {
        source: kube::Error,
        cluster: String,
    },

    #[snafu(display("failed to update Workflow {workflow:?}"))]
    UpdateWorkflow {
        source: kube::Error,
        workflow: String,
    },

    #[snafu(display("failed to build the ManifestWork payload"))]
    BuildPayload { source: workload::Error },

    #[snafu(display("failed to fetch ManifestWork {work:?}"))]
    GetManifestWork { source: kube::Error, work: String },

    #[snafu(display("failed to create ManifestWork {work:?}"))]
    CreateManifestWork { source: kube::Error, work: String },

    #[snafu(display("failed to update ManifestWork {work:?}"))]
    UpdateManifestWork { source: kube::Error, work: String },

    #[snafu(display("failed to delete ManifestWork {work:?}"))]
    DeleteManifestWork { source: kube::Error, work: String },

    #[snafu(display("failed to fetch WorkflowStatusResult {result:?}"))]
    GetStatusResult {
        source: kube::Error,
        result: String,
    },

    #[snafu(display("failed to delete WorkflowStatusResult {result:?}"))]
    DeleteStatusResult {
        source: kube::Error,
        result: String,
    },
}

fn is_not_found(error: &kube::Error) -> bool {
    matches!(error, kube::Error::Api(response) if response.code == 404)
}

fn has_cleanup_finalizer(workflow: &Workflow) -> bool {
    workflow
        .finalizers()
        .iter()
        .any(|finalizer| finalizer == FINALIZER_CLEANUP_MANIFEST_WORK)
}

pub async fn reconcile(workflow: Arc<Workflow>, ctx: Arc<Ctx>) -> Result<Action> {
    if !contains_valid_ocm_label(&workflow) || !contains_valid_ocm_annotation(&workflow) {
        return Ok(Action::await_change());
    }

    let namespace = workflow.namespace().context(NoNamespaceSnafu)?;
    let name = workflow.name_any();
    let workflows: Api<Workflow> = Api::namespaced(ctx.client.clone(), &namespace);

    let Some(mut workflow) = workflows
        .get_opt(&name)
        .await
        .with_context(|_| GetWorkflowSnafu {
            workflow: name.clone(),
        })?
    else {
        return Ok(Action::await_change());
    };

    let cluster_name = workflow
        .annotations()
        .get(ANNOTATION_KEY_OCM_MANAGED_CLUSTER)
        .cloned()
        .unwrap_or_default();
    let work_name = generate_manifest_work_name(&workflow);
    let works: Api<ManifestWork> = Api::namespaced(ctx.client.clone(), &cluster_name);

    // The Workflow is being deleted; the same reconciliation either cleans up
    // or dispatches, never both.
    if workflow.meta().deletion_timestamp.is_some() {
        return finalize(&ctx, &workflows, &works, workflow, &work_name, &cluster_name).await;
    }

    // The finalizer goes on the moment the Workflow is first observed as
    // eligible, before anything is created on its behalf, so deletion always
    // funnels through the cleanup path.
    if !has_cleanup_finalizer(&workflow) {
        info!("adding finalizer to Workflow");
        workflow
            .finalizers_mut()
            .push(FINALIZER_CLEANUP_MANIFEST_WORK.to_owned());
        workflows
            .replace(&name, &PostParams::default(), &workflow)
            .await
            .with_context(|_| UpdateWorkflowSnafu {
                workflow: name.clone(),
            })?;

        // the reconcile retriggers from the resource update
        return Ok(Action::await_change());
    }

    // Never create an envelope in a namespace that has no work agent behind
    // it: the target must be a registered ManagedCluster.
    let clusters: Api<ManagedCluster> = Api::all(ctx.client.clone());
    clusters
        .get(&cluster_name)
        .await
        .with_context(|_| GetManagedClusterSnafu {
            cluster: cluster_name.clone(),
        })?;

    info!("generating ManifestWork for Workflow");
    let payload = prepare_workflow_for_work_payload(&workflow);
    let desired = generate_manifest_work(
        &work_name,
        &cluster_name,
        &workflow,
        payload,
        ctx.status_sync,
    )
    .context(BuildPayloadSnafu)?;

    match works
        .get_opt(&work_name)
        .await
        .with_context(|_| GetManifestWorkSnafu {
            work: work_name.clone(),
        })? {
        None => {
            works
                .create(&PostParams::default(), &desired)
                .await
                .with_context(|_| CreateManifestWorkSnafu {
                    work: work_name.clone(),
                })?;
        }
        Some(mut existing) => {
            existing.spec.workload.manifests = desired.spec.workload.manifests;
            works
                .replace(&work_name, &PostParams::default(), &existing)
                .await
                .with_context(|_| UpdateManifestWorkSnafu {
                    work: work_name.clone(),
                })?;
        }
    }

    Ok(Action::await_change())
}

/// The ordered teardown run while the Workflow carries a deletion timestamp:
/// first the status record, then the envelope, then the finalizer release.
/// Every step tolerates already-deleted objects so retries are safe.
async fn finalize(
    ctx: &Ctx,
    workflows: &Api<Workflow>,
    works: &Api<ManifestWork>,
    mut workflow: Workflow,
    work_name: &str,
    cluster_name: &str,
) -> Result<Action> {
    let results: Api<WorkflowStatusResult> = Api::namespaced(ctx.client.clone(), cluster_name);
    match results
        .get_opt(work_name)
        .await
        .context(GetStatusResultSnafu { result: work_name })?
    {
        None => info!("WorkflowStatusResult already absent"),
        Some(_) => {
            if let Err(error) = results.delete(work_name, &DeleteParams::default()).await
                && !is_not_found(&error)
            {
                return Err(error).context(DeleteStatusResultSnafu { result: work_name });
            }
        }
    }

    // Any error other than NotFound must abort here; the next reconciliation
    // retries from the top.
    let envelope = works
        .get_opt(work_name)
        .await
        .context(GetManifestWorkSnafu { work: work_name })?;
    if envelope.is_some() {
        if let Err(error) = works.delete(work_name, &DeleteParams::default()).await
            && !is_not_found(&error)
        {
            return Err(error).context(DeleteManifestWorkSnafu { work: work_name });
        }
    }

    // Neither the status record nor the envelope exist anymore; release the
    // finalizer so the deletion can complete. Set semantics keep this safe
    // under duplicated finalizer entries.
    workflow
        .finalizers_mut()
        .retain(|finalizer| finalizer != FINALIZER_CLEANUP_MANIFEST_WORK);

    let name = workflow.name_any();
    workflows
        .replace(&name, &PostParams::default(), &workflow)
        .await
        .context(UpdateWorkflowSnafu { workflow: name })?;

    Ok(Action::await_change())
}

pub fn error_policy(_workflow: Arc<Workflow>, _error: &Error, _ctx: Arc<Ctx>) -> Action {
    Action::requeue(Duration::from_secs(5))
}

#[cfg(test)]
mod tests {
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use workflow_multicluster_api::workflow::WorkflowSpec;

    use super::*;

    fn workflow_with_finalizers(finalizers: Vec<String>) -> Workflow {
        Workflow {
            types: None,
            metadata: ObjectMeta {
                name: Some("wf1".to_owned()),
                namespace: Some("argo".to_owned()),
                finalizers: Some(finalizers),
                ..ObjectMeta::default()
            },
            spec: WorkflowSpec::default(),
            status: None,
        }
    }

    #[test]
    fn cleanup_finalizer_is_detected() {
        let workflow = workflow_with_finalizers(vec![
            "other.io/finalizer".to_owned(),
            FINALIZER_CLEANUP_MANIFEST_WORK.to_owned(),
        ]);
        assert!(has_cleanup_finalizer(&workflow));

        let workflow = workflow_with_finalizers(vec!["other.io/finalizer".to_owned()]);
        assert!(!has_cleanup_finalizer(&workflow));
    }

    #[test]
    fn finalizer_removal_uses_set_semantics() {
        let mut workflow = workflow_with_finalizers(vec![
            FINALIZER_CLEANUP_MANIFEST_WORK.to_owned(),
            "other.io/finalizer".to_owned(),
            // duplicates must not survive the strip
            FINALIZER_CLEANUP_MANIFEST_WORK.to_owned(),
        ]);

        workflow
            .finalizers_mut()
            .retain(|finalizer| finalizer != FINALIZER_CLEANUP_MANIFEST_WORK);

        assert_eq!(workflow.finalizers(), ["other.io/finalizer".to_owned()]);
    }
}
