//! Status ingress controller, feedback path: for deployments where the work
//! agent probes the executing Workflow itself, the envelope's status carries
//! feedback values and only the phase is copied back onto the hub Workflow.

use std::{sync::Arc, time::Duration};

use kube::{Api, Client, Resource, ResourceExt, api::PostParams, runtime::controller::Action};
use snafu::{OptionExt, ResultExt, Snafu};
use workflow_multicluster_api::{
    constants::{ANNOTATION_KEY_HUB_WORKFLOW_NAME, ANNOTATION_KEY_HUB_WORKFLOW_NAMESPACE},
    helpers::{contains_valid_hub_workflow_annotations, contains_valid_ocm_status_sync_label},
    work::ManifestWork,
    workflow::Workflow,
};

/// The feedback value carrying the workflow phase.
const FEEDBACK_VALUE_PHASE: &str = "phase";

pub struct Ctx {
    pub client: Client,
}

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("ManifestWork has no namespace set"))]
    NoNamespace,

    #[snafu(display("failed to fetch ManifestWork {work:?}"))]
    GetManifestWork { source: kube::Error, work: String },

    #[snafu(display("ManifestWork {work:?} is missing its hub Workflow back-references"))]
    MissingHubReference { work: String },

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

/// The phase reported for the wrapped Workflow, if the work agent has probed
/// one yet.
pub(crate) fn extract_phase(work: &ManifestWork) -> Option<String> {
    work.status
        .as_ref()?
        .resource_status
        .as_ref()?
        .manifests
        .first()?
        .status_feedbacks
        .as_ref()?
        .values
        .iter()
        .find(|value| value.name == FEEDBACK_VALUE_PHASE)
        .and_then(|value| value.field_value.string.clone())
        .filter(|phase| !phase.is_empty())
}

pub async fn reconcile(work: Arc<ManifestWork>, ctx: Arc<Ctx>) -> Result<Action> {
    if !contains_valid_ocm_status_sync_label(&work)
        || !contains_valid_hub_workflow_annotations(&work)
    {
        return Ok(Action::await_change());
    }

    let namespace = work.namespace().context(NoNamespaceSnafu)?;
    let name = work.name_any();
    let works: Api<ManifestWork> = Api::namespaced(ctx.client.clone(), &namespace);

    let Some(work) = works
        .get_opt(&name)
        .await
        .with_context(|_| GetManifestWorkSnafu { work: name.clone() })?
    else {
        return Ok(Action::await_change());
    };

    if work.meta().deletion_timestamp.is_some() {
        return Ok(Action::await_change());
    }

    // No feedback reported yet; the next status update retriggers us.
    let Some(phase) = extract_phase(&work) else {
        return Ok(Action::await_change());
    };

    let annotations = work.annotations();
    let workflow_name = annotations
        .get(ANNOTATION_KEY_HUB_WORKFLOW_NAME)
        .with_context(|| MissingHubReferenceSnafu { work: name.clone() })?;
    let workflow_namespace = annotations
        .get(ANNOTATION_KEY_HUB_WORKFLOW_NAMESPACE)
        .with_context(|| MissingHubReferenceSnafu { work: name.clone() })?;

    let workflows: Api<Workflow> = Api::namespaced(ctx.client.clone(), workflow_namespace);
    let mut workflow =
        workflows
            .get(workflow_name)
            .await
            .with_context(|_| GetWorkflowSnafu {
                workflow: workflow_name.clone(),
            })?;

    if workflow
        .status
        .as_ref()
        .is_some_and(|status| status.phase.as_deref() == Some(phase.as_str()))
    {
        return Ok(Action::await_change());
    }

    // Only the phase is reported on this path; everything else in the status
    // stays untouched.
    workflow.status.get_or_insert_with(Default::default).phase = Some(phase);
    workflows
        .replace(workflow_name, &PostParams::default(), &workflow)
        .await
        .with_context(|_| UpdateWorkflowSnafu {
            workflow: workflow_name.clone(),
        })?;

    Ok(Action::await_change())
}

pub fn error_policy(_work: Arc<ManifestWork>, _error: &Error, _ctx: Arc<Ctx>) -> Action {
    Action::requeue(Duration::from_secs(5))
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn phase_is_extracted_from_the_first_manifest() {
        let work: ManifestWork = serde_yaml::from_str(indoc! {"
            apiVersion: work.open-cluster-management.io/v1
            kind: ManifestWork
            metadata:
              name: wf1-abcde
              namespace: cluster1
            spec:
              workload:
                manifests: []
            status:
              resourceStatus:
                manifests:
                  - statusFeedbacks:
                      values:
                        - name: phase
                          fieldValue:
                            type: String
                            string: Succeeded
        "})
        .expect("manifest work fixture must deserialize");

        assert_eq!(extract_phase(&work).as_deref(), Some("Succeeded"));
    }

    #[test]
    fn missing_feedback_yields_no_phase() {
        let work: ManifestWork = serde_yaml::from_str(indoc! {"
            apiVersion: work.open-cluster-management.io/v1
            kind: ManifestWork
            metadata:
              name: wf1-abcde
              namespace: cluster1
            spec:
              workload:
                manifests: []
        "})
        .expect("manifest work fixture must deserialize");

        assert_eq!(extract_phase(&work), None);
    }
}
