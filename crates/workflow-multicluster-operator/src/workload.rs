//! Builders for the dispatched payload: the sanitized Workflow copy and the
//! ManifestWork envelope wrapping it.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};
use snafu::{ResultExt, Snafu};
use workflow_multicluster_api::{
    constants::{
        ANNOTATION_KEY_HUB_WORKFLOW_NAME, ANNOTATION_KEY_HUB_WORKFLOW_NAMESPACE,
        ANNOTATION_KEY_HUB_WORKFLOW_UID, LABEL_KEY_ENABLE_OCM_MULTICLUSTER,
        LABEL_KEY_ENABLE_OCM_STATUS_SYNC,
    },
    helpers::{generate_workflow_namespace, uid5},
    work::{
        FEEDBACK_RULE_TYPE_JSON_PATHS, FeedbackRule, JsonPath, Manifest, ManifestConfigOption,
        ManifestWork, ManifestWorkSpec, ManifestsTemplate, ResourceIdentifier,
    },
    workflow::{self, Workflow},
};

use crate::StatusSyncSource;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to serialize the Workflow payload"))]
    SerializeWorkflowPayload { source: serde_json::Error },
}

/// Produces the sanitized copy of a hub Workflow that is shipped to the
/// managed cluster: the eligibility label is forced to `"false"` so the spoke
/// copy is never dispatched again, the abbreviated hub uid is recorded, the
/// object metadata is reset to name/namespace/labels/annotations, and the
/// status is cleared.
pub fn prepare_workflow_for_work_payload(workflow: &Workflow) -> Workflow {
    let mut labels = workflow.labels().clone();
    labels.insert(
        LABEL_KEY_ENABLE_OCM_MULTICLUSTER.to_owned(),
        "false".to_owned(),
    );

    let uid = workflow.meta().uid.as_deref().unwrap_or_default();
    let mut annotations = workflow.annotations().clone();
    annotations.insert(
        ANNOTATION_KEY_HUB_WORKFLOW_UID.to_owned(),
        uid5(uid).to_owned(),
    );

    Workflow {
        types: Some(Workflow::type_meta()),
        metadata: ObjectMeta {
            name: workflow.metadata.name.clone(),
            namespace: Some(generate_workflow_namespace(workflow)),
            labels: Some(labels),
            annotations: Some(annotations),
            ..ObjectMeta::default()
        },
        spec: workflow.spec.clone(),
        status: None,
    }
}

/// Builds the ManifestWork envelope that carries the sanitized Workflow into
/// the hub-side namespace of the target cluster. The back-reference
/// annotations point at the originating hub Workflow; in feedback mode the
/// envelope additionally requests the workflow phase as a feedback value.
pub fn generate_manifest_work(
    name: &str,
    cluster_name: &str,
    hub_workflow: &Workflow,
    payload: Workflow,
    status_sync: StatusSyncSource,
) -> Result<ManifestWork> {
    let manifest_configs = match status_sync {
        StatusSyncSource::WorkFeedback => vec![ManifestConfigOption {
            resource_identifier: ResourceIdentifier {
                group: workflow::API_GROUP.to_owned(),
                resource: "workflows".to_owned(),
                namespace: payload.namespace().unwrap_or_default(),
                name: payload.name_any(),
            },
            feedback_rules: vec![FeedbackRule {
                r#type: FEEDBACK_RULE_TYPE_JSON_PATHS.to_owned(),
                json_paths: vec![JsonPath {
                    name: "phase".to_owned(),
                    path: ".status.phase".to_owned(),
                }],
            }],
        }],
        StatusSyncSource::StatusResults => Vec::new(),
    };

    let manifest = Manifest(serde_json::to_value(&payload).context(SerializeWorkflowPayloadSnafu)?);

    Ok(ManifestWork {
        types: Some(ManifestWork::type_meta()),
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            namespace: Some(cluster_name.to_owned()),
            labels: Some(BTreeMap::from([(
                LABEL_KEY_ENABLE_OCM_STATUS_SYNC.to_owned(),
                "true".to_owned(),
            )])),
            annotations: Some(BTreeMap::from([
                (
                    ANNOTATION_KEY_HUB_WORKFLOW_NAMESPACE.to_owned(),
                    hub_workflow.namespace().unwrap_or_default(),
                ),
                (
                    ANNOTATION_KEY_HUB_WORKFLOW_NAME.to_owned(),
                    hub_workflow.name_any(),
                ),
            ])),
            ..ObjectMeta::default()
        },
        spec: ManifestWorkSpec {
            workload: ManifestsTemplate {
                manifests: vec![manifest],
            },
            manifest_configs,
        },
        status: None,
    })
}

#[cfg(test)]
mod tests {
    use workflow_multicluster_api::{
        constants::{ANNOTATION_KEY_OCM_MANAGED_CLUSTER, ANNOTATION_KEY_OCM_MANAGED_CLUSTER_NAMESPACE},
        helpers::generate_manifest_work_name,
        workflow::{WorkflowSpec, WorkflowStatus},
    };

    use super::*;

    fn hub_workflow() -> Workflow {
        Workflow {
            types: Some(Workflow::type_meta()),
            metadata: ObjectMeta {
                name: Some("wf1".to_owned()),
                namespace: Some("argo".to_owned()),
                uid: Some("abcdefghij".to_owned()),
                resource_version: Some("12345".to_owned()),
                finalizers: Some(vec!["workflows.argoproj.io/cleanup-ocm-manifestwork".to_owned()]),
                labels: Some(BTreeMap::from([(
                    LABEL_KEY_ENABLE_OCM_MULTICLUSTER.to_owned(),
                    "true".to_owned(),
                )])),
                annotations: Some(BTreeMap::from([(
                    ANNOTATION_KEY_OCM_MANAGED_CLUSTER.to_owned(),
                    "cluster1".to_owned(),
                )])),
                ..ObjectMeta::default()
            },
            spec: WorkflowSpec::from([(
                "entrypoint".to_owned(),
                serde_json::Value::String("whalesay".to_owned()),
            )]),
            status: Some(WorkflowStatus {
                phase: Some("Running".to_owned()),
                ..WorkflowStatus::default()
            }),
        }
    }

    #[test]
    fn payload_is_sanitized() {
        let payload = prepare_workflow_for_work_payload(&hub_workflow());

        assert_eq!(
            payload.labels().get(LABEL_KEY_ENABLE_OCM_MULTICLUSTER),
            Some(&"false".to_owned())
        );
        assert_eq!(
            payload.annotations().get(ANNOTATION_KEY_HUB_WORKFLOW_UID),
            Some(&"abcde".to_owned())
        );
        assert_eq!(payload.namespace().as_deref(), Some("argo"));
        assert!(payload.status.is_none());

        // the metadata reset must drop everything the hub apiserver assigned
        assert!(payload.metadata.uid.is_none());
        assert!(payload.metadata.resource_version.is_none());
        assert!(payload.metadata.finalizers.is_none());

        // the workflow definition is carried through untouched
        assert_eq!(payload.spec, hub_workflow().spec);
    }

    #[test]
    fn payload_namespace_honors_the_override_annotation() {
        let mut workflow = hub_workflow();
        workflow.annotations_mut().insert(
            ANNOTATION_KEY_OCM_MANAGED_CLUSTER_NAMESPACE.to_owned(),
            "workloads".to_owned(),
        );

        let payload = prepare_workflow_for_work_payload(&workflow);
        assert_eq!(payload.namespace().as_deref(), Some("workloads"));
    }

    #[test]
    fn manifest_work_wraps_the_payload() {
        let workflow = hub_workflow();
        let name = generate_manifest_work_name(&workflow);
        assert_eq!(name, "wf1-abcde");

        let payload = prepare_workflow_for_work_payload(&workflow);
        let work = generate_manifest_work(
            &name,
            "cluster1",
            &workflow,
            payload,
            StatusSyncSource::StatusResults,
        )
        .expect("manifest work must be generated");

        assert_eq!(work.metadata.name.as_deref(), Some("wf1-abcde"));
        assert_eq!(work.metadata.namespace.as_deref(), Some("cluster1"));
        assert_eq!(
            work.labels().get(LABEL_KEY_ENABLE_OCM_STATUS_SYNC),
            Some(&"true".to_owned())
        );
        assert_eq!(
            work.annotations().get(ANNOTATION_KEY_HUB_WORKFLOW_NAMESPACE),
            Some(&"argo".to_owned())
        );
        assert_eq!(
            work.annotations().get(ANNOTATION_KEY_HUB_WORKFLOW_NAME),
            Some(&"wf1".to_owned())
        );

        assert_eq!(work.spec.workload.manifests.len(), 1);
        let manifest = &work.spec.workload.manifests[0].0;
        assert_eq!(manifest["apiVersion"], "argoproj.io/v1alpha1");
        assert_eq!(manifest["kind"], "Workflow");
        assert_eq!(
            manifest["metadata"]["labels"][LABEL_KEY_ENABLE_OCM_MULTICLUSTER],
            "false"
        );
        assert!(work.spec.manifest_configs.is_empty());
    }

    #[test]
    fn feedback_mode_requests_the_phase() {
        let workflow = hub_workflow();
        let payload = prepare_workflow_for_work_payload(&workflow);
        let work = generate_manifest_work(
            "wf1-abcde",
            "cluster1",
            &workflow,
            payload,
            StatusSyncSource::WorkFeedback,
        )
        .expect("manifest work must be generated");

        let config = work
            .spec
            .manifest_configs
            .first()
            .expect("feedback mode must configure feedback rules");
        assert_eq!(config.resource_identifier.resource, "workflows");
        assert_eq!(config.resource_identifier.name, "wf1");
        assert_eq!(config.feedback_rules[0].r#type, FEEDBACK_RULE_TYPE_JSON_PATHS);
        assert_eq!(config.feedback_rules[0].json_paths[0].path, ".status.phase");
    }
}
