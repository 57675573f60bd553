//! Pure helper functions shared by the hub controllers and the spoke status
//! agent: eligibility predicates over labels and annotations, and the naming
//! scheme deriving envelope and status-record names from a Workflow.

use std::collections::BTreeMap;

use kube::{Resource, ResourceExt};

use crate::{
    constants::{
        ANNOTATION_KEY_HUB_WORKFLOW_NAME, ANNOTATION_KEY_HUB_WORKFLOW_NAMESPACE,
        ANNOTATION_KEY_HUB_WORKFLOW_UID, ANNOTATION_KEY_OCM_MANAGED_CLUSTER,
        ANNOTATION_KEY_OCM_MANAGED_CLUSTER_NAMESPACE, ANNOTATION_KEY_OCM_PLACEMENT,
        DEFAULT_WORKFLOW_NAMESPACE, LABEL_KEY_ENABLE_OCM_MULTICLUSTER,
        LABEL_KEY_ENABLE_OCM_STATUS_SYNC,
    },
    work::ManifestWork,
    workflow::Workflow,
};

/// Parses a label value the way Go's `strconv.ParseBool` does. Anything
/// outside the accepted spellings is not truthy.
pub fn parse_bool_label(value: &str) -> bool {
    matches!(value, "1" | "t" | "T" | "true" | "TRUE" | "True")
}

fn has_non_empty_annotation(annotations: &BTreeMap<String, String>, key: &str) -> bool {
    annotations.get(key).is_some_and(|value| !value.is_empty())
}

/// Whether the hub Workflow is opted into multicluster dispatch.
pub fn contains_valid_ocm_label(workflow: &Workflow) -> bool {
    workflow
        .labels()
        .get(LABEL_KEY_ENABLE_OCM_MULTICLUSTER)
        .is_some_and(|value| parse_bool_label(value))
}

/// Whether the hub Workflow already names its target managed cluster.
pub fn contains_valid_ocm_annotation(workflow: &Workflow) -> bool {
    has_non_empty_annotation(workflow.annotations(), ANNOTATION_KEY_OCM_MANAGED_CLUSTER)
}

/// Whether the hub Workflow carries an unresolved placement reference.
pub fn contains_valid_ocm_placement_annotation(workflow: &Workflow) -> bool {
    has_non_empty_annotation(workflow.annotations(), ANNOTATION_KEY_OCM_PLACEMENT)
}

/// Whether the spoke Workflow references a dormant hub Workflow.
pub fn contains_valid_hub_workflow_uid_annotation(workflow: &Workflow) -> bool {
    has_non_empty_annotation(workflow.annotations(), ANNOTATION_KEY_HUB_WORKFLOW_UID)
}

/// Whether the ManifestWork is marked for status sync.
pub fn contains_valid_ocm_status_sync_label(work: &ManifestWork) -> bool {
    work.labels()
        .get(LABEL_KEY_ENABLE_OCM_STATUS_SYNC)
        .is_some_and(|value| parse_bool_label(value))
}

/// Whether the ManifestWork carries both hub Workflow back-references.
pub fn contains_valid_hub_workflow_annotations(work: &ManifestWork) -> bool {
    let annotations = work.annotations();
    has_non_empty_annotation(annotations, ANNOTATION_KEY_HUB_WORKFLOW_NAMESPACE)
        && has_non_empty_annotation(annotations, ANNOTATION_KEY_HUB_WORKFLOW_NAME)
}

/// The first five characters of a uid, used to disambiguate envelope and
/// status-record names. Inputs shorter than five characters pass through
/// whole; production uids always have sufficient length.
pub fn uid5(uid: &str) -> &str {
    uid.get(..5).unwrap_or(uid)
}

/// The ManifestWork name for a given hub Workflow: the Workflow name with
/// the uid prefix as suffix.
pub fn generate_manifest_work_name(workflow: &Workflow) -> String {
    let uid = workflow.meta().uid.as_deref().unwrap_or_default();
    format!("{}-{}", workflow.name_any(), uid5(uid))
}

/// The WorkflowStatusResult name published for a spoke Workflow, derived
/// from the hub workflow uid annotation.
pub fn generate_status_result_name(workflow: &Workflow) -> String {
    let uid = workflow
        .annotations()
        .get(ANNOTATION_KEY_HUB_WORKFLOW_UID)
        .map(String::as_str)
        .unwrap_or_default();
    format!("{}-{}", workflow.name_any(), uid5(uid))
}

/// The namespace the propagated Workflow is materialized into, in priority
/// order: the namespace override annotation, the hub Workflow's own
/// namespace, the `argo` default.
pub fn generate_workflow_namespace(workflow: &Workflow) -> String {
    let annotations = workflow.annotations();
    if let Some(namespace) = annotations.get(ANNOTATION_KEY_OCM_MANAGED_CLUSTER_NAMESPACE)
        && !namespace.is_empty()
    {
        return namespace.clone();
    }

    match workflow.namespace() {
        Some(namespace) if !namespace.is_empty() => namespace,
        _ => DEFAULT_WORKFLOW_NAMESPACE.to_owned(),
    }
}
