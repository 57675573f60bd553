//! The wire-visible label, annotation and finalizer keys. These are stable
//! strings shared between the hub controllers and the spoke status agent and
//! must never change without a migration.

use const_format::concatcp;

/// The key prefix for all workflow multicluster labels and annotations.
const WORKFLOWS_KEY_PREFIX: &str = "workflows.argoproj.io/";

/// Workflow label that opts a hub Workflow into multicluster dispatch. The
/// value is parsed with [`crate::helpers::parse_bool_label`]; only a truthy
/// value enables the placement and dispatch controllers.
pub const LABEL_KEY_ENABLE_OCM_MULTICLUSTER: &str =
    concatcp!(WORKFLOWS_KEY_PREFIX, "enable-ocm-multicluster");

/// ManifestWork label that marks the envelope for status sync from the
/// managed cluster back to the hub cluster.
pub const LABEL_KEY_ENABLE_OCM_STATUS_SYNC: &str =
    concatcp!(WORKFLOWS_KEY_PREFIX, "enable-ocm-status-sync");

/// Workflow annotation naming the ManagedCluster this Workflow is propagated
/// to. Written by the placement controller, consumed by the dispatch
/// controller.
pub const ANNOTATION_KEY_OCM_MANAGED_CLUSTER: &str =
    concatcp!(WORKFLOWS_KEY_PREFIX, "ocm-managed-cluster");

/// Workflow annotation overriding the namespace the propagated Workflow is
/// materialized into on the managed cluster.
pub const ANNOTATION_KEY_OCM_MANAGED_CLUSTER_NAMESPACE: &str =
    concatcp!(WORKFLOWS_KEY_PREFIX, "ocm-managed-cluster-namespace");

/// Workflow annotation naming the Placement whose decision determines the
/// managed cluster. Cleared by the placement controller once it has been
/// resolved into [`ANNOTATION_KEY_OCM_MANAGED_CLUSTER`].
pub const ANNOTATION_KEY_OCM_PLACEMENT: &str = concatcp!(WORKFLOWS_KEY_PREFIX, "ocm-placement");

/// ManifestWork and WorkflowStatusResult annotation carrying the namespace of
/// the originating hub Workflow.
pub const ANNOTATION_KEY_HUB_WORKFLOW_NAMESPACE: &str =
    concatcp!(WORKFLOWS_KEY_PREFIX, "ocm-hub-workflow-namespace");

/// ManifestWork and WorkflowStatusResult annotation carrying the name of the
/// originating hub Workflow.
pub const ANNOTATION_KEY_HUB_WORKFLOW_NAME: &str =
    concatcp!(WORKFLOWS_KEY_PREFIX, "ocm-hub-workflow-name");

/// Annotation on the propagated Workflow carrying the first five characters
/// of the dormant hub Workflow's uid.
pub const ANNOTATION_KEY_HUB_WORKFLOW_UID: &str =
    concatcp!(WORKFLOWS_KEY_PREFIX, "ocm-hub-workflow-uid");

/// Finalizer placed on every dispatched hub Workflow so the associated
/// ManifestWork and WorkflowStatusResult are cleaned up before the Workflow
/// deletion completes.
pub const FINALIZER_CLEANUP_MANIFEST_WORK: &str =
    concatcp!(WORKFLOWS_KEY_PREFIX, "cleanup-ocm-manifestwork");

/// The well-known label the external scheduler places on every
/// PlacementDecision, naming the Placement it belongs to.
pub const PLACEMENT_DECISION_LABEL_KEY: &str = "cluster.open-cluster-management.io/placement";

/// The namespace workflows fall back to on the managed cluster when neither
/// the namespace override annotation nor the hub namespace is set.
pub const DEFAULT_WORKFLOW_NAMESPACE: &str = "argo";
