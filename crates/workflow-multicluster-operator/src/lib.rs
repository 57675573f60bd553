//! Hub-side controllers for multicluster workflow propagation.
//!
//! The placement controller resolves a Placement reference into a concrete
//! managed cluster, the dispatch controller wraps eligible Workflows into
//! ManifestWork envelopes (and tears them down again on deletion), and the
//! status ingress controllers fold observed status back onto the dormant hub
//! Workflow.

pub mod controllers;
pub mod install;
pub mod logging;
pub mod namespace;
pub mod workload;

/// Which channel reports workflow status back to the hub. The two paths are
/// mutually exclusive for any given deployment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum StatusSyncSource {
    /// The spoke status agent publishes WorkflowStatusResult records and the
    /// ingress copies the full status.
    StatusResults,

    /// The work agent probes the workflow phase via feedback rules and the
    /// ingress copies only the phase.
    WorkFeedback,
}
