//! Typed bindings for the APIs involved in multicluster workflow propagation,
//! plus the shared key constants and pure helper functions used by the hub
//! controllers and the spoke status agent.
//!
//! The external resources ([`workflow::Workflow`], [`work::ManifestWork`],
//! [`cluster::ManagedCluster`], [`cluster::PlacementDecision`]) are partial
//! bindings: they type exactly the fields the controllers touch and pass
//! everything else through opaquely.

pub mod cluster;
pub mod constants;
pub mod helpers;
pub mod status_result;
pub mod work;
pub mod workflow;

// External re-exports
pub use k8s_openapi;
pub use kube;
