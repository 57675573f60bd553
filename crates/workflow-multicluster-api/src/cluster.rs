//! Partial typed bindings for the Open Cluster Management cluster APIs: the
//! cluster-scoped `ManagedCluster` registration record and the namespaced
//! `PlacementDecision` produced by the external scheduler.

use std::borrow::Cow;

use k8s_openapi::{
    ClusterResourceScope, NamespaceResourceScope, apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use kube::{Resource, core::TypeMeta};
use serde::{Deserialize, Serialize};

pub const CLUSTER_API_GROUP: &str = "cluster.open-cluster-management.io";

/// A managed (spoke) cluster registered with the hub. The dispatch controller
/// only checks for its existence, so the spec stays opaque.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ManagedCluster {
    #[serde(flatten)]
    pub types: Option<TypeMeta>,
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<serde_json::Value>,
}

impl Resource for ManagedCluster {
    type DynamicType = ();
    type Scope = ClusterResourceScope;

    fn kind(_dt: &()) -> Cow<'_, str> {
        Cow::Borrowed("ManagedCluster")
    }

    fn group(_dt: &()) -> Cow<'_, str> {
        Cow::Borrowed(CLUSTER_API_GROUP)
    }

    fn version(_dt: &()) -> Cow<'_, str> {
        Cow::Borrowed("v1")
    }

    fn plural(_dt: &()) -> Cow<'_, str> {
        Cow::Borrowed("managedclusters")
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

/// The scheduling result for one Placement, carrying an ordered list of
/// selected clusters. Enumerated via the well-known placement label
/// ([`crate::constants::PLACEMENT_DECISION_LABEL_KEY`]).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PlacementDecision {
    #[serde(flatten)]
    pub types: Option<TypeMeta>,
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PlacementDecisionStatus>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PlacementDecisionStatus {
    #[serde(default)]
    pub decisions: Vec<ClusterDecision>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDecision {
    #[serde(default)]
    pub cluster_name: String,
    #[serde(default)]
    pub reason: String,
}

impl PlacementDecision {
    /// The first selected cluster name, if the scheduler has produced one.
    pub fn first_cluster_name(&self) -> Option<&str> {
        self.status
            .as_ref()?
            .decisions
            .first()
            .map(|decision| decision.cluster_name.as_str())
            .filter(|name| !name.is_empty())
    }
}

impl Resource for PlacementDecision {
    type DynamicType = ();
    type Scope = NamespaceResourceScope;

    fn kind(_dt: &()) -> Cow<'_, str> {
        Cow::Borrowed("PlacementDecision")
    }

    fn group(_dt: &()) -> Cow<'_, str> {
        Cow::Borrowed(CLUSTER_API_GROUP)
    }

    fn version(_dt: &()) -> Cow<'_, str> {
        Cow::Borrowed("v1beta1")
    }

    fn plural(_dt: &()) -> Cow<'_, str> {
        Cow::Borrowed("placementdecisions")
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn first_cluster_name_skips_empty_decisions() {
        let decision: PlacementDecision = serde_yaml::from_str(indoc! {"
            apiVersion: cluster.open-cluster-management.io/v1beta1
            kind: PlacementDecision
            metadata:
              name: placement1-decision-1
              namespace: argo
              labels:
                cluster.open-cluster-management.io/placement: placement1
            status:
              decisions:
                - clusterName: ''
                  reason: ''
        "})
        .expect("placement decision fixture must deserialize");

        assert_eq!(decision.first_cluster_name(), None);
    }

    #[test]
    fn first_cluster_name_returns_the_first_decision() {
        let decision = PlacementDecision {
            types: None,
            metadata: ObjectMeta::default(),
            status: Some(PlacementDecisionStatus {
                decisions: vec![
                    ClusterDecision {
                        cluster_name: "cluster2".to_owned(),
                        reason: String::new(),
                    },
                    ClusterDecision {
                        cluster_name: "cluster3".to_owned(),
                        reason: String::new(),
                    },
                ],
            }),
        };

        assert_eq!(decision.first_cluster_name(), Some("cluster2"));
    }
}
