//! Partial typed binding for the Argo `Workflow` resource.
//!
//! The controllers never interpret the workflow definition itself, so the
//! spec is carried as an opaque map. The status is typed just far enough to
//! expose the phase and to compare snapshots for equality.

use std::{borrow::Cow, collections::BTreeMap};

use k8s_openapi::{NamespaceResourceScope, apimachinery::pkg::apis::meta::v1::ObjectMeta};
use kube::{Resource, core::TypeMeta};
use serde::{Deserialize, Serialize};

pub const API_GROUP: &str = "argoproj.io";
pub const API_VERSION: &str = "v1alpha1";

/// An Argo Workflow, either dormant on the hub or live on a managed cluster.
///
/// List responses omit `apiVersion`/`kind` on the items, so the type meta is
/// optional; constructors that build payloads set it explicitly.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Workflow {
    #[serde(flatten)]
    pub types: Option<TypeMeta>,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: WorkflowSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<WorkflowStatus>,
}

/// The workflow definition, owned by the Argo engine and passed through
/// untouched.
pub type WorkflowSpec = BTreeMap<String, serde_json::Value>;

/// The observed state of a Workflow: the phase plus the node tree. Fields the
/// controllers do not touch are preserved through `other`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,

    /// Node status tree, keyed by node id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub nodes: BTreeMap<String, serde_json::Value>,

    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

impl Workflow {
    /// The type meta every serialized Workflow payload must carry.
    pub fn type_meta() -> TypeMeta {
        TypeMeta::resource::<Self>()
    }
}

impl Resource for Workflow {
    type DynamicType = ();
    type Scope = NamespaceResourceScope;

    fn kind(_dt: &()) -> Cow<'_, str> {
        Cow::Borrowed("Workflow")
    }

    fn group(_dt: &()) -> Cow<'_, str> {
        Cow::Borrowed(API_GROUP)
    }

    fn version(_dt: &()) -> Cow<'_, str> {
        Cow::Borrowed(API_VERSION)
    }

    fn plural(_dt: &()) -> Cow<'_, str> {
        Cow::Borrowed("workflows")
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
    fn deserialize_live_workflow() {
        let workflow: Workflow = serde_yaml::from_str(indoc! {"
            apiVersion: argoproj.io/v1alpha1
            kind: Workflow
            metadata:
              name: hello-world
              namespace: argo
              uid: 0f4c1e1f-9c2b-4c6e-a7a1-52fc72f3a40f
              labels:
                workflows.argoproj.io/enable-ocm-multicluster: 'true'
            spec:
              entrypoint: whalesay
              templates:
                - name: whalesay
                  container:
                    image: docker/whalesay
            status:
              phase: Running
              startedAt: '2023-03-02T18:23:14Z'
              nodes:
                hello-world:
                  phase: Running
        "})
        .expect("workflow fixture must deserialize");

        assert_eq!(workflow.metadata.name.as_deref(), Some("hello-world"));
        assert_eq!(
            workflow.types.as_ref().map(|t| t.kind.as_str()),
            Some("Workflow")
        );
        assert_eq!(workflow.spec["entrypoint"], "whalesay");

        let status = workflow.status.expect("status must be present");
        assert_eq!(status.phase.as_deref(), Some("Running"));
        assert!(status.nodes.contains_key("hello-world"));
    }

    #[test]
    fn list_items_have_no_type_meta() {
        let workflow: Workflow = serde_yaml::from_str(indoc! {"
            metadata:
              name: hello-world
              namespace: argo
        "})
        .expect("item without type meta must deserialize");

        assert!(workflow.types.is_none());
        assert!(workflow.status.is_none());
    }

    #[test]
    fn serialized_payload_carries_type_meta() {
        let workflow = Workflow {
            types: Some(Workflow::type_meta()),
            metadata: ObjectMeta {
                name: Some("wf1".to_owned()),
                namespace: Some("argo".to_owned()),
                ..ObjectMeta::default()
            },
            spec: WorkflowSpec::default(),
            status: None,
        };

        let value = serde_json::to_value(&workflow).expect("workflow must serialize");
        assert_eq!(value["apiVersion"], "argoproj.io/v1alpha1");
        assert_eq!(value["kind"], "Workflow");
        assert_eq!(value.get("status"), None);
    }

    #[test]
    fn status_snapshots_compare_by_value() {
        let left = WorkflowStatus {
            phase: Some("Succeeded".to_owned()),
            ..WorkflowStatus::default()
        };
        let right = left.clone();

        assert_eq!(left, right);
    }
}
