//! Partial typed binding for the Open Cluster Management `ManifestWork`
//! resource, the transport envelope that carries a sanitized Workflow into
//! the hub-side namespace of its target cluster.

use std::borrow::Cow;

use k8s_openapi::{NamespaceResourceScope, apimachinery::pkg::apis::meta::v1::ObjectMeta};
use kube::{Resource, core::TypeMeta};
use serde::{Deserialize, Serialize};

pub const API_GROUP: &str = "work.open-cluster-management.io";
pub const API_VERSION: &str = "v1";

/// The feedback rule type that extracts values by JSON path.
pub const FEEDBACK_RULE_TYPE_JSON_PATHS: &str = "JSONPaths";

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ManifestWork {
    #[serde(flatten)]
    pub types: Option<TypeMeta>,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ManifestWorkSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ManifestWorkStatus>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestWorkSpec {
    #[serde(default)]
    pub workload: ManifestsTemplate,

    /// Per-manifest options, used to request status feedback for the wrapped
    /// Workflow.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub manifest_configs: Vec<ManifestConfigOption>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ManifestsTemplate {
    #[serde(default)]
    pub manifests: Vec<Manifest>,
}

/// A single raw manifest inside the workload template.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Manifest(pub serde_json::Value);

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestConfigOption {
    pub resource_identifier: ResourceIdentifier,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feedback_rules: Vec<FeedbackRule>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ResourceIdentifier {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRule {
    pub r#type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub json_paths: Vec<JsonPath>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct JsonPath {
    pub name: String,
    pub path: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestWorkStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_status: Option<ManifestResourceStatus>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ManifestResourceStatus {
    #[serde(default)]
    pub manifests: Vec<ManifestCondition>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_meta: Option<ResourceIdentifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_feedbacks: Option<StatusFeedbackResult>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct StatusFeedbackResult {
    #[serde(default)]
    pub values: Vec<FeedbackValue>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackValue {
    pub name: String,
    #[serde(default)]
    pub field_value: FieldValue,
}

/// A scalar value probed from the executing resource. Exactly one of the
/// typed fields is set, discriminated by `type`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValue {
    #[serde(default)]
    pub r#type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integer: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boolean: Option<bool>,
}

impl ManifestWork {
    /// The type meta every serialized ManifestWork must carry.
    pub fn type_meta() -> TypeMeta {
        TypeMeta::resource::<Self>()
    }
}

impl Resource for ManifestWork {
    type DynamicType = ();
    type Scope = NamespaceResourceScope;

    fn kind(_dt: &()) -> Cow<'_, str> {
        Cow::Borrowed("ManifestWork")
    }

    fn group(_dt: &()) -> Cow<'_, str> {
        Cow::Borrowed(API_GROUP)
    }

    fn version(_dt: &()) -> Cow<'_, str> {
        Cow::Borrowed(API_VERSION)
    }

    fn plural(_dt: &()) -> Cow<'_, str> {
        Cow::Borrowed("manifestworks")
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
    fn deserialize_status_feedback() {
        let work: ManifestWork = serde_yaml::from_str(indoc! {"
            apiVersion: work.open-cluster-management.io/v1
            kind: ManifestWork
            metadata:
              name: wf1-abcde
              namespace: cluster1
            spec:
              workload:
                manifests:
                  - apiVersion: argoproj.io/v1alpha1
                    kind: Workflow
                    metadata:
                      name: wf1
                      namespace: argo
            status:
              resourceStatus:
                manifests:
                  - resourceMeta:
                      group: argoproj.io
                      resource: workflows
                      namespace: argo
                      name: wf1
                    statusFeedbacks:
                      values:
                        - name: phase
                          fieldValue:
                            type: String
                            string: Succeeded
        "})
        .expect("manifest work fixture must deserialize");

        assert_eq!(work.spec.workload.manifests.len(), 1);

        let feedback = work
            .status
            .as_ref()
            .and_then(|status| status.resource_status.as_ref())
            .and_then(|resources| resources.manifests.first())
            .and_then(|manifest| manifest.status_feedbacks.as_ref())
            .and_then(|feedbacks| feedbacks.values.first())
            .expect("feedback value must be present");
        assert_eq!(feedback.name, "phase");
        assert_eq!(feedback.field_value.string.as_deref(), Some("Succeeded"));
    }

    #[test]
    fn empty_manifest_configs_are_not_serialized() {
        let work = ManifestWork {
            types: Some(ManifestWork::type_meta()),
            metadata: ObjectMeta::default(),
            spec: ManifestWorkSpec::default(),
            status: None,
        };

        let value = serde_json::to_value(&work).expect("manifest work must serialize");
        assert_eq!(value["apiVersion"], "work.open-cluster-management.io/v1");
        assert_eq!(value["spec"].get("manifestConfigs"), None);
    }
}
