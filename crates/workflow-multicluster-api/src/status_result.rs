//! The first-party `WorkflowStatusResult` resource: a hub-side record
//! carrying a snapshot of a spoke Workflow's observed status.
//!
//! The status snapshot lives top-level next to `metadata` (not under a
//! `spec`), which is why this binding implements [`Resource`] by hand
//! instead of deriving a custom resource wrapper. The CRD manifest ships in
//! the operator's install bundle.

use std::borrow::Cow;

use k8s_openapi::{NamespaceResourceScope, apimachinery::pkg::apis::meta::v1::ObjectMeta};
use kube::{Resource, core::TypeMeta};
use serde::{Deserialize, Serialize};

use crate::workflow::WorkflowStatus;

pub const API_GROUP: &str = "multicluster.argoproj.io";
pub const API_VERSION: &str = "v1alpha1";

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatusResult {
    #[serde(flatten)]
    pub types: Option<TypeMeta>,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub workflow_status: WorkflowStatus,
}

impl WorkflowStatusResult {
    /// The type meta every serialized WorkflowStatusResult must carry.
    pub fn type_meta() -> TypeMeta {
        TypeMeta::resource::<Self>()
    }
}

impl Resource for WorkflowStatusResult {
    type DynamicType = ();
    type Scope = NamespaceResourceScope;

    fn kind(_dt: &()) -> Cow<'_, str> {
        Cow::Borrowed("WorkflowStatusResult")
    }

    fn group(_dt: &()) -> Cow<'_, str> {
        Cow::Borrowed(API_GROUP)
    }

    fn version(_dt: &()) -> Cow<'_, str> {
        Cow::Borrowed(API_VERSION)
    }

    fn plural(_dt: &()) -> Cow<'_, str> {
        Cow::Borrowed("workflowstatusresults")
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
