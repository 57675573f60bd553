//! The embedded install bundle: the manifests a hub needs before the
//! controllers can do useful work (the `argo` namespace, the
//! WorkflowStatusResult CRD, and RBAC plus deployment for the status-sync
//! agent).
//!
//! Manifests are compiled into the binary and decoded into typed objects at
//! apply time; a manifest that fails to decode is fatal. Applying uses
//! server-side apply with a fixed field manager, so re-running the install
//! is idempotent.

use k8s_openapi::{
    ClusterResourceScope, NamespaceResourceScope,
    api::{
        apps::v1::Deployment,
        core::v1::{Namespace, ServiceAccount},
        rbac::v1::{ClusterRole, ClusterRoleBinding},
    },
    apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition,
};
use kube::{
    Api, Client, Resource, ResourceExt,
    api::{Patch, PatchParams},
};
use serde::{Serialize, de::DeserializeOwned};
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::info;

/// The field manager all install writes are attributed to.
pub const FIELD_MANAGER: &str = "workflow-multicluster-operator";

/// The bundle, in apply order.
const MANIFEST_FILES: &[(&str, &str)] = &[
    (
        "manifests/00-argo-namespace.yaml",
        include_str!("../../manifests/00-argo-namespace.yaml"),
    ),
    (
        "manifests/01-workflowstatusresults-crd.yaml",
        include_str!("../../manifests/01-workflowstatusresults-crd.yaml"),
    ),
    (
        "manifests/02-status-sync-clusterrole.yaml",
        include_str!("../../manifests/02-status-sync-clusterrole.yaml"),
    ),
    (
        "manifests/03-status-sync-clusterrolebinding.yaml",
        include_str!("../../manifests/03-status-sync-clusterrolebinding.yaml"),
    ),
    (
        "manifests/04-status-sync-serviceaccount.yaml",
        include_str!("../../manifests/04-status-sync-serviceaccount.yaml"),
    ),
    (
        "manifests/05-status-sync-agent-deployment.yaml",
        include_str!("../../manifests/05-status-sync-agent-deployment.yaml"),
    ),
];

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to parse manifest {file:?}"))]
    ParseManifest {
        source: serde_yaml::Error,
        file: String,
    },

    #[snafu(display("manifest {file:?} has no kind"))]
    MissingKind { file: String },

    #[snafu(display("manifest {file:?} has unsupported kind {kind:?}"))]
    UnsupportedKind { file: String, kind: String },

    #[snafu(display("failed to decode manifest {file:?} as {kind:?}"))]
    DecodeManifest {
        source: serde_yaml::Error,
        file: String,
        kind: String,
    },

    #[snafu(display("manifest {file:?} has no namespace set"))]
    MissingNamespace { file: String },

    #[snafu(display("failed to apply manifest {file:?}"))]
    ApplyManifest { source: kube::Error, file: String },
}

/// A decoded bundle object. The variants list every kind the bundle may
/// contain; anything else is rejected at decode time.
enum BundleObject {
    Namespace(Namespace),
    CustomResourceDefinition(CustomResourceDefinition),
    ClusterRole(ClusterRole),
    ClusterRoleBinding(ClusterRoleBinding),
    ServiceAccount(ServiceAccount),
    Deployment(Deployment),
}

fn decode_manifest(file: &str, raw: &str) -> Result<BundleObject> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(raw).context(ParseManifestSnafu { file })?;
    let kind = value
        .get("kind")
        .and_then(serde_yaml::Value::as_str)
        .context(MissingKindSnafu { file })?
        .to_owned();

    fn decode<T: DeserializeOwned>(file: &str, kind: &str, value: serde_yaml::Value) -> Result<T> {
        serde_yaml::from_value(value).context(DecodeManifestSnafu { file, kind })
    }

    let object = match kind.as_str() {
        "Namespace" => BundleObject::Namespace(decode(file, &kind, value)?),
        "CustomResourceDefinition" => {
            BundleObject::CustomResourceDefinition(decode(file, &kind, value)?)
        }
        "ClusterRole" => BundleObject::ClusterRole(decode(file, &kind, value)?),
        "ClusterRoleBinding" => BundleObject::ClusterRoleBinding(decode(file, &kind, value)?),
        "ServiceAccount" => BundleObject::ServiceAccount(decode(file, &kind, value)?),
        "Deployment" => BundleObject::Deployment(decode(file, &kind, value)?),
        _ => return UnsupportedKindSnafu { file, kind }.fail(),
    };

    Ok(object)
}

async fn apply_cluster_scoped<K>(client: &Client, file: &str, object: &K) -> Result<()>
where
    K: Resource<DynamicType = (), Scope = ClusterResourceScope>
        + Clone
        + std::fmt::Debug
        + DeserializeOwned
        + Serialize,
{
    let api = Api::<K>::all(client.clone());
    api.patch(
        &object.name_any(),
        &PatchParams::apply(FIELD_MANAGER).force(),
        &Patch::Apply(object),
    )
    .await
    .context(ApplyManifestSnafu { file })?;

    Ok(())
}

async fn apply_namespaced<K>(client: &Client, file: &str, object: &K) -> Result<()>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + std::fmt::Debug
        + DeserializeOwned
        + Serialize,
{
    let namespace = object.namespace().context(MissingNamespaceSnafu { file })?;
    let api = Api::<K>::namespaced(client.clone(), &namespace);
    api.patch(
        &object.name_any(),
        &PatchParams::apply(FIELD_MANAGER).force(),
        &Patch::Apply(object),
    )
    .await
    .context(ApplyManifestSnafu { file })?;

    Ok(())
}

/// Decodes and applies the whole bundle in order.
pub async fn apply_bundle(client: &Client) -> Result<()> {
    for (file, raw) in MANIFEST_FILES.iter().copied() {
        let object = decode_manifest(file, raw)?;
        info!(manifest = file, "applying install manifest");

        match &object {
            BundleObject::Namespace(namespace) => {
                apply_cluster_scoped(client, file, namespace).await?;
            }
            BundleObject::CustomResourceDefinition(crd) => {
                apply_cluster_scoped(client, file, crd).await?;
            }
            BundleObject::ClusterRole(role) => apply_cluster_scoped(client, file, role).await?,
            BundleObject::ClusterRoleBinding(binding) => {
                apply_cluster_scoped(client, file, binding).await?;
            }
            BundleObject::ServiceAccount(account) => {
                apply_namespaced(client, file, account).await?;
            }
            BundleObject::Deployment(deployment) => {
                apply_namespaced(client, file, deployment).await?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_bundled_manifest_decodes() {
        let kinds = MANIFEST_FILES
            .iter()
            .map(|(file, raw)| {
                let object =
                    decode_manifest(file, raw).expect("bundled manifests must decode cleanly");
                match object {
                    BundleObject::Namespace(_) => "Namespace",
                    BundleObject::CustomResourceDefinition(_) => "CustomResourceDefinition",
                    BundleObject::ClusterRole(_) => "ClusterRole",
                    BundleObject::ClusterRoleBinding(_) => "ClusterRoleBinding",
                    BundleObject::ServiceAccount(_) => "ServiceAccount",
                    BundleObject::Deployment(_) => "Deployment",
                }
            })
            .collect::<Vec<_>>();

        assert_eq!(
            kinds,
            [
                "Namespace",
                "CustomResourceDefinition",
                "ClusterRole",
                "ClusterRoleBinding",
                "ServiceAccount",
                "Deployment",
            ]
        );
    }

    #[test]
    fn crd_serves_the_expected_group() {
        let (file, raw) = MANIFEST_FILES[1];
        let BundleObject::CustomResourceDefinition(crd) =
            decode_manifest(file, raw).expect("the CRD manifest must decode")
        else {
            panic!("the second bundle entry must be the CRD");
        };

        assert_eq!(crd.spec.group, "multicluster.argoproj.io");
        assert_eq!(crd.spec.names.plural, "workflowstatusresults");
    }

    #[test]
    fn unknown_kinds_are_rejected() {
        let error = decode_manifest("test.yaml", "kind: Secret\nmetadata:\n  name: s1\n")
            .err()
            .expect("unsupported kinds must fail to decode");

        assert!(matches!(error, Error::UnsupportedKind { .. }));
    }
}
