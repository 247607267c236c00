//! Object store access used by the reconciler.
//!
//! [`ClusterClient`] is the narrow set of reads and writes a reconciliation
//! pass performs. [`KubeClusterClient`] implements it against the Kubernetes
//! API; tests substitute a mock.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::{Node, Pod, Service};
use kube::api::{ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};
use serde_json::json;

#[cfg(test)]
use mockall::automock;

use crate::error::{Error, Result};

/// Reads and writes against the cluster object store.
///
/// Lookups report absent objects as `Ok(None)`. Every other failure,
/// including write conflicts, is returned as an error.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Gets a service by namespace and name.
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>>;

    /// Gets a daemon set by namespace and name.
    async fn get_daemon_set(&self, namespace: &str, name: &str) -> Result<Option<DaemonSet>>;

    /// Creates a daemon set.
    async fn create_daemon_set(&self, ds: &DaemonSet) -> Result<()>;

    /// Replaces a stored daemon set. The object must carry the resource
    /// version it replaces.
    async fn replace_daemon_set(&self, ds: &DaemonSet) -> Result<()>;

    /// Lists pods in a namespace matching a label selector.
    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>>;

    /// Gets a node by name.
    async fn get_node(&self, name: &str) -> Result<Option<Node>>;

    /// Writes the service's status, leaving the rest of the object untouched.
    async fn update_service_status(&self, svc: &Service) -> Result<()>;
}

/// [`ClusterClient`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    /// Wraps a kube client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn object_key<'a>(
    name: Option<&'a str>,
    namespace: Option<&'a str>,
) -> Result<(&'a str, &'a str)> {
    let name = name.ok_or(Error::MissingObjectKey("metadata.name"))?;
    let namespace = namespace.ok_or(Error::MissingObjectKey("metadata.namespace"))?;
    Ok((name, namespace))
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_daemon_set(&self, namespace: &str, name: &str) -> Result<Option<DaemonSet>> {
        let api: Api<DaemonSet> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_daemon_set(&self, ds: &DaemonSet) -> Result<()> {
        let (_, namespace) =
            object_key(ds.metadata.name.as_deref(), ds.metadata.namespace.as_deref())?;
        let api: Api<DaemonSet> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), ds).await?;
        Ok(())
    }

    async fn replace_daemon_set(&self, ds: &DaemonSet) -> Result<()> {
        let (name, namespace) =
            object_key(ds.metadata.name.as_deref(), ds.metadata.namespace.as_deref())?;
        let api: Api<DaemonSet> = Api::namespaced(self.client.clone(), namespace);
        api.replace(name, &PostParams::default(), ds).await?;
        Ok(())
    }

    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pods = api.list(&ListParams::default().labels(label_selector)).await?;
        Ok(pods.items)
    }

    async fn get_node(&self, name: &str) -> Result<Option<Node>> {
        let api: Api<Node> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn update_service_status(&self, svc: &Service) -> Result<()> {
        let (name, namespace) =
            object_key(svc.metadata.name.as_deref(), svc.metadata.namespace.as_deref())?;
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);

        // A merge patch replaces the ingress list wholesale; the resource
        // version makes a stale write fail with a conflict.
        let status = serde_json::to_value(&svc.status)?;
        let mut patch = json!({ "status": status });
        if let Some(version) = &svc.metadata.resource_version {
            patch["metadata"] = json!({ "resourceVersion": version });
        }

        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}
