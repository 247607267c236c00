//! Reconciliation of a single `LoadBalancer` service.
//!
//! # How It Works
//!
//! Each pass is stateless and runs these steps for one service identity:
//!
//! 1. Fetch the service; a missing service needs nothing (owned daemon sets
//!    are garbage-collected)
//! 2. Skip services that are not `LoadBalancer` or have no cluster IP
//! 3. Build the desired forwarding daemon set and converge the stored one;
//!    a create or update ends the pass, since the daemon set's own changes
//!    trigger the next one
//! 4. With the daemon set converged, resolve the addresses of the nodes
//!    running ready forwarding pods and publish them on the service status

use std::sync::Arc;

use k8s_openapi::api::core::v1::Service;

use crate::addresses::resolve_addresses;
use crate::child::{ChildSync, sync_daemon_set};
use crate::client::ClusterClient;
use crate::config::Config;
use crate::constants::SERVICE_NAME_LABEL;
use crate::desired::{build_daemon_set, qualifying_cluster_ip};
use crate::error::Result;
use crate::status::sync_addresses;

/// Terminal state reached by a reconciliation pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The service no longer exists.
    ServiceNotFound,
    /// The service is not one this controller serves.
    Skipped,
    /// The forwarding daemon set was created.
    ChildCreated,
    /// The forwarding daemon set was updated.
    ChildUpdated,
    /// The published addresses already matched.
    AddressesInSync,
    /// The published addresses were replaced with these.
    AddressesUpdated(Vec<String>),
}

/// Reconciles `LoadBalancer` services against the cluster.
pub struct ServiceReconciler {
    client: Arc<dyn ClusterClient>,
    config: Arc<Config>,
}

impl ServiceReconciler {
    /// Creates a reconciler using the given client and configuration.
    #[must_use]
    pub fn new(client: Arc<dyn ClusterClient>, config: Arc<Config>) -> Self {
        Self { client, config }
    }

    /// Returns the configuration this reconciler was created with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs one reconciliation pass for the service `namespace/name`.
    ///
    /// # Errors
    ///
    /// Returns any store error encountered; the pass should be retried.
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<Outcome> {
        tracing::debug!("reconciling service {namespace}/{name}");

        let Some(svc) = self.client.get_service(namespace, name).await? else {
            tracing::debug!("service {namespace}/{name} not found");
            return Ok(Outcome::ServiceNotFound);
        };

        if qualifying_cluster_ip(&svc).is_none() {
            tracing::debug!("service {namespace}/{name} is not a LoadBalancer, ignoring");
            return Ok(Outcome::Skipped);
        }

        let desired = build_daemon_set(&svc, &self.config.forwarder_image)?;
        match sync_daemon_set(self.client.as_ref(), desired).await? {
            ChildSync::Created => return Ok(Outcome::ChildCreated),
            ChildSync::Updated => return Ok(Outcome::ChildUpdated),
            ChildSync::Converged => {}
        }

        self.sync_service_addresses(&svc).await
    }

    async fn sync_service_addresses(&self, svc: &Service) -> Result<Outcome> {
        let namespace = svc.metadata.namespace.as_deref().unwrap_or_default();
        let name = svc.metadata.name.as_deref().unwrap_or_default();

        let selector = format!("{SERVICE_NAME_LABEL}={name}");
        let pods = self.client.list_pods(namespace, &selector).await?;
        let resolved = resolve_addresses(self.client.as_ref(), &pods).await?;

        if sync_addresses(self.client.as_ref(), svc, &resolved).await? {
            Ok(Outcome::AddressesUpdated(resolved.into_iter().collect()))
        } else {
            Ok(Outcome::AddressesInSync)
        }
    }
}
