//! Publishes resolved addresses on a service's load balancer status.

use std::collections::BTreeSet;

use k8s_openapi::api::core::v1::{LoadBalancerIngress, LoadBalancerStatus, Service, ServiceStatus};

use crate::client::ClusterClient;
use crate::error::Result;

/// Returns the IP addresses currently published on a service, sorted.
#[must_use]
pub fn published_addresses(svc: &Service) -> Vec<String> {
    let mut ips: Vec<String> = svc
        .status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .map(|ingress| {
            ingress
                .iter()
                .filter_map(|i| i.ip.clone())
                .filter(|ip| !ip.is_empty())
                .collect()
        })
        .unwrap_or_default();

    ips.sort();
    ips
}

/// Returns a copy of the service whose ingress list is exactly `addresses`.
fn with_addresses(svc: &Service, addresses: &BTreeSet<String>) -> Service {
    let mut updated = svc.clone();
    let ingress = addresses
        .iter()
        .map(|ip| LoadBalancerIngress {
            ip: Some(ip.clone()),
            ..Default::default()
        })
        .collect();

    updated
        .status
        .get_or_insert_with(ServiceStatus::default)
        .load_balancer = Some(LoadBalancerStatus {
        ingress: Some(ingress),
    });
    updated
}

/// Publishes `resolved` on the service unless it already matches.
///
/// The comparison ignores order. On change the whole ingress list is
/// replaced through a status-only write. Returns whether a write happened.
///
/// # Errors
///
/// Propagates the status write failure.
pub async fn sync_addresses(
    client: &dyn ClusterClient,
    svc: &Service,
    resolved: &BTreeSet<String>,
) -> Result<bool> {
    let existing = published_addresses(svc);

    // BTreeSet iterates in sorted order.
    if existing.iter().eq(resolved.iter()) {
        tracing::debug!("published addresses already match: {existing:?}");
        return Ok(false);
    }

    tracing::info!("updating published addresses from {existing:?} to {resolved:?}");
    client
        .update_service_status(&with_addresses(svc, resolved))
        .await?;
    Ok(true)
}
