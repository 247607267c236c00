//! Service fingerprinting for drift detection.
//!
//! The fingerprint covers exactly the traffic-relevant part of a service:
//! its exposed ports (name, protocol, number) and its cluster IP. It is
//! stamped onto the forwarding daemon set so later passes can tell whether
//! the daemon set still matches the service without comparing pod templates.

use k8s_openapi::api::core::v1::Service;
use serde_json::json;
use sha2::{Digest, Sha256};

/// Computes the fingerprint of a service's traffic-relevant specification.
///
/// Never fails. If the input cannot be encoded the empty string is returned,
/// which no written daemon set carries and therefore forces a resync.
#[must_use]
pub fn service_fingerprint(svc: &Service) -> String {
    let spec = svc.spec.as_ref();

    let ports: Vec<_> = spec
        .and_then(|s| s.ports.as_ref())
        .map(|ports| {
            ports
                .iter()
                .map(|p| {
                    json!({
                        "name": p.name.as_deref().unwrap_or_default(),
                        "protocol": p.protocol.as_deref().unwrap_or("TCP"),
                        "port": p.port,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let cluster_ip = spec
        .and_then(|s| s.cluster_ip.as_deref())
        .unwrap_or_default();

    let payload = json!({ "ports": ports, "clusterIP": cluster_ip });
    match serde_json::to_vec(&payload) {
        Ok(bytes) => format!("{:x}", Sha256::digest(&bytes)),
        Err(e) => {
            tracing::warn!("failed to encode service spec for fingerprint: {e}");
            String::new()
        }
    }
}
