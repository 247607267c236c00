//! Desired forwarding daemon set for a `LoadBalancer` service.
//!
//! # Layout
//!
//! For a service `web` in namespace `shop` the daemon set is `shop/hostlb-web`:
//!
//! 1. Owned by the service (controller owner reference), so deleting the
//!    service garbage-collects the daemon set
//! 2. One forwarding container per service port, binding the port on the
//!    host and forwarding it to the service's cluster IP
//! 3. A privileged `sysctl` init container enabling IP forwarding
//! 4. Scheduled only on nodes labelled with [`NODE_ENABLE_LABEL`], tolerating
//!    control-plane and critical add-on taints
//! 5. Annotated with the service fingerprint

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{DaemonSet, DaemonSetSpec, DaemonSetUpdateStrategy};
use k8s_openapi::api::core::v1::{
    Capabilities, Container, ContainerPort, EnvVar, PodSpec, PodTemplateSpec, SecurityContext,
    Service, ServicePort, Toleration,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::{Resource, ResourceExt};

use crate::constants::{
    CONTROL_PLANE_TAINT, CRITICAL_ADDONS_TAINT, DAEMON_SET_PREFIX, HEADLESS_CLUSTER_IP,
    ISTIO_INJECT_ANNOTATION, LOAD_BALANCER_TYPE, NODE_ENABLE_LABEL, NODE_ENABLE_VALUE,
    SERVICE_HASH_ANNOTATION, SERVICE_NAME_LABEL, env,
};
use crate::error::{Error, Result};
use crate::fingerprint::service_fingerprint;

/// Returns the name of the forwarding daemon set for a service.
#[must_use]
pub fn daemon_set_name(service_name: &str) -> String {
    format!("{DAEMON_SET_PREFIX}{service_name}")
}

/// Label selector matching the daemon sets built by [`build_daemon_set`].
///
/// The controller watches owned daemon sets through this selector, so every
/// built daemon set must carry the label on its own metadata.
#[must_use]
pub fn owned_daemon_set_selector() -> &'static str {
    SERVICE_NAME_LABEL
}

/// Returns the cluster IP of a service if it is one this controller serves.
///
/// A service qualifies when it is of type `LoadBalancer` and has an assigned,
/// non-headless cluster IP.
#[must_use]
pub fn qualifying_cluster_ip(svc: &Service) -> Option<&str> {
    let spec = svc.spec.as_ref()?;
    if spec.type_.as_deref() != Some(LOAD_BALANCER_TYPE) {
        return None;
    }

    spec.cluster_ip
        .as_deref()
        .filter(|ip| !ip.is_empty() && *ip != HEADLESS_CLUSTER_IP)
}

/// Builds the desired forwarding daemon set for a qualifying service.
///
/// The result depends only on the service and the image, so repeated builds
/// are identical.
///
/// # Errors
///
/// Returns [`Error::MissingObjectKey`] if the service lacks the namespace,
/// name or uid needed to place and own the daemon set.
pub fn build_daemon_set(svc: &Service, forwarder_image: &str) -> Result<DaemonSet> {
    let name = svc
        .metadata
        .name
        .as_deref()
        .ok_or(Error::MissingObjectKey("metadata.name"))?;
    let namespace = svc
        .namespace()
        .ok_or(Error::MissingObjectKey("metadata.namespace"))?;
    let owner = svc
        .controller_owner_ref(&())
        .ok_or(Error::MissingObjectKey("metadata.uid"))?;

    let ds_name = daemon_set_name(name);
    let labels = BTreeMap::from([
        ("app".to_string(), ds_name.clone()),
        (SERVICE_NAME_LABEL.to_string(), name.to_string()),
    ]);

    let cluster_ip = svc
        .spec
        .as_ref()
        .and_then(|s| s.cluster_ip.as_deref())
        .unwrap_or_default();

    let containers = svc
        .spec
        .as_ref()
        .and_then(|s| s.ports.as_ref())
        .map(|ports| {
            ports
                .iter()
                .enumerate()
                .map(|(i, port)| forwarding_container(i, port, cluster_ip, forwarder_image))
                .collect()
        })
        .unwrap_or_default();

    Ok(DaemonSet {
        metadata: ObjectMeta {
            name: Some(ds_name),
            namespace: Some(namespace),
            labels: Some(labels.clone()),
            owner_references: Some(vec![owner]),
            annotations: Some(BTreeMap::from([(
                SERVICE_HASH_ANNOTATION.to_string(),
                service_fingerprint(svc),
            )])),
            ..Default::default()
        },
        spec: Some(DaemonSetSpec {
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    annotations: Some(BTreeMap::from([(
                        ISTIO_INJECT_ANNOTATION.to_string(),
                        "false".to_string(),
                    )])),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    tolerations: Some(tolerations()),
                    node_selector: Some(BTreeMap::from([(
                        NODE_ENABLE_LABEL.to_string(),
                        NODE_ENABLE_VALUE.to_string(),
                    )])),
                    init_containers: Some(vec![sysctl_container(forwarder_image)]),
                    containers,
                    ..Default::default()
                }),
            },
            update_strategy: Some(DaemonSetUpdateStrategy {
                type_: Some("RollingUpdate".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    })
}

fn tolerations() -> Vec<Toleration> {
    vec![
        Toleration {
            key: Some(CONTROL_PLANE_TAINT.to_string()),
            operator: Some("Exists".to_string()),
            effect: Some("NoSchedule".to_string()),
            ..Default::default()
        },
        Toleration {
            key: Some(CRITICAL_ADDONS_TAINT.to_string()),
            operator: Some("Exists".to_string()),
            ..Default::default()
        },
    ]
}

/// Init container enabling IP forwarding on the host network namespace.
fn sysctl_container(image: &str) -> Container {
    Container {
        name: "sysctl".to_string(),
        image: Some(image.to_string()),
        command: Some(vec![
            "sh".to_string(),
            "-c".to_string(),
            "sysctl -w net.ipv4.ip_forward=1".to_string(),
        ]),
        security_context: Some(SecurityContext {
            privileged: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Forwarding container for the service port at `index`.
///
/// Unnamed ports get a positional name so container names stay unique.
fn forwarding_container(index: usize, port: &ServicePort, dest_ip: &str, image: &str) -> Container {
    let name = port
        .name
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("port-{index}"));
    let protocol = port.protocol.clone().unwrap_or_else(|| "TCP".to_string());
    let number = port.port.to_string();

    let env_var = |key: &str, value: &str| EnvVar {
        name: key.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    };

    Container {
        name: name.clone(),
        image: Some(image.to_string()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        ports: Some(vec![ContainerPort {
            name: Some(name),
            container_port: port.port,
            host_port: Some(port.port),
            protocol: Some(protocol.clone()),
            ..Default::default()
        }]),
        env: Some(vec![
            env_var(env::SRC_PORT, &number),
            env_var(env::DEST_PROTO, &protocol),
            env_var(env::DEST_PORT, &number),
            env_var(env::DEST_IP, dest_ip),
        ]),
        security_context: Some(SecurityContext {
            capabilities: Some(Capabilities {
                add: Some(vec!["NET_ADMIN".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}
