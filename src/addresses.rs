//! Resolves the externally reachable addresses of a service from the nodes
//! running its ready forwarding pods.

use std::collections::{BTreeSet, HashMap};

use k8s_openapi::api::core::v1::{Node, Pod};

use crate::client::ClusterClient;
use crate::constants::{NODE_EXTERNAL_IP, NODE_INTERNAL_IP};
use crate::error::Result;

/// Returns true if the pod's `Ready` condition is `True`.
#[must_use]
pub fn is_pod_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
}

/// Returns the node a pod runs on if the pod can serve traffic: it is
/// scheduled, has an IP and is ready.
fn serving_node(pod: &Pod) -> Option<&str> {
    let node_name = pod
        .spec
        .as_ref()
        .and_then(|s| s.node_name.as_deref())
        .filter(|n| !n.is_empty())?;

    let has_ip = pod
        .status
        .as_ref()
        .and_then(|s| s.pod_ip.as_deref())
        .is_some_and(|ip| !ip.is_empty());

    (has_ip && is_pod_ready(pod)).then_some(node_name)
}

/// Picks the address a node is reached on: its external IP if it has one,
/// otherwise its internal IP.
#[must_use]
pub fn node_address(node: &Node) -> Option<String> {
    let addresses = node.status.as_ref()?.addresses.as_ref()?;

    let find = |type_: &str| {
        addresses
            .iter()
            .find(|a| a.type_ == type_ && !a.address.is_empty())
            .map(|a| a.address.clone())
    };

    find(NODE_EXTERNAL_IP).or_else(|| find(NODE_INTERNAL_IP))
}

/// Resolves the deduplicated address set of the given backing pods.
///
/// Pods that are unscheduled, have no IP or are not ready are skipped, as are
/// pods whose node no longer exists. Each node is looked up once.
///
/// # Errors
///
/// Propagates node lookup failures other than not-found.
pub async fn resolve_addresses(
    client: &dyn ClusterClient,
    pods: &[Pod],
) -> Result<BTreeSet<String>> {
    let mut nodes: HashMap<&str, Option<String>> = HashMap::new();

    for node_name in pods.iter().filter_map(serving_node) {
        if nodes.contains_key(node_name) {
            continue;
        }

        let address = match client.get_node(node_name).await? {
            Some(node) => {
                let address = node_address(&node);
                if address.is_none() {
                    tracing::debug!("node {node_name} has no usable address");
                }
                address
            }

            None => {
                tracing::debug!("node {node_name} not found, skipping");
                None
            }
        };

        nodes.insert(node_name, address);
    }

    Ok(nodes.into_values().flatten().collect())
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::{NodeAddress, NodeStatus, PodCondition, PodSpec, PodStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    use super::*;
    use crate::client::MockClusterClient;
    use crate::error::Error;

    // Helper to create a pod with an optional node, IP and ready condition
    fn make_pod(node: Option<&str>, ip: Option<&str>, ready: Option<bool>) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(format!("hostlb-web-{}", node.unwrap_or("pending"))),
                ..Default::default()
            },
            spec: Some(PodSpec {
                node_name: node.map(String::from),
                ..Default::default()
            }),
            status: Some(PodStatus {
                pod_ip: ip.map(String::from),
                conditions: ready.map(|r| {
                    vec![PodCondition {
                        type_: "Ready".to_string(),
                        status: if r { "True" } else { "False" }.to_string(),
                        ..Default::default()
                    }]
                }),
                ..Default::default()
            }),
        }
    }

    // Helper to create a node with the given (type, address) pairs
    fn make_node(addresses: &[(&str, &str)]) -> Node {
        Node {
            status: Some(NodeStatus {
                addresses: Some(
                    addresses
                        .iter()
                        .map(|(type_, address)| NodeAddress {
                            type_: (*type_).to_string(),
                            address: (*address).to_string(),
                        })
                        .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn client_with_nodes(nodes: Vec<(&'static str, Node)>) -> MockClusterClient {
        let nodes: HashMap<&'static str, Node> = nodes.into_iter().collect();
        let mut client = MockClusterClient::new();
        client
            .expect_get_node()
            .returning(move |name| Ok(nodes.get(name).cloned()));
        client
    }

    // is_pod_ready tests

    #[test]
    fn pod_ready_when_condition_true() {
        assert!(is_pod_ready(&make_pod(Some("n1"), Some("10.1.0.1"), Some(true))));
    }

    #[test]
    fn pod_not_ready_when_condition_false() {
        assert!(!is_pod_ready(&make_pod(Some("n1"), Some("10.1.0.1"), Some(false))));
    }

    #[test]
    fn pod_not_ready_without_conditions() {
        assert!(!is_pod_ready(&make_pod(Some("n1"), Some("10.1.0.1"), None)));
        assert!(!is_pod_ready(&Pod::default()));
    }

    #[test]
    fn pod_ready_ignores_other_conditions() {
        let mut pod = make_pod(Some("n1"), Some("10.1.0.1"), None);
        pod.status.as_mut().unwrap().conditions = Some(vec![PodCondition {
            type_: "PodScheduled".to_string(),
            status: "True".to_string(),
            ..Default::default()
        }]);

        assert!(!is_pod_ready(&pod));
    }

    // node_address tests

    #[test]
    fn node_address_prefers_external() {
        let node = make_node(&[("InternalIP", "192.168.0.10"), ("ExternalIP", "1.2.3.4")]);
        assert_eq!(node_address(&node).as_deref(), Some("1.2.3.4"));
    }

    #[test]
    fn node_address_falls_back_to_internal() {
        let node = make_node(&[("Hostname", "node-1"), ("InternalIP", "192.168.0.10")]);
        assert_eq!(node_address(&node).as_deref(), Some("192.168.0.10"));
    }

    #[test]
    fn node_address_none_without_ip_addresses() {
        assert_eq!(node_address(&make_node(&[("Hostname", "node-1")])), None);
        assert_eq!(node_address(&Node::default()), None);
    }

    #[test]
    fn node_address_skips_empty_external() {
        let node = make_node(&[("ExternalIP", ""), ("InternalIP", "192.168.0.10")]);
        assert_eq!(node_address(&node).as_deref(), Some("192.168.0.10"));
    }

    // resolve_addresses tests

    #[tokio::test]
    async fn resolve_collects_ready_pod_nodes() {
        let client = client_with_nodes(vec![
            ("n1", make_node(&[("ExternalIP", "1.2.3.4")])),
            ("n2", make_node(&[("ExternalIP", "5.6.7.8")])),
        ]);
        let pods = vec![
            make_pod(Some("n1"), Some("10.1.0.1"), Some(true)),
            make_pod(Some("n2"), Some("10.1.0.2"), Some(true)),
        ];

        let addrs = resolve_addresses(&client, &pods).await.unwrap();
        assert_eq!(addrs, BTreeSet::from(["1.2.3.4".to_string(), "5.6.7.8".to_string()]));
    }

    #[tokio::test]
    async fn resolve_is_order_insensitive() {
        let client = client_with_nodes(vec![
            ("n1", make_node(&[("ExternalIP", "1.2.3.4")])),
            ("n2", make_node(&[("ExternalIP", "5.6.7.8")])),
        ]);
        let mut pods = vec![
            make_pod(Some("n1"), Some("10.1.0.1"), Some(true)),
            make_pod(Some("n2"), Some("10.1.0.2"), Some(true)),
        ];

        let forward = resolve_addresses(&client, &pods).await.unwrap();
        pods.reverse();
        let backward = resolve_addresses(&client, &pods).await.unwrap();

        assert_eq!(forward, backward);
    }

    #[tokio::test]
    async fn resolve_skips_unready_and_unassigned_pods() {
        let mut client = MockClusterClient::new();
        client
            .expect_get_node()
            .withf(|name| name == "n1")
            .times(1)
            .returning(|_| Ok(Some(make_node(&[("ExternalIP", "1.2.3.4")]))));

        let pods = vec![
            make_pod(Some("n1"), Some("10.1.0.1"), Some(true)),
            make_pod(Some("n2"), Some("10.1.0.2"), Some(false)),
            make_pod(Some("n3"), None, Some(true)),
            make_pod(None, Some("10.1.0.4"), Some(true)),
            make_pod(Some("n5"), Some("10.1.0.5"), None),
        ];

        let addrs = resolve_addresses(&client, &pods).await.unwrap();
        assert_eq!(addrs, BTreeSet::from(["1.2.3.4".to_string()]));
    }

    #[tokio::test]
    async fn resolve_dedups_co_located_pods() {
        let mut client = MockClusterClient::new();
        client
            .expect_get_node()
            .times(1)
            .returning(|_| Ok(Some(make_node(&[("ExternalIP", "1.2.3.4")]))));

        let pods = vec![
            make_pod(Some("n1"), Some("10.1.0.1"), Some(true)),
            make_pod(Some("n1"), Some("10.1.0.2"), Some(true)),
        ];

        let addrs = resolve_addresses(&client, &pods).await.unwrap();
        assert_eq!(addrs.len(), 1);
    }

    #[tokio::test]
    async fn resolve_dedups_nodes_sharing_an_address() {
        let client = client_with_nodes(vec![
            ("n1", make_node(&[("InternalIP", "192.168.0.10")])),
            ("n2", make_node(&[("InternalIP", "192.168.0.10")])),
        ]);
        let pods = vec![
            make_pod(Some("n1"), Some("10.1.0.1"), Some(true)),
            make_pod(Some("n2"), Some("10.1.0.2"), Some(true)),
        ];

        let addrs = resolve_addresses(&client, &pods).await.unwrap();
        assert_eq!(addrs, BTreeSet::from(["192.168.0.10".to_string()]));
    }

    #[tokio::test]
    async fn resolve_skips_missing_nodes() {
        let client = client_with_nodes(vec![("n1", make_node(&[("ExternalIP", "1.2.3.4")]))]);
        let pods = vec![
            make_pod(Some("n1"), Some("10.1.0.1"), Some(true)),
            make_pod(Some("gone"), Some("10.1.0.2"), Some(true)),
        ];

        let addrs = resolve_addresses(&client, &pods).await.unwrap();
        assert_eq!(addrs, BTreeSet::from(["1.2.3.4".to_string()]));
    }

    #[tokio::test]
    async fn resolve_skips_nodes_without_addresses() {
        let client = client_with_nodes(vec![("n1", make_node(&[("Hostname", "node-1")]))]);
        let pods = vec![make_pod(Some("n1"), Some("10.1.0.1"), Some(true))];

        let addrs = resolve_addresses(&client, &pods).await.unwrap();
        assert!(addrs.is_empty());
    }

    #[tokio::test]
    async fn resolve_aborts_on_lookup_failure() {
        let mut client = MockClusterClient::new();
        client
            .expect_get_node()
            .returning(|_| Err(Error::MissingObjectKey("metadata.name")));
        let pods = vec![make_pod(Some("n1"), Some("10.1.0.1"), Some(true))];

        let result = resolve_addresses(&client, &pods).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn resolve_empty_pod_set() {
        let mut client = MockClusterClient::new();
        client.expect_get_node().never();

        let addrs = resolve_addresses(&client, &[]).await.unwrap();
        assert!(addrs.is_empty());
    }
}
