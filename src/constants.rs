//! Label, annotation and environment keys shared by the controller and the
//! forwarding daemon sets it manages.

/// Label carried by every forwarding pod, holding the owning service's name.
///
/// The backing pod set of a service is every pod in its namespace with this
/// label set to the service name.
pub const SERVICE_NAME_LABEL: &str = "hostlb.eclipticalsoftware.com/svcname";

/// Annotation on a forwarding daemon set holding the service fingerprint it
/// was last written for.
pub const SERVICE_HASH_ANNOTATION: &str = "hostlb.eclipticalsoftware.com/svchash";

/// Node label opting a node in to running forwarding agents.
pub const NODE_ENABLE_LABEL: &str = "hostlb.eclipticalsoftware.com/enablelb";

/// Value the opt-in node label must carry.
pub const NODE_ENABLE_VALUE: &str = "true";

/// Prefix of every forwarding daemon set name.
pub const DAEMON_SET_PREFIX: &str = "hostlb-";

/// Pod template annotation disabling Istio sidecar injection.
pub const ISTIO_INJECT_ANNOTATION: &str = "sidecar.istio.io/inject";

/// Service type served by this controller.
pub const LOAD_BALANCER_TYPE: &str = "LoadBalancer";

/// Cluster IP value of headless services.
pub const HEADLESS_CLUSTER_IP: &str = "None";

/// Taint key of control-plane nodes.
pub const CONTROL_PLANE_TAINT: &str = "node-role.kubernetes.io/control-plane";

/// Taint key of nodes reserved for critical add-ons.
pub const CRITICAL_ADDONS_TAINT: &str = "CriticalAddonsOnly";

/// Node address types, in order of preference.
pub const NODE_EXTERNAL_IP: &str = "ExternalIP";
/// See [`NODE_EXTERNAL_IP`].
pub const NODE_INTERNAL_IP: &str = "InternalIP";

/// Forwarding agent environment.
pub mod env {
    /// Port the agent binds on the host.
    pub const SRC_PORT: &str = "SRC_PORT";
    /// Protocol forwarded (`TCP`, `UDP` or `SCTP`).
    pub const DEST_PROTO: &str = "DEST_PROTO";
    /// Port traffic is forwarded to.
    pub const DEST_PORT: &str = "DEST_PORT";
    /// Address traffic is forwarded to (the service's cluster IP).
    pub const DEST_IP: &str = "DEST_IP";
}
