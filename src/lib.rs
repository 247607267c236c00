#![deny(missing_docs)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Kubernetes `LoadBalancer` services backed by host-network forwarding agents.
//!
//! For every `LoadBalancer` service this controller runs a daemon set of
//! forwarding agents on opted-in nodes. Each agent binds a service port on
//! its node and forwards traffic to the service's cluster IP. The addresses
//! of the nodes running ready agents are published on the service's load
//! balancer status.
//!
//! # Features
//!
//! - **Drift detection**: the daemon set is stamped with a fingerprint of the
//!   service's ports and cluster IP and rewritten only when it changes
//! - **Address publishing**: node external IPs (falling back to internal IPs)
//!   of ready agents, deduplicated and order-insensitive
//! - **Idempotent passes**: unchanged services and topology cause no writes
//!
//! # Usage
//!
//! ```ignore
//! use host_lb_k8s::{Config, run};
//!
//! let client = kube::Client::try_default().await?;
//! run(client, Config::new("rancher/klipper-lb:v0.4.13")).await;
//! ```
//!
//! Nodes opt in to hosting agents with the label
//! `hostlb.eclipticalsoftware.com/enablelb=true`.

pub mod addresses;
pub mod child;
pub mod client;
pub mod config;
pub mod constants;
pub mod controller;
pub mod desired;
pub mod error;
pub mod fingerprint;
pub mod reconcile;
pub mod status;

pub use client::{ClusterClient, KubeClusterClient};
pub use config::Config;
pub use controller::run;
pub use error::{Error, Result};
pub use reconcile::{Outcome, ServiceReconciler};
