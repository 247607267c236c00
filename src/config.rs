//! Process configuration.

use clap::Parser;

/// Default forwarding agent image.
pub const DEFAULT_FORWARDER_IMAGE: &str = "rancher/klipper-lb:v0.4.13";

/// Default number of services reconciled in parallel.
pub const DEFAULT_CONCURRENCY: u16 = 4;

/// Configuration for the load balancer controller.
///
/// Read once at start-up; every flag can also be supplied through the
/// environment.
#[derive(Clone, Debug, Parser, PartialEq, Eq)]
#[command(name = "host-lb-k8s", version, about, long_about = None)]
pub struct Config {
    /// Image run by every forwarding container.
    #[arg(long, env = "FORWARDER_IMAGE", default_value = DEFAULT_FORWARDER_IMAGE)]
    pub forwarder_image: String,

    /// Maximum number of services reconciled in parallel (0 = unbounded).
    #[arg(long, env = "CONTROLLER_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: u16,

    /// Emit logs as JSON lines.
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

impl Config {
    /// Creates a configuration using the given forwarder image and defaults
    /// for everything else.
    #[must_use]
    pub fn new(forwarder_image: impl Into<String>) -> Self {
        Self {
            forwarder_image: forwarder_image.into(),
            concurrency: DEFAULT_CONCURRENCY,
            log_json: false,
        }
    }

    /// Sets the worker concurrency.
    #[must_use]
    pub fn concurrency(mut self, concurrency: u16) -> Self {
        self.concurrency = concurrency;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_FORWARDER_IMAGE)
    }
}
