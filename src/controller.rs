//! Runs the reconciler under a `kube` controller.
//!
//! The controller watches `Service` objects and the forwarding daemon sets
//! they own, so a daemon set rollout re-triggers its service. It guarantees
//! a single in-flight pass per service and requeues failed passes.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::Service;
use kube::runtime::Controller;
use kube::runtime::controller::{self, Action, Config as ControllerConfig};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::{Api, Client, ResourceExt};

use crate::client::KubeClusterClient;
use crate::config::Config;
use crate::desired::owned_daemon_set_selector;
use crate::error::{Error, Result};
use crate::reconcile::{Outcome, ServiceReconciler};

/// Delay before a failed pass is retried.
pub const RETRY_DELAY: Duration = Duration::from_secs(15);

/// Reconciles the service delivered by the controller.
///
/// # Errors
///
/// Returns the error of a failed pass; see [`error_policy`].
#[allow(clippy::needless_pass_by_value)]
pub async fn reconcile(svc: Arc<Service>, ctx: Arc<ServiceReconciler>) -> Result<Action> {
    let namespace = svc
        .namespace()
        .ok_or(Error::MissingObjectKey("metadata.namespace"))?;
    let name = svc.name_any();

    let outcome = ctx.reconcile(&namespace, &name).await?;
    match &outcome {
        Outcome::ServiceNotFound | Outcome::Skipped | Outcome::AddressesInSync => {
            tracing::debug!("{namespace}/{name}: {outcome:?}");
        }
        _ => tracing::info!("{namespace}/{name}: {outcome:?}"),
    }

    Ok(Action::await_change())
}

/// Logs a failed pass and schedules a retry.
#[allow(clippy::needless_pass_by_value)]
pub fn error_policy(svc: Arc<Service>, error: &Error, _ctx: Arc<ServiceReconciler>) -> Action {
    tracing::error!(
        "failed to reconcile service {}/{}: {error}",
        svc.namespace().unwrap_or_default(),
        svc.name_any()
    );
    Action::requeue(RETRY_DELAY)
}

/// Runs the controller until a shutdown signal is received.
pub async fn run(client: Client, config: Config) {
    let services: Api<Service> = Api::all(client.clone());
    let daemon_sets: Api<DaemonSet> = Api::all(client.clone());

    let reconciler = Arc::new(ServiceReconciler::new(
        Arc::new(KubeClusterClient::new(client)),
        Arc::new(config),
    ));

    tracing::info!(
        "starting service controller with forwarder image {} and concurrency {}",
        reconciler.config().forwarder_image,
        reconciler.config().concurrency
    );

    Controller::new(services, WatcherConfig::default())
        .owns(
            daemon_sets,
            WatcherConfig::default().labels(owned_daemon_set_selector()),
        )
        .with_config(ControllerConfig::default().concurrency(reconciler.config().concurrency))
        .shutdown_on_signal()
        .run(reconcile, error_policy, reconciler)
        .for_each(|res| async move {
            match res {
                Ok(_) => {}
                // already logged by error_policy
                Err(e @ controller::Error::ReconcilerFailed(..)) => tracing::debug!("{e}"),
                Err(e) => tracing::warn!("controller error: {e}"),
            }
        })
        .await;

    tracing::info!("service controller terminated");
}
