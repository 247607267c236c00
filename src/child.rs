//! Keeps a service's forwarding daemon set converged.
//!
//! The stored daemon set's fingerprint annotation is compared with the
//! fingerprint of the desired one:
//!
//! 1. No stored daemon set: create it
//! 2. Fingerprints differ: replace it with the desired one
//! 3. Fingerprints match: nothing to write

use k8s_openapi::api::apps::v1::DaemonSet;
use kube::ResourceExt;

use crate::client::ClusterClient;
use crate::constants::SERVICE_HASH_ANNOTATION;
use crate::error::{Error, Result};

/// Result of syncing a forwarding daemon set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildSync {
    /// The daemon set did not exist and was created.
    Created,
    /// The daemon set was out of date and was replaced.
    Updated,
    /// The daemon set already matched; nothing was written.
    Converged,
}

/// Write needed to converge a daemon set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ChildAction {
    Create,
    Replace,
    None,
}

fn fingerprint_of(ds: &DaemonSet) -> Option<&str> {
    ds.annotations()
        .get(SERVICE_HASH_ANNOTATION)
        .map(String::as_str)
}

/// Decides which write, if any, converges `existing` to `desired`.
fn plan(existing: Option<&DaemonSet>, desired: &DaemonSet) -> ChildAction {
    let Some(existing) = existing else {
        return ChildAction::Create;
    };

    match (fingerprint_of(existing), fingerprint_of(desired)) {
        (Some(stored), Some(wanted)) if stored == wanted => ChildAction::None,
        _ => ChildAction::Replace,
    }
}

/// Ensures the stored daemon set matches `desired`.
///
/// `desired` must carry the current service fingerprint in its
/// [`SERVICE_HASH_ANNOTATION`]. A replacement keeps the stored object's
/// resource version so a concurrent change fails with a conflict.
///
/// # Errors
///
/// Propagates any store error from the lookup or the write.
pub async fn sync_daemon_set(
    client: &dyn ClusterClient,
    mut desired: DaemonSet,
) -> Result<ChildSync> {
    let name = desired
        .metadata
        .name
        .clone()
        .ok_or(Error::MissingObjectKey("metadata.name"))?;
    let namespace = desired
        .metadata
        .namespace
        .clone()
        .ok_or(Error::MissingObjectKey("metadata.namespace"))?;

    let existing = client.get_daemon_set(&namespace, &name).await?;

    match plan(existing.as_ref(), &desired) {
        ChildAction::Create => {
            tracing::info!("creating daemon set {namespace}/{name}");
            client.create_daemon_set(&desired).await?;
            Ok(ChildSync::Created)
        }

        ChildAction::Replace => {
            tracing::info!("updating daemon set {namespace}/{name}");
            desired.metadata.resource_version =
                existing.and_then(|ds| ds.metadata.resource_version);
            client.replace_daemon_set(&desired).await?;
            Ok(ChildSync::Updated)
        }

        ChildAction::None => {
            tracing::debug!("daemon set {namespace}/{name} is up to date");
            Ok(ChildSync::Converged)
        }
    }
}
