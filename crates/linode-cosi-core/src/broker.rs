//! Short-lived S3 credentials for bucket maintenance.
//!
//! Bucket policies and forced cleanups go through S3, which needs a key pair.
//! In ephemeral mode the [`KeyBroker`] creates a key limited to the one bucket
//! and deletes it once the work is done. Otherwise it hands out the static
//! client configured at startup.

use std::sync::Arc;
use std::time::Duration;

use crate::error::LinodeError;
use crate::linode::{CreateKeyOptions, KeyBucketAccess, LinodeClient, Permissions};
use crate::s3::{S3ClientFactory, S3PolicyClient};

/// Upper bound of an ephemeral key deletion.
pub const KEY_CLEANUP_TIMEOUT: Duration = Duration::from_secs(3);

/// Label prefix of ephemeral keys.
pub const EPHEMERAL_KEY_PREFIX: &str = "cosi-bucket-";

/// Hands out S3 clients for one bucket.
#[derive(Clone)]
pub struct KeyBroker {
    linode: Arc<dyn LinodeClient>,
    factory: Arc<dyn S3ClientFactory>,
    static_client: Option<Arc<dyn S3PolicyClient>>,
}

impl std::fmt::Debug for KeyBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyBroker")
            .field("ephemeral", &self.is_ephemeral())
            .finish_non_exhaustive()
    }
}

impl KeyBroker {
    /// Broker creating a fresh key for every lease.
    #[must_use]
    pub fn ephemeral(linode: Arc<dyn LinodeClient>, factory: Arc<dyn S3ClientFactory>) -> Self {
        Self {
            linode,
            factory,
            static_client: None,
        }
    }

    /// Broker reusing one key pair for every lease.
    #[must_use]
    pub fn with_static_keys(
        linode: Arc<dyn LinodeClient>,
        factory: Arc<dyn S3ClientFactory>,
        access_key: &str,
        secret_key: &str,
    ) -> Self {
        let client = factory.client(access_key, secret_key);
        Self {
            linode,
            factory,
            static_client: Some(client),
        }
    }

    /// Whether leases are backed by ephemeral keys.
    #[must_use]
    pub fn is_ephemeral(&self) -> bool {
        self.static_client.is_none()
    }

    /// Lease a client able to manage `region/label`.
    pub async fn obtain(&self, region: &str, label: &str) -> Result<KeyLease, LinodeError> {
        if let Some(client) = &self.static_client {
            return Ok(KeyLease {
                client: Arc::clone(client),
                key_id: None,
                linode: Arc::clone(&self.linode),
            });
        }

        let key = self
            .linode
            .create_key(CreateKeyOptions {
                label: format!("{EPHEMERAL_KEY_PREFIX}{}", uuid::Uuid::new_v4()),
                bucket_access: Some(vec![KeyBucketAccess {
                    region: region.to_owned(),
                    bucket_name: label.to_owned(),
                    permissions: Permissions::ReadWrite,
                }]),
            })
            .await?;
        tracing::debug!(key_id = key.id, region, bucket = label, "created ephemeral key");

        Ok(KeyLease {
            client: self.factory.client(&key.access_key, &key.secret_key),
            key_id: Some(key.id),
            linode: Arc::clone(&self.linode),
        })
    }
}

/// An S3 client, plus the ephemeral key backing it.
///
/// Call [`KeyLease::release`] when done. A lease dropped without release
/// still schedules the key deletion on the current runtime.
pub struct KeyLease {
    client: Arc<dyn S3PolicyClient>,
    key_id: Option<u64>,
    linode: Arc<dyn LinodeClient>,
}

impl std::fmt::Debug for KeyLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyLease")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl KeyLease {
    /// The leased client.
    #[must_use]
    pub fn client(&self) -> &dyn S3PolicyClient {
        self.client.as_ref()
    }

    /// Id of the backing ephemeral key, if any.
    #[must_use]
    pub fn key_id(&self) -> Option<u64> {
        self.key_id
    }

    /// Delete the ephemeral key. Failures are logged, never returned.
    ///
    /// The deletion runs on its own task, so it completes even if the
    /// caller is cancelled while waiting.
    pub async fn release(mut self) {
        let Some(id) = self.key_id.take() else {
            return;
        };
        let handle = tokio::spawn(delete_key(Arc::clone(&self.linode), id));
        if let Err(e) = handle.await {
            tracing::error!(key_id = id, error = %e, "key cleanup task failed");
        }
    }
}

impl Drop for KeyLease {
    fn drop(&mut self) {
        let Some(id) = self.key_id.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(delete_key(Arc::clone(&self.linode), id));
            }
            Err(_) => {
                tracing::warn!(key_id = id, "no runtime to delete ephemeral key, key left behind");
            }
        }
    }
}

async fn delete_key(linode: Arc<dyn LinodeClient>, id: u64) {
    match tokio::time::timeout(KEY_CLEANUP_TIMEOUT, linode.delete_key(id)).await {
        Ok(Ok(())) => tracing::debug!(key_id = id, "deleted ephemeral key"),
        Ok(Err(e)) if e.is_not_found() => {}
        Ok(Err(e)) => tracing::error!(key_id = id, error = %e, "failed to delete key"),
        Err(_) => tracing::error!(
            key_id = id,
            timeout = ?KEY_CLEANUP_TIMEOUT,
            "timed out deleting key"
        ),
    }
}
