//! Region to S3 endpoint cache.
//!
//! The provisioner needs the S3 hostname of a region for every grant and every
//! policy write. [`EndpointCache`] answers from memory and is kept fresh by
//! [`EndpointCache::run`], a background loop that re-lists the provider's
//! endpoints every TTL.
//!
//! Entries are only ever added or overwritten, never removed, so a provider
//! outage leaves the last known endpoints in place.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::CacheError;
use crate::linode::LinodeClient;

/// Default and minimum refresh interval.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Upper bound of a single periodic refresh.
pub const REFRESH_TIMEOUT: Duration = Duration::from_secs(15);

/// Read access to region endpoints.
pub trait EndpointResolver: Send + Sync + 'static {
    /// S3 hostname of `region`, if known.
    fn endpoint(&self, region: &str) -> Option<String>;
}

/// Endpoint cache backed by the provider's endpoint listing.
pub struct EndpointCache {
    client: Arc<dyn LinodeClient>,
    ttl: Duration,
    entries: RwLock<HashMap<String, String>>,
}

impl std::fmt::Debug for EndpointCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointCache")
            .field("ttl", &self.ttl)
            .field("entries", &*self.entries.read())
            .finish_non_exhaustive()
    }
}

impl EndpointCache {
    /// Create an empty cache. A `ttl` below [`DEFAULT_TTL`] is raised to it.
    #[must_use]
    pub fn new(client: Arc<dyn LinodeClient>, ttl: Duration) -> Self {
        Self {
            client,
            ttl: ttl.max(DEFAULT_TTL),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Effective refresh interval.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a region.
    #[must_use]
    pub fn get(&self, region: &str) -> Option<String> {
        self.entries.read().get(region).cloned()
    }

    /// Insert or overwrite one entry.
    pub fn set(&self, region: impl Into<String>, endpoint: impl Into<String>) {
        self.entries.write().insert(region.into(), endpoint.into());
    }

    /// Insert or overwrite many entries under one write lock.
    pub fn extend<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.entries.write().extend(entries);
    }

    /// Number of known regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no region is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Fetch the endpoint listing and merge it in. Endpoints without a
    /// hostname are skipped. Returns the number of entries written.
    pub async fn refresh(&self) -> Result<usize, CacheError> {
        tracing::debug!("refreshing endpoint cache");

        let endpoints = self.client.list_endpoints().await?;
        let fresh: Vec<(String, String)> = endpoints
            .into_iter()
            .filter_map(|ep| match ep.s3_endpoint {
                Some(host) if !host.is_empty() => Some((ep.region, host)),
                _ => None,
            })
            .collect();

        let count = fresh.len();
        self.extend(fresh);
        Ok(count)
    }

    /// Refresh once now, then every TTL until `shutdown` fires.
    ///
    /// Each periodic refresh is bounded by [`REFRESH_TIMEOUT`]. Refresh
    /// failures are logged and the loop continues. Always returns
    /// [`CacheError::Cancelled`].
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), CacheError> {
        tracing::info!(ttl = ?self.ttl, "starting endpoint cache");

        let mut ticker = tokio::time::interval(self.ttl);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            // The first tick completes immediately.
            tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::info!("endpoint cache stopped");
                    return Err(CacheError::Cancelled);
                }
                _ = ticker.tick() => {}
            }

            let refresh = tokio::time::timeout(REFRESH_TIMEOUT, self.refresh());
            let result = tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::info!("endpoint cache stopped during refresh");
                    return Err(CacheError::Cancelled);
                }
                result = refresh => result.unwrap_or(Err(CacheError::Timeout(REFRESH_TIMEOUT))),
            };

            match result {
                Ok(count) => tracing::debug!(count, "endpoint cache refreshed"),
                Err(e) => tracing::error!(error = %e, "failed to refresh endpoint cache"),
            }
        }
    }
}

impl EndpointResolver for EndpointCache {
    fn endpoint(&self, region: &str) -> Option<String> {
        self.get(region)
    }
}
