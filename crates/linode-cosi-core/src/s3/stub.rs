//! In-memory [`S3PolicyClient`] for tests.
//!
//! All clients handed out by one [`StubS3ClientFactory`] share a policy store,
//! so a policy written with an ephemeral key can be read back with any other.
//! Linked to a [`BucketTracker`], the stub knows which buckets exist on the
//! provider side and empties them on prune.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::policy::validate_policy;
use super::{S3ClientFactory, S3PolicyClient};
use crate::error::S3Error;

/// Provider-side view of buckets, used to validate S3 calls.
pub trait BucketTracker: Send + Sync + 'static {
    /// Whether the bucket exists.
    fn bucket_exists(&self, region: &str, label: &str) -> bool;

    /// Drop every object of the bucket.
    fn clear_objects(&self, region: &str, label: &str);
}

/// Operations of the stub, for call counting and forced failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StubS3Operation {
    /// `set_bucket_policy`
    SetBucketPolicy,
    /// `get_bucket_policy`
    GetBucketPolicy,
    /// `prune`
    Prune,
}

impl StubS3Operation {
    fn name(self) -> &'static str {
        match self {
            Self::SetBucketPolicy => "PutBucketPolicy",
            Self::GetBucketPolicy => "GetBucketPolicy",
            Self::Prune => "DeleteObjects",
        }
    }
}

#[derive(Default)]
struct Shared {
    tracker: Option<Arc<dyn BucketTracker>>,
    policies: Mutex<HashMap<String, String>>,
    failures: Mutex<HashMap<StubS3Operation, (u16, String)>>,
    calls: Mutex<HashMap<StubS3Operation, usize>>,
    issued: Mutex<Vec<String>>,
}

impl Shared {
    fn enter(&self, op: StubS3Operation) -> Result<(), S3Error> {
        *self.calls.lock().entry(op).or_default() += 1;
        match self.failures.lock().get(&op) {
            Some((status, code)) => Err(S3Error::service(
                op.name(),
                *status,
                code.clone(),
                "forced failure",
            )),
            None => Ok(()),
        }
    }

    fn known(&self, region: &str, bucket: &str) -> bool {
        let id = format!("{region}/{bucket}");
        if self
            .tracker
            .as_ref()
            .is_some_and(|t| t.bucket_exists(region, bucket))
        {
            self.policies.lock().entry(id.clone()).or_default();
        }
        self.policies.lock().contains_key(&id)
    }
}

/// Factory whose clients share one in-memory policy store.
#[derive(Clone, Default)]
pub struct StubS3ClientFactory {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for StubS3ClientFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StubS3ClientFactory")
            .field("policies", &*self.shared.policies.lock())
            .finish_non_exhaustive()
    }
}

impl StubS3ClientFactory {
    /// Stub that only knows buckets given to [`StubS3ClientFactory::with_bucket`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stub that also treats every bucket known to `tracker` as existing.
    #[must_use]
    pub fn with_tracker(tracker: Arc<dyn BucketTracker>) -> Self {
        Self {
            shared: Arc::new(Shared {
                tracker: Some(tracker),
                ..Shared::default()
            }),
        }
    }

    /// Seed a bucket with no policy.
    #[must_use]
    pub fn with_bucket(self, region: &str, bucket: &str) -> Self {
        self.shared
            .policies
            .lock()
            .insert(format!("{region}/{bucket}"), String::new());
        self
    }

    /// Make every later call of `op` fail with `status` and S3 error `code`.
    pub fn fail(&self, op: StubS3Operation, status: u16, code: &str) {
        self.shared
            .failures
            .lock()
            .insert(op, (status, code.to_owned()));
    }

    /// Remove every forced failure.
    pub fn clear_failures(&self) {
        self.shared.failures.lock().clear();
    }

    /// How many times `op` was called, across all clients.
    #[must_use]
    pub fn calls(&self, op: StubS3Operation) -> usize {
        self.shared.calls.lock().get(&op).copied().unwrap_or(0)
    }

    /// Stored policy of a bucket.
    #[must_use]
    pub fn policy(&self, region: &str, bucket: &str) -> Option<String> {
        self.shared
            .policies
            .lock()
            .get(&format!("{region}/{bucket}"))
            .cloned()
    }

    /// Access keys clients were built with, in order.
    #[must_use]
    pub fn issued_access_keys(&self) -> Vec<String> {
        self.shared.issued.lock().clone()
    }
}

impl S3ClientFactory for StubS3ClientFactory {
    fn client(&self, access_key: &str, _secret_key: &str) -> Arc<dyn S3PolicyClient> {
        self.shared.issued.lock().push(access_key.to_owned());
        Arc::new(StubS3Client {
            shared: Arc::clone(&self.shared),
        })
    }
}

/// Client handed out by [`StubS3ClientFactory`].
struct StubS3Client {
    shared: Arc<Shared>,
}

fn no_such_bucket(operation: &'static str, bucket: &str) -> S3Error {
    S3Error::service(operation, 404, "NoSuchBucket", bucket)
}

#[async_trait]
impl S3PolicyClient for StubS3Client {
    async fn set_bucket_policy(
        &self,
        region: &str,
        bucket: &str,
        policy: &str,
    ) -> Result<(), S3Error> {
        self.shared.enter(StubS3Operation::SetBucketPolicy)?;
        if !self.shared.known(region, bucket) {
            return Err(no_such_bucket("PutBucketPolicy", bucket));
        }
        if let Err(e) = validate_policy(policy) {
            return Err(S3Error::service(
                "PutBucketPolicy",
                400,
                "MalformedPolicy",
                e.to_string(),
            ));
        }
        self.shared
            .policies
            .lock()
            .insert(format!("{region}/{bucket}"), policy.to_owned());
        Ok(())
    }

    async fn get_bucket_policy(&self, region: &str, bucket: &str) -> Result<String, S3Error> {
        self.shared.enter(StubS3Operation::GetBucketPolicy)?;
        if !self.shared.known(region, bucket) {
            return Err(no_such_bucket("GetBucketPolicy", bucket));
        }
        Ok(self
            .shared
            .policies
            .lock()
            .get(&format!("{region}/{bucket}"))
            .cloned()
            .unwrap_or_default())
    }

    async fn prune(&self, region: &str, bucket: &str) -> Result<(), S3Error> {
        self.shared.enter(StubS3Operation::Prune)?;
        if !self.shared.known(region, bucket) {
            return Err(no_such_bucket("ListObjectsV2", bucket));
        }
        if let Some(tracker) = &self.shared.tracker {
            tracker.clear_objects(region, bucket);
        }
        Ok(())
    }
}
