//! In-memory [`LinodeClient`] for tests.
//!
//! Mirrors the API's observable behavior: 404 for missing records, 400 when
//! deleting a bucket that still holds objects, idempotent bucket creation.
//! Every operation is counted, and any operation can be forced to fail.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::LinodeClient;
use super::types::{
    Acl, Bucket, BucketAccess, CreateBucketOptions, CreateKeyOptions, Endpoint, Key,
    UpdateBucketAccessOptions,
};
use crate::error::LinodeError;
use crate::s3::stub::BucketTracker;

/// Access key id handed out by the stub.
pub const TEST_ACCESS_KEY: &str = "TEST_ACCESS_KEY";

/// Secret key handed out by the stub.
pub const TEST_SECRET_KEY: &str = "TEST_SECRET_KEY";

/// Operations of [`StubLinodeClient`], for call counting and forced failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StubOperation {
    /// `create_bucket`
    CreateBucket,
    /// `get_bucket`
    GetBucket,
    /// `delete_bucket`
    DeleteBucket,
    /// `get_bucket_access`
    GetBucketAccess,
    /// `update_bucket_access`
    UpdateBucketAccess,
    /// `create_key`
    CreateKey,
    /// `get_key`
    GetKey,
    /// `list_keys`
    ListKeys,
    /// `delete_key`
    DeleteKey,
    /// `list_endpoints`
    ListEndpoints,
}

#[derive(Debug, Clone)]
struct StubBucket {
    bucket: Bucket,
    access: BucketAccess,
}

#[derive(Debug, Default)]
struct StubState {
    buckets: BTreeMap<(String, String), StubBucket>,
    keys: BTreeMap<u64, Key>,
    endpoints: Vec<Endpoint>,
    last_key_id: u64,
}

/// In-memory Linode Object Storage.
#[derive(Debug, Default)]
pub struct StubLinodeClient {
    state: Mutex<StubState>,
    failures: Mutex<HashMap<StubOperation, (u16, String)>>,
    calls: Mutex<HashMap<StubOperation, usize>>,
}

fn bucket_key(region: &str, label: &str) -> (String, String) {
    (region.to_owned(), label.to_owned())
}

fn not_found() -> LinodeError {
    LinodeError::api(404, "Not found")
}

impl StubLinodeClient {
    /// Create an empty stub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -- Seeding --

    /// Seed an empty bucket.
    #[must_use]
    pub fn with_bucket(self, region: &str, label: &str, acl: Acl, cors_enabled: bool) -> Self {
        self.state.lock().buckets.insert(
            bucket_key(region, label),
            StubBucket {
                bucket: Bucket {
                    region: region.to_owned(),
                    label: label.to_owned(),
                    hostname: format!("{label}.{region}.linodeobjects.com"),
                    ..Bucket::default()
                },
                access: BucketAccess { acl, cors_enabled },
            },
        );
        self
    }

    /// Seed a key. Key ids handed out later start above the largest seeded id.
    #[must_use]
    pub fn with_key(self, key: Key) -> Self {
        {
            let mut state = self.state.lock();
            state.last_key_id = state.last_key_id.max(key.id);
            state.keys.insert(key.id, key);
        }
        self
    }

    /// Seed a region endpoint.
    #[must_use]
    pub fn with_endpoint(self, region: &str, s3_endpoint: &str) -> Self {
        self.state.lock().endpoints.push(Endpoint {
            region: region.to_owned(),
            endpoint_type: Some("E1".to_owned()),
            s3_endpoint: Some(s3_endpoint.to_owned()),
        });
        self
    }

    // -- Runtime control --

    /// Replace the endpoint listing.
    pub fn set_endpoints(&self, endpoints: Vec<Endpoint>) {
        self.state.lock().endpoints = endpoints;
    }

    /// Set the object count of a bucket. Returns `false` if it does not exist.
    pub fn set_objects(&self, region: &str, label: &str, objects: u64) -> bool {
        let mut state = self.state.lock();
        match state.buckets.get_mut(&bucket_key(region, label)) {
            Some(b) => {
                b.bucket.objects = objects;
                b.bucket.size = objects * 1024;
                true
            }
            None => false,
        }
    }

    /// Make every later call of `op` fail with `status`.
    pub fn fail(&self, op: StubOperation, status: u16, message: &str) {
        self.failures.lock().insert(op, (status, message.to_owned()));
    }

    /// Remove every forced failure.
    pub fn clear_failures(&self) {
        self.failures.lock().clear();
    }

    /// How many times `op` was called.
    #[must_use]
    pub fn calls(&self, op: StubOperation) -> usize {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    /// How many calls were made in total.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    /// Snapshot of a bucket.
    #[must_use]
    pub fn bucket(&self, region: &str, label: &str) -> Option<(Bucket, BucketAccess)> {
        self.state
            .lock()
            .buckets
            .get(&bucket_key(region, label))
            .map(|b| (b.bucket.clone(), b.access))
    }

    /// Number of buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.state.lock().buckets.len()
    }

    /// Snapshot of every key, ordered by id.
    #[must_use]
    pub fn keys(&self) -> Vec<Key> {
        self.state.lock().keys.values().cloned().collect()
    }

    /// Count the call and apply any forced failure.
    fn enter(&self, op: StubOperation) -> Result<(), LinodeError> {
        *self.calls.lock().entry(op).or_default() += 1;
        match self.failures.lock().get(&op) {
            Some((status, message)) => Err(LinodeError::api(*status, message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LinodeClient for StubLinodeClient {
    async fn create_bucket(&self, opts: CreateBucketOptions) -> Result<Bucket, LinodeError> {
        self.enter(StubOperation::CreateBucket)?;
        if opts.region.is_empty() || opts.label.is_empty() {
            return Err(LinodeError::api(400, "region and label are required"));
        }

        let mut state = self.state.lock();
        let entry = state
            .buckets
            .entry(bucket_key(&opts.region, &opts.label))
            .or_insert_with(|| StubBucket {
                bucket: Bucket {
                    hostname: format!("{}.{}.linodeobjects.com", opts.label, opts.region),
                    region: opts.region.clone(),
                    label: opts.label.clone(),
                    ..Bucket::default()
                },
                access: BucketAccess {
                    acl: opts.acl.unwrap_or_default(),
                    cors_enabled: opts.cors_enabled.unwrap_or(false),
                },
            });
        Ok(entry.bucket.clone())
    }

    async fn get_bucket(&self, region: &str, label: &str) -> Result<Bucket, LinodeError> {
        self.enter(StubOperation::GetBucket)?;
        self.state
            .lock()
            .buckets
            .get(&bucket_key(region, label))
            .map(|b| b.bucket.clone())
            .ok_or_else(not_found)
    }

    async fn delete_bucket(&self, region: &str, label: &str) -> Result<(), LinodeError> {
        self.enter(StubOperation::DeleteBucket)?;
        let mut state = self.state.lock();
        let key = bucket_key(region, label);
        match state.buckets.get(&key) {
            None => Err(not_found()),
            Some(b) if b.bucket.objects > 0 || b.bucket.size > 0 => {
                Err(LinodeError::api(400, "Bucket not empty"))
            }
            Some(_) => {
                state.buckets.remove(&key);
                Ok(())
            }
        }
    }

    async fn get_bucket_access(
        &self,
        region: &str,
        label: &str,
    ) -> Result<BucketAccess, LinodeError> {
        self.enter(StubOperation::GetBucketAccess)?;
        self.state
            .lock()
            .buckets
            .get(&bucket_key(region, label))
            .map(|b| b.access)
            .ok_or_else(not_found)
    }

    async fn update_bucket_access(
        &self,
        region: &str,
        label: &str,
        opts: UpdateBucketAccessOptions,
    ) -> Result<(), LinodeError> {
        self.enter(StubOperation::UpdateBucketAccess)?;
        let mut state = self.state.lock();
        let bucket = state
            .buckets
            .get_mut(&bucket_key(region, label))
            .ok_or_else(not_found)?;
        if let Some(acl) = opts.acl {
            bucket.access.acl = acl;
        }
        if let Some(cors) = opts.cors_enabled {
            bucket.access.cors_enabled = cors;
        }
        Ok(())
    }

    async fn create_key(&self, opts: CreateKeyOptions) -> Result<Key, LinodeError> {
        self.enter(StubOperation::CreateKey)?;
        let mut state = self.state.lock();

        let limited = opts.is_limited();
        let bucket_access = opts.bucket_access.unwrap_or_default();
        if let Some(missing) = bucket_access
            .iter()
            .find(|a| !state.buckets.contains_key(&bucket_key(&a.region, &a.bucket_name)))
        {
            return Err(LinodeError::api(
                400,
                format!("bucket {}/{} not found", missing.region, missing.bucket_name),
            ));
        }

        state.last_key_id += 1;
        let key = Key {
            id: state.last_key_id,
            label: opts.label,
            access_key: TEST_ACCESS_KEY.to_owned(),
            secret_key: TEST_SECRET_KEY.to_owned(),
            limited,
            bucket_access,
        };
        state.keys.insert(key.id, key.clone());
        Ok(key)
    }

    async fn get_key(&self, id: u64) -> Result<Key, LinodeError> {
        self.enter(StubOperation::GetKey)?;
        self.state
            .lock()
            .keys
            .get(&id)
            .map(|k| Key {
                secret_key: "[REDACTED]".to_owned(),
                ..k.clone()
            })
            .ok_or_else(not_found)
    }

    async fn list_keys(&self) -> Result<Vec<Key>, LinodeError> {
        self.enter(StubOperation::ListKeys)?;
        Ok(self
            .state
            .lock()
            .keys
            .values()
            .map(|k| Key {
                secret_key: "[REDACTED]".to_owned(),
                ..k.clone()
            })
            .collect())
    }

    async fn delete_key(&self, id: u64) -> Result<(), LinodeError> {
        self.enter(StubOperation::DeleteKey)?;
        self.state
            .lock()
            .keys
            .remove(&id)
            .map(drop)
            .ok_or_else(not_found)
    }

    async fn list_endpoints(&self) -> Result<Vec<Endpoint>, LinodeError> {
        self.enter(StubOperation::ListEndpoints)?;
        Ok(self.state.lock().endpoints.clone())
    }
}

impl BucketTracker for StubLinodeClient {
    fn bucket_exists(&self, region: &str, label: &str) -> bool {
        self.state
            .lock()
            .buckets
            .contains_key(&bucket_key(region, label))
    }

    fn clear_objects(&self, region: &str, label: &str) {
        self.set_objects(region, label, 0);
    }
}
