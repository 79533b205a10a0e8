//! S3 policy client.
//!
//! An [`S3ClientFactory`] binds a key pair to an [`S3PolicyClient`]. The
//! production factory talks to the regional Linode S3 endpoints found in the
//! endpoint cache; the stub keeps policies in memory.

pub mod client;
pub mod policy;
pub mod stub;

use std::sync::Arc;

use async_trait::async_trait;

pub use self::client::{LinodeS3Client, LinodeS3ClientFactory};
pub use self::policy::{render_policy_template, validate_policy};
pub use self::stub::{BucketTracker, StubS3ClientFactory, StubS3Operation};
pub use crate::error::S3Error;

/// Bucket policy and object cleanup operations.
#[async_trait]
pub trait S3PolicyClient: Send + Sync + 'static {
    /// Replace the bucket policy.
    async fn set_bucket_policy(
        &self,
        region: &str,
        bucket: &str,
        policy: &str,
    ) -> Result<(), S3Error>;

    /// Read the bucket policy.
    async fn get_bucket_policy(&self, region: &str, bucket: &str) -> Result<String, S3Error>;

    /// Delete every object in the bucket. Per-object failures are collected
    /// and reported together after every object has been attempted.
    async fn prune(&self, region: &str, bucket: &str) -> Result<(), S3Error>;
}

/// Builds S3 clients bound to a key pair.
pub trait S3ClientFactory: Send + Sync + 'static {
    /// Client authenticating with the given key pair.
    fn client(&self, access_key: &str, secret_key: &str) -> Arc<dyn S3PolicyClient>;
}
