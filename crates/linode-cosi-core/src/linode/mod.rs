//! Linode Object Storage API surface.
//!
//! [`LinodeClient`] is the capability set the provisioner needs from the
//! provider. [`LinodeApiClient`] talks to API v4 over HTTPS;
//! [`StubLinodeClient`] keeps everything in memory for tests.
//!
//! Failures carry the HTTP status of the provider response. The only
//! classification callers rely on is [`LinodeError::is_not_found`].

pub mod http;
pub mod stub;
pub mod types;

use async_trait::async_trait;

pub use self::http::{LinodeApiClient, LinodeApiConfig};
pub use self::stub::{StubLinodeClient, StubOperation};
pub use self::types::{
    Acl, Bucket, BucketAccess, CreateBucketOptions, CreateKeyOptions, Endpoint, Key,
    KeyBucketAccess, Permissions, UpdateBucketAccessOptions,
};
pub use crate::error::LinodeError;

/// Object Storage operations of the Linode API.
///
/// `create_bucket` on an existing `(region, label)` returns the existing
/// bucket. `delete_bucket` fails with status 400 while the bucket holds
/// objects and with 404 once it is gone.
#[async_trait]
pub trait LinodeClient: Send + Sync + 'static {
    /// Create a bucket.
    async fn create_bucket(&self, opts: CreateBucketOptions) -> Result<Bucket, LinodeError>;

    /// Fetch a bucket.
    async fn get_bucket(&self, region: &str, label: &str) -> Result<Bucket, LinodeError>;

    /// Delete an empty bucket.
    async fn delete_bucket(&self, region: &str, label: &str) -> Result<(), LinodeError>;

    /// Fetch the ACL and CORS settings of a bucket.
    async fn get_bucket_access(&self, region: &str, label: &str)
    -> Result<BucketAccess, LinodeError>;

    /// Change the ACL and/or CORS settings of a bucket.
    async fn update_bucket_access(
        &self,
        region: &str,
        label: &str,
        opts: UpdateBucketAccessOptions,
    ) -> Result<(), LinodeError>;

    /// Create an access key.
    async fn create_key(&self, opts: CreateKeyOptions) -> Result<Key, LinodeError>;

    /// Fetch an access key. The secret is not returned.
    async fn get_key(&self, id: u64) -> Result<Key, LinodeError>;

    /// List every access key of the account.
    async fn list_keys(&self) -> Result<Vec<Key>, LinodeError>;

    /// Revoke an access key.
    async fn delete_key(&self, id: u64) -> Result<(), LinodeError>;

    /// List the S3 endpoints of every region.
    async fn list_endpoints(&self) -> Result<Vec<Endpoint>, LinodeError>;
}
