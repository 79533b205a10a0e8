//! Linode Object Storage records, as returned by API v4.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::UnknownValueError;

/// Canned bucket ACL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Acl {
    /// Owner only.
    #[default]
    Private,
    /// Any authenticated user may read.
    AuthenticatedRead,
    /// Anyone may read.
    PublicRead,
    /// Anyone may read and write.
    PublicReadWrite,
}

impl Acl {
    /// API string value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::AuthenticatedRead => "authenticated-read",
            Self::PublicRead => "public-read",
            Self::PublicReadWrite => "public-read-write",
        }
    }
}

impl FromStr for Acl {
    type Err = UnknownValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Self::Private),
            "authenticated-read" => Ok(Self::AuthenticatedRead),
            "public-read" => Ok(Self::PublicRead),
            "public-read-write" => Ok(Self::PublicReadWrite),
            other => Err(UnknownValueError::new("acl", other)),
        }
    }
}

impl fmt::Display for Acl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access granted to a key on one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permissions {
    /// List and get objects.
    #[default]
    ReadOnly,
    /// Full object access.
    ReadWrite,
}

impl Permissions {
    /// API string value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadOnly => "read_only",
            Self::ReadWrite => "read_write",
        }
    }
}

impl FromStr for Permissions {
    type Err = UnknownValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read_only" => Ok(Self::ReadOnly),
            "read_write" => Ok(Self::ReadWrite),
            other => Err(UnknownValueError::new("permissions", other)),
        }
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bucket {
    /// Region id, e.g. `us-east`.
    pub region: String,
    /// Bucket label.
    pub label: String,
    /// Public hostname.
    pub hostname: String,
    /// Object count.
    pub objects: u64,
    /// Total size in bytes.
    pub size: u64,
    /// Creation timestamp, as sent by the API.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
}

/// ACL and CORS settings of a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketAccess {
    /// Canned ACL.
    pub acl: Acl,
    /// Whether CORS is enabled.
    pub cors_enabled: bool,
}

/// One bucket a limited key may access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyBucketAccess {
    /// Bucket region.
    pub region: String,
    /// Bucket label.
    pub bucket_name: String,
    /// Granted access.
    pub permissions: Permissions,
}

/// An access key. The secret is only populated on creation.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Key {
    /// Provider-assigned id.
    pub id: u64,
    /// Key label.
    pub label: String,
    /// Access key id.
    pub access_key: String,
    /// Secret access key.
    pub secret_key: String,
    /// Whether the key is restricted to `bucket_access`.
    pub limited: bool,
    /// Buckets the key may access. Empty for unrestricted keys.
    #[serde(deserialize_with = "null_as_default")]
    pub bucket_access: Vec<KeyBucketAccess>,
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("limited", &self.limited)
            .field("bucket_access", &self.bucket_access)
            .finish()
    }
}

/// An S3 endpoint of a region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoint {
    /// Region id.
    pub region: String,
    /// Endpoint generation, e.g. `E1`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_type: Option<String>,
    /// Hostname; absent while the endpoint is being provisioned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_endpoint: Option<String>,
}

/// Body of `POST /object-storage/buckets`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBucketOptions {
    /// Region id.
    pub region: String,
    /// Bucket label.
    pub label: String,
    /// Canned ACL; the API defaults to `private`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acl: Option<Acl>,
    /// CORS flag; the API defaults to enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cors_enabled: Option<bool>,
}

/// Body of `POST /object-storage/buckets/{region}/{label}/access`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateBucketAccessOptions {
    /// New ACL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acl: Option<Acl>,
    /// New CORS flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cors_enabled: Option<bool>,
}

/// Body of `POST /object-storage/keys`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateKeyOptions {
    /// Key label.
    pub label: String,
    /// Bucket restriction; `None` creates an unrestricted key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_access: Option<Vec<KeyBucketAccess>>,
}

impl CreateKeyOptions {
    /// Whether a key created from these options is limited.
    #[must_use]
    pub fn is_limited(&self) -> bool {
        self.bucket_access.as_ref().is_some_and(|access| !access.is_empty())
    }
}

/// Paginated list envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Page<T> {
    /// Records on this page.
    pub data: Vec<T>,
    /// 1-based page number.
    pub page: u32,
    /// Total page count.
    pub pages: u32,
    /// Total record count.
    pub results: u32,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            page: 1,
            pages: 1,
            results: 0,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
