//! COSI response messages.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{CredentialDetails, Protocol};

/// Output for `DriverGetInfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriverGetInfoResponse {
    /// Driver name, in reverse domain notation.
    pub name: String,
}

/// Output for `DriverCreateBucket`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriverCreateBucketResponse {
    /// `<region>/<label>`.
    pub bucket_id: String,

    /// How clients reach the bucket.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_info: Option<Protocol>,
}

/// Output for `DriverDeleteBucket`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverDeleteBucketResponse {}

/// Output for `DriverGrantBucketAccess`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriverGrantBucketAccessResponse {
    /// Provider key id, in decimal.
    pub account_id: String,

    /// Credential sets keyed by protocol (`s3`).
    pub credentials: HashMap<String, CredentialDetails>,
}

/// Output for `DriverRevokeBucketAccess`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverRevokeBucketAccessResponse {}
