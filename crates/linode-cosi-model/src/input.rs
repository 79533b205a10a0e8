//! COSI request messages.
//!
//! Field names follow the proto3 JSON mapping. Every field defaults when
//! absent, so a request carrying only the fields it needs still parses.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::AuthenticationType;

/// Input for `DriverGetInfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverGetInfoRequest {}

/// Input for `DriverCreateBucket`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriverCreateBucketRequest {
    /// Bucket label at the provider.
    pub name: String,

    /// Bucket class parameters.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub parameters: HashMap<String, String>,
}

/// Input for `DriverDeleteBucket`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriverDeleteBucketRequest {
    /// Identifier returned by `DriverCreateBucket`.
    pub bucket_id: String,

    /// Deletion hints from the bucket claim.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub delete_context: HashMap<String, String>,
}

/// Input for `DriverGrantBucketAccess`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriverGrantBucketAccessRequest {
    /// Identifier returned by `DriverCreateBucket`.
    pub bucket_id: String,

    /// Label of the key to create.
    pub name: String,

    /// Requested credential kind.
    pub authentication_type: AuthenticationType,

    /// Bucket access class parameters.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub parameters: HashMap<String, String>,
}

/// Input for `DriverRevokeBucketAccess`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriverRevokeBucketAccessRequest {
    /// Identifier returned by `DriverCreateBucket`.
    pub bucket_id: String,

    /// Identifier returned by `DriverGrantBucketAccess`.
    pub account_id: String,
}
