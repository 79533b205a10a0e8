//! Request parameters and bucket identifiers.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use linode_cosi_model::CosiError;

use crate::error::UnknownValueError;
use crate::linode::{Acl, Permissions};
use crate::s3::{render_policy_template, validate_policy};

/// Bucket region. Required on create.
pub const PARAM_REGION: &str = "cosi.linode.com/v1/region";
/// Bucket ACL.
pub const PARAM_ACL: &str = "cosi.linode.com/v1/acl";
/// Bucket CORS switch.
pub const PARAM_CORS: &str = "cosi.linode.com/v1/cors";
/// Bucket policy template.
pub const PARAM_POLICY: &str = "cosi.linode.com/v1/policy";
/// Key permissions on grant.
pub const PARAM_PERMISSIONS: &str = "cosi.linode.com/v1/permissions";
/// Delete-time cleanup mode.
pub const PARAM_CLEANUP: &str = "cosi.linode.com/v1/cleanup";

/// Value of [`PARAM_CLEANUP`] that prunes the bucket before deletion.
pub const CLEANUP_FORCE: &str = "force";

/// Credentials map key.
pub const CREDENTIALS_S3: &str = "s3";
/// Secret: bucket region.
pub const SECRET_REGION: &str = "region";
/// Secret: bucket hostname.
pub const SECRET_ENDPOINT: &str = "endpoint";
/// Secret: access key id.
pub const SECRET_ACCESS_KEY_ID: &str = "accessKeyID";
/// Secret: secret access key.
pub const SECRET_ACCESS_SECRET_KEY: &str = "accessSecretKey";

/// CORS switch of a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorsSetting {
    /// CORS on.
    Enabled,
    /// CORS off.
    #[default]
    Disabled,
}

impl CorsSetting {
    /// Whether CORS is on.
    #[must_use]
    pub fn is_enabled(self) -> bool {
        self == Self::Enabled
    }
}

impl FromStr for CorsSetting {
    type Err = UnknownValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enabled" => Ok(Self::Enabled),
            "disabled" => Ok(Self::Disabled),
            other => Err(UnknownValueError::new("cors", other)),
        }
    }
}

/// `<region>/<label>`, the external id of a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketId {
    /// Region id.
    pub region: String,
    /// Bucket label.
    pub label: String,
}

impl BucketId {
    /// Build an id from its parts.
    #[must_use]
    pub fn new(region: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            label: label.into(),
        }
    }
}

impl fmt::Display for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region, self.label)
    }
}

impl FromStr for BucketId {
    type Err = CosiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((region, label))
                if !region.is_empty() && !label.is_empty() && !label.contains('/') =>
            {
                Ok(Self::new(region, label))
            }
            _ => Err(CosiError::invalid_argument(format!(
                "bucket id {s:?} is not <region>/<label>"
            ))),
        }
    }
}

/// Validated `DriverCreateBucket` parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateBucketParams {
    /// Target region.
    pub region: String,
    /// Requested ACL.
    pub acl: Acl,
    /// Requested CORS switch.
    pub cors: CorsSetting,
    /// Rendered and validated policy, if one was requested.
    pub policy: Option<String>,
}

impl CreateBucketParams {
    /// Parse and validate the parameters of a bucket named `label`.
    pub fn parse(label: &str, params: &HashMap<String, String>) -> Result<Self, CosiError> {
        let region = param(params, PARAM_REGION)
            .ok_or_else(|| CosiError::invalid_argument("region was not provided"))?
            .to_owned();

        let acl = param(params, PARAM_ACL)
            .map(str::parse::<Acl>)
            .transpose()
            .map_err(|e| CosiError::invalid_argument(e.to_string()))?
            .unwrap_or_default();

        let cors = param(params, PARAM_CORS)
            .map(str::parse::<CorsSetting>)
            .transpose()
            .map_err(|e| CosiError::invalid_argument(e.to_string()))?
            .unwrap_or_default();

        let policy = param(params, PARAM_POLICY)
            .map(|template| {
                let rendered = render_policy_template(template, label)?;
                validate_policy(&rendered)?;
                Ok(rendered)
            })
            .transpose()
            .map_err(|e: crate::error::PolicyError| {
                CosiError::invalid_argument(format!("invalid bucket policy: {e}"))
            })?;

        Ok(Self {
            region,
            acl,
            cors,
            policy,
        })
    }
}

/// Parse the `permissions` parameter of a grant. Defaults to read-only.
pub fn parse_permissions(params: &HashMap<String, String>) -> Result<Permissions, CosiError> {
    param(params, PARAM_PERMISSIONS)
        .map(str::parse::<Permissions>)
        .transpose()
        .map_err(|e| CosiError::invalid_argument(e.to_string()))
        .map(Option::unwrap_or_default)
}

/// Whether a delete context asks for a forced cleanup.
#[must_use]
pub fn wants_force_cleanup(context: &HashMap<String, String>) -> bool {
    param(context, PARAM_CLEANUP) == Some(CLEANUP_FORCE)
}

/// A parameter value, with empty strings treated as absent.
fn param<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}
