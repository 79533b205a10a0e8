//! Driver configuration.
//!
//! Provides [`DriverConfig`], loaded from environment variables by
//! [`DriverConfig::from_env`]. Loading only parses; [`DriverConfig::validate`]
//! checks that the result can actually run a driver.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::cache::DEFAULT_TTL;
use crate::error::ConfigError;
use crate::linode::http::{DEFAULT_API_URL, DEFAULT_API_VERSION, LinodeApiConfig};

/// Default listener of the COSI sidecar socket.
pub const DEFAULT_COSI_ENDPOINT: &str = "unix:///var/lib/cosi/cosi.sock";

/// Driver configuration.
///
/// # Examples
///
/// ```
/// use linode_cosi_core::config::DriverConfig;
///
/// let config = DriverConfig::builder().linode_token("secret".into()).build();
/// assert!(config.validate().is_ok());
/// assert!(config.s3_ephemeral_credentials);
/// ```
#[derive(Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct DriverConfig {
    /// Provider bearer token. Never serialized.
    #[builder(default)]
    #[serde(default, skip_serializing)]
    pub linode_token: String,

    /// Provider API base URL.
    #[builder(default = String::from(DEFAULT_API_URL))]
    pub linode_api_url: String,

    /// Provider API version.
    #[builder(default = String::from(DEFAULT_API_VERSION))]
    pub linode_api_version: String,

    /// Listener URL, `unix://<path>` or `tcp://<host>:<port>`.
    #[builder(default = String::from(DEFAULT_COSI_ENDPOINT))]
    pub cosi_endpoint: String,

    /// Endpoint cache refresh interval. Values below 30s are raised by the cache.
    #[builder(default = DEFAULT_TTL)]
    pub endpoint_cache_ttl: Duration,

    /// Reach S3 endpoints over HTTPS.
    #[builder(default = true)]
    pub s3_ssl_enabled: bool,

    /// Mint a bucket-scoped key for every S3 operation.
    #[builder(default = true)]
    pub s3_ephemeral_credentials: bool,

    /// Static S3 access key, used when ephemeral credentials are off.
    #[builder(default)]
    pub s3_access_key: Option<String>,

    /// Static S3 secret key, used when ephemeral credentials are off. Never
    /// serialized.
    #[builder(default)]
    #[serde(default, skip_serializing)]
    pub s3_secret_key: Option<String>,

    /// Allow deleting buckets that still hold objects.
    #[builder(default = false)]
    pub force_bucket_cleanup: bool,

    /// User agent sent to the provider API.
    #[builder(default = default_user_agent())]
    pub user_agent: String,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,

    /// Log output format, `text` or `json`.
    #[builder(default = String::from("text"))]
    pub log_format: String,
}

impl std::fmt::Debug for DriverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverConfig")
            .field("linode_token", &redact(Some(&self.linode_token)))
            .field("linode_api_url", &self.linode_api_url)
            .field("linode_api_version", &self.linode_api_version)
            .field("cosi_endpoint", &self.cosi_endpoint)
            .field("endpoint_cache_ttl", &self.endpoint_cache_ttl)
            .field("s3_ssl_enabled", &self.s3_ssl_enabled)
            .field("s3_ephemeral_credentials", &self.s3_ephemeral_credentials)
            .field("s3_access_key", &self.s3_access_key)
            .field("s3_secret_key", &redact(self.s3_secret_key.as_ref()))
            .field("force_bucket_cleanup", &self.force_bucket_cleanup)
            .field("user_agent", &self.user_agent)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .finish()
    }
}

fn redact(value: Option<&String>) -> &'static str {
    match value {
        Some(v) if !v.is_empty() => "[REDACTED]",
        _ => "",
    }
}

fn default_user_agent() -> String {
    format!("linode-cosi-driver/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DriverConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `LINODE_TOKEN` | empty |
    /// | `LINODE_API_URL` | `https://api.linode.com` |
    /// | `LINODE_API_VERSION` | `v4` |
    /// | `COSI_ENDPOINT` | `unix:///var/lib/cosi/cosi.sock` |
    /// | `LINODE_OBJECT_STORAGE_ENDPOINT_CACHE_TTL` | `30s` |
    /// | `S3_CLIENT_SSL_ENABLED` | `true` |
    /// | `S3_CLIENT_EPHEMERAL_CREDENTIALS` | `true` |
    /// | `S3_ACCESS_KEY` / `S3_SECRET_KEY` | unset |
    /// | `COSI_FORCE_BUCKET_CLEANUP` | `false` |
    /// | `LINODE_COSI_USER_AGENT` | `linode-cosi-driver/<version>` |
    /// | `LOG_LEVEL` | `info` |
    /// | `LOG_FORMAT` | `text` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(v) = get("LINODE_TOKEN") {
            config.linode_token = v;
        }
        if let Some(v) = get("LINODE_API_URL") {
            config.linode_api_url = v;
        }
        if let Some(v) = get("LINODE_API_VERSION") {
            config.linode_api_version = v;
        }
        if let Some(v) = get("COSI_ENDPOINT") {
            config.cosi_endpoint = v;
        }
        if let Some(v) = get("LINODE_OBJECT_STORAGE_ENDPOINT_CACHE_TTL") {
            config.endpoint_cache_ttl =
                parse_duration(&v).ok_or_else(|| ConfigError::Invalid {
                    name: "LINODE_OBJECT_STORAGE_ENDPOINT_CACHE_TTL",
                    value: v.clone(),
                    reason: "expected a duration such as 30s, 2m or 1h".to_owned(),
                })?;
        }
        if let Some(v) = get("S3_CLIENT_SSL_ENABLED") {
            config.s3_ssl_enabled = parse_bool("S3_CLIENT_SSL_ENABLED", &v)?;
        }
        if let Some(v) = get("S3_CLIENT_EPHEMERAL_CREDENTIALS") {
            config.s3_ephemeral_credentials = parse_bool("S3_CLIENT_EPHEMERAL_CREDENTIALS", &v)?;
        }
        config.s3_access_key = get("S3_ACCESS_KEY");
        config.s3_secret_key = get("S3_SECRET_KEY");
        if let Some(v) = get("COSI_FORCE_BUCKET_CLEANUP") {
            config.force_bucket_cleanup = parse_bool("COSI_FORCE_BUCKET_CLEANUP", &v)?;
        }
        if let Some(v) = get("LINODE_COSI_USER_AGENT") {
            config.user_agent = v;
        }
        if let Some(v) = get("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Some(v) = get("LOG_FORMAT") {
            config.log_format = v.to_ascii_lowercase();
        }

        Ok(config)
    }

    /// Check that the configuration can run a driver.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.linode_token.is_empty() {
            return Err(ConfigError::Missing("LINODE_TOKEN"));
        }

        let endpoint_ok = ["unix://", "tcp://"].iter().any(|scheme| {
            self.cosi_endpoint
                .strip_prefix(scheme)
                .is_some_and(|rest| !rest.is_empty())
        });
        if !endpoint_ok {
            return Err(ConfigError::Invalid {
                name: "COSI_ENDPOINT",
                value: self.cosi_endpoint.clone(),
                reason: "expected unix://<path> or tcp://<host>:<port>".to_owned(),
            });
        }

        if !self.s3_ephemeral_credentials {
            if self.s3_access_key.is_none() {
                return Err(ConfigError::Missing("S3_ACCESS_KEY"));
            }
            if self.s3_secret_key.is_none() {
                return Err(ConfigError::Missing("S3_SECRET_KEY"));
            }
        }

        if !matches!(self.log_format.as_str(), "text" | "json") {
            return Err(ConfigError::Invalid {
                name: "LOG_FORMAT",
                value: self.log_format.clone(),
                reason: "expected text or json".to_owned(),
            });
        }

        Ok(())
    }

    /// Settings of the provider API client.
    #[must_use]
    pub fn linode_api_config(&self) -> LinodeApiConfig {
        LinodeApiConfig {
            token: self.linode_token.clone(),
            api_url: self.linode_api_url.clone(),
            api_version: self.linode_api_version.clone(),
            user_agent: self.user_agent.clone(),
        }
    }

    /// Static S3 key pair, if both halves are set.
    #[must_use]
    pub fn static_s3_keys(&self) -> Option<(&str, &str)> {
        match (&self.s3_access_key, &self.s3_secret_key) {
            (Some(access), Some(secret)) => Some((access, secret)),
            _ => None,
        }
    }
}

/// Parse a boolean, accepting `1`/`true` and `0`/`false` (case-insensitive).
fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        v if v.eq_ignore_ascii_case("true") => Ok(true),
        v if v.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: value.to_owned(),
            reason: "expected true, false, 1 or 0".to_owned(),
        }),
    }
}

/// Parse `45`, `45s`, `500ms`, `2m` or `1h`. A bare number is seconds.
fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);
    let n: u64 = digits.parse().ok()?;
    match unit {
        "" | "s" => Some(Duration::from_secs(n)),
        "ms" => Some(Duration::from_millis(n)),
        "m" => Some(Duration::from_secs(n.checked_mul(60)?)),
        "h" => Some(Duration::from_secs(n.checked_mul(3600)?)),
        _ => None,
    }
}
