//! Error types for the driver's collaborators.
//!
//! Each collaborator reports its own error type. The provisioner maps them to
//! [`CosiError`](linode_cosi_model::CosiError) at the RPC boundary.

use std::time::Duration;

/// An error from the Linode API.
#[derive(Debug, thiserror::Error)]
pub enum LinodeError {
    /// The API answered with a non-success status.
    #[error("[{status}] {message}")]
    Api {
        /// HTTP status.
        status: u16,
        /// Reasons from the error envelope, `; `-joined.
        message: String,
    },

    /// The request never produced a response.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The client could not be constructed.
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl LinodeError {
    /// Shorthand for an [`LinodeError::Api`] error.
    #[must_use]
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// HTTP status of the failed call, if one was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Decode(_) | Self::Config(_) => None,
        }
    }

    /// Whether the referenced record does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// S3 error codes that mean "nothing there".
const NOT_FOUND_CODES: [&str; 3] = ["NoSuchBucket", "NoSuchBucketPolicy", "NoSuchKey"];

/// An error from an S3 endpoint.
#[derive(Debug, thiserror::Error)]
pub enum S3Error {
    /// The endpoint cache has no entry for the region.
    #[error("no S3 endpoint known for region {0}")]
    NoEndpoint(String),

    /// The S3 service rejected a call.
    #[error("{operation} failed ({}): {message}", .code.as_deref().unwrap_or("unknown"))]
    Service {
        /// S3 operation name.
        operation: &'static str,
        /// HTTP status, when the service answered.
        status: Option<u16>,
        /// S3 error code such as `NoSuchBucket`.
        code: Option<String>,
        /// Detail message.
        message: String,
    },

    /// A request could not be built locally.
    #[error("invalid {operation} request: {message}")]
    Request {
        /// S3 operation name.
        operation: &'static str,
        /// Detail message.
        message: String,
    },

    /// Several failures accumulated by a bulk operation.
    #[error("{}", join_messages(.0))]
    Multiple(Vec<S3Error>),
}

impl S3Error {
    /// Shorthand for a [`S3Error::Service`] error with a status and code.
    #[must_use]
    pub fn service(
        operation: &'static str,
        status: u16,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Service {
            operation,
            status: Some(status),
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Collapse accumulated errors: none is success, one is itself.
    pub fn join(mut errors: Vec<S3Error>) -> Result<(), S3Error> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Self::Multiple(errors)),
        }
    }

    /// HTTP status of the failed call, if known.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Service { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether the bucket, object or policy does not exist. An accumulated
    /// error is not-found only when every member is.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Service { status, code, .. } => {
                *status == Some(404)
                    || code
                        .as_deref()
                        .is_some_and(|c| NOT_FOUND_CODES.contains(&c))
            }
            Self::Multiple(errors) => {
                !errors.is_empty() && errors.iter().all(S3Error::is_not_found)
            }
            Self::NoEndpoint(_) | Self::Request { .. } => false,
        }
    }
}

fn join_messages(errors: &[S3Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// An error from the endpoint cache refresh loop.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Listing endpoints failed.
    #[error("failed to refresh endpoints: {0}")]
    Refresh(#[from] LinodeError),

    /// A refresh exceeded its time budget.
    #[error("endpoint refresh timed out after {0:?}")]
    Timeout(Duration),

    /// The loop was shut down.
    #[error("endpoint cache stopped")]
    Cancelled,
}

/// A policy template or document problem.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// The template uses something other than `{{.BucketName}}`.
    #[error("failed to parse policy template: {0}")]
    Template(String),

    /// The rendered policy is not JSON.
    #[error("policy is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The rendered policy is JSON but not a bucket policy.
    #[error("invalid bucket policy: {0}")]
    Invalid(String),
}

/// Configuration loading or validation failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required setting is absent.
    #[error("{0} is required")]
    Missing(&'static str),

    /// A setting has an unusable value.
    #[error("invalid value {value:?} for {name}: {reason}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// Offending value.
        value: String,
        /// What was expected.
        reason: String,
    },
}

/// A string outside a closed set of values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} {value:?}")]
pub struct UnknownValueError {
    /// What was being parsed.
    pub kind: &'static str,
    /// Offending value.
    pub value: String,
}

impl UnknownValueError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

/// The identity server was given no name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("driver name must not be empty")]
pub struct EmptyNameError;
