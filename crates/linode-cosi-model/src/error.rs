//! COSI status model.
//!
//! COSI is a gRPC API, so every failure is reported with a gRPC status code.
//! [`CosiCode`] keeps the numeric value of the code (used for the
//! `grpc-status` header) together with the HTTP status the JSON transport
//! answers with.

use std::fmt;

/// gRPC status codes produced by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CosiCode {
    /// The call succeeded.
    #[default]
    Ok,
    /// The caller went away before the call finished.
    Canceled,
    /// Unclassified failure.
    Unknown,
    /// A request field or parameter is missing or malformed.
    InvalidArgument,
    /// The call did not finish before its deadline.
    DeadlineExceeded,
    /// The referenced entity does not exist.
    NotFound,
    /// The entity exists with conflicting parameters.
    AlreadyExists,
    /// The method is not served by this driver.
    Unimplemented,
    /// Provider, S3 or other internal failure.
    Internal,
    /// The driver cannot serve the call right now.
    Unavailable,
}

impl CosiCode {
    /// Numeric gRPC status value.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::Canceled => 1,
            Self::Unknown => 2,
            Self::InvalidArgument => 3,
            Self::DeadlineExceeded => 4,
            Self::NotFound => 5,
            Self::AlreadyExists => 6,
            Self::Unimplemented => 12,
            Self::Internal => 13,
            Self::Unavailable => 14,
        }
    }

    /// Canonical status name, as printed by gRPC tooling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Canceled => "Canceled",
            Self::Unknown => "Unknown",
            Self::InvalidArgument => "InvalidArgument",
            Self::DeadlineExceeded => "DeadlineExceeded",
            Self::NotFound => "NotFound",
            Self::AlreadyExists => "AlreadyExists",
            Self::Unimplemented => "Unimplemented",
            Self::Internal => "Internal",
            Self::Unavailable => "Unavailable",
        }
    }

    /// Parse a status name produced by [`CosiCode::as_str`].
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "OK" => Some(Self::Ok),
            "Canceled" => Some(Self::Canceled),
            "Unknown" => Some(Self::Unknown),
            "InvalidArgument" => Some(Self::InvalidArgument),
            "DeadlineExceeded" => Some(Self::DeadlineExceeded),
            "NotFound" => Some(Self::NotFound),
            "AlreadyExists" => Some(Self::AlreadyExists),
            "Unimplemented" => Some(Self::Unimplemented),
            "Internal" => Some(Self::Internal),
            "Unavailable" => Some(Self::Unavailable),
            _ => None,
        }
    }

    /// HTTP status used by the JSON transport for this code.
    #[must_use]
    pub fn http_status(self) -> http::StatusCode {
        match self {
            Self::Ok => http::StatusCode::OK,
            Self::InvalidArgument => http::StatusCode::BAD_REQUEST,
            Self::NotFound => http::StatusCode::NOT_FOUND,
            Self::AlreadyExists => http::StatusCode::CONFLICT,
            Self::Unimplemented => http::StatusCode::NOT_IMPLEMENTED,
            Self::DeadlineExceeded => http::StatusCode::GATEWAY_TIMEOUT,
            Self::Unavailable => http::StatusCode::SERVICE_UNAVAILABLE,
            // 499 is the de-facto "client closed request" status.
            Self::Canceled => http::StatusCode::from_u16(499)
                .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR),
            Self::Unknown | Self::Internal => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for CosiCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed COSI call.
#[derive(Debug)]
pub struct CosiError {
    /// Status code.
    pub code: CosiCode,
    /// Concise, user-visible message.
    pub message: String,
    /// The underlying error, if any. Never sent to the caller.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for CosiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CosiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl CosiError {
    /// Create a new `CosiError` with a message.
    #[must_use]
    pub fn new(code: CosiCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying error.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // -- Convenience constructors --

    /// Missing or malformed request data.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(CosiCode::InvalidArgument, message)
    }

    /// Conflicting state on the provider.
    #[must_use]
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(CosiCode::AlreadyExists, message)
    }

    /// Any other failure.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(CosiCode::Internal, message)
    }

    /// The call exceeded its deadline.
    #[must_use]
    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(CosiCode::DeadlineExceeded, message)
    }

    /// Unknown method.
    #[must_use]
    pub fn unimplemented(method: &str) -> Self {
        Self::new(
            CosiCode::Unimplemented,
            format!("unknown method {method}"),
        )
    }
}
