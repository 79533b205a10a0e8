//! COSI operation enum.

use std::fmt;

/// All COSI methods served by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CosiOperation {
    // Identity
    /// Report the driver name.
    DriverGetInfo,

    // Provisioner
    /// Create (or adopt) a bucket.
    DriverCreateBucket,
    /// Delete a bucket.
    DriverDeleteBucket,
    /// Mint credentials for a bucket.
    DriverGrantBucketAccess,
    /// Delete previously minted credentials.
    DriverRevokeBucketAccess,
}

impl CosiOperation {
    /// Every operation, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::DriverGetInfo,
        Self::DriverCreateBucket,
        Self::DriverDeleteBucket,
        Self::DriverGrantBucketAccess,
        Self::DriverRevokeBucketAccess,
    ];

    /// Returns the method name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DriverGetInfo => "DriverGetInfo",
            Self::DriverCreateBucket => "DriverCreateBucket",
            Self::DriverDeleteBucket => "DriverDeleteBucket",
            Self::DriverGrantBucketAccess => "DriverGrantBucketAccess",
            Self::DriverRevokeBucketAccess => "DriverRevokeBucketAccess",
        }
    }

    /// Fully-qualified gRPC service the method belongs to.
    #[must_use]
    pub fn service(&self) -> &'static str {
        match self {
            Self::DriverGetInfo => "cosi.v1alpha1.Identity",
            _ => "cosi.v1alpha1.Provisioner",
        }
    }

    /// Request path, `/<service>/<method>`.
    #[must_use]
    pub fn path(&self) -> String {
        format!("/{}/{}", self.service(), self.as_str())
    }

    /// Parse a method name string into a `CosiOperation`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "DriverGetInfo" => Some(Self::DriverGetInfo),
            "DriverCreateBucket" => Some(Self::DriverCreateBucket),
            "DriverDeleteBucket" => Some(Self::DriverDeleteBucket),
            "DriverGrantBucketAccess" => Some(Self::DriverGrantBucketAccess),
            "DriverRevokeBucketAccess" => Some(Self::DriverRevokeBucketAccess),
            _ => None,
        }
    }

    /// Resolve a request path. The service prefix must match the method.
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        let (service, method) = path.strip_prefix('/')?.split_once('/')?;
        let op = Self::from_name(method)?;
        (op.service() == service).then_some(op)
    }
}

impl fmt::Display for CosiOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
