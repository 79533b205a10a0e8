//! COSI identity service.

use linode_cosi_model::input::DriverGetInfoRequest;
use linode_cosi_model::output::DriverGetInfoResponse;

use crate::error::EmptyNameError;

/// Name the driver registers under.
pub const DRIVER_NAME: &str = "objectstorage.cosi.linode.com";

/// Answers `DriverGetInfo`.
#[derive(Debug, Clone)]
pub struct IdentityServer {
    name: String,
}

impl IdentityServer {
    /// Create an identity server. The name must not be empty.
    pub fn new(name: impl Into<String>) -> Result<Self, EmptyNameError> {
        let name = name.into();
        if name.is_empty() {
            return Err(EmptyNameError);
        }
        Ok(Self { name })
    }

    /// Driver name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle `DriverGetInfo`.
    #[must_use]
    pub fn handle_get_info(&self, _input: DriverGetInfoRequest) -> DriverGetInfoResponse {
        DriverGetInfoResponse {
            name: self.name.clone(),
        }
    }
}

impl Default for IdentityServer {
    fn default() -> Self {
        Self {
            name: DRIVER_NAME.to_owned(),
        }
    }
}
