//! COSI handler implementation bridging HTTP to the identity and provisioner services.

use std::sync::Arc;

use bytes::Bytes;

use linode_cosi_http::body::CosiResponseBody;
use linode_cosi_http::dispatch::{CosiHandler, HandlerFuture};
use linode_cosi_http::response::json_response;
use linode_cosi_model::error::CosiError;
use linode_cosi_model::operations::CosiOperation;

use crate::identity::IdentityServer;
use crate::provisioner::Provisioner;

/// Handler that bridges the HTTP layer to the driver services.
#[derive(Debug)]
pub struct CosiDriverHandler {
    identity: Arc<IdentityServer>,
    provisioner: Arc<Provisioner>,
}

impl CosiDriverHandler {
    /// Create a new handler wrapping the identity and provisioner services.
    #[must_use]
    pub fn new(identity: Arc<IdentityServer>, provisioner: Arc<Provisioner>) -> Self {
        Self {
            identity,
            provisioner,
        }
    }
}

impl CosiHandler for CosiDriverHandler {
    fn handle_operation(
        &self,
        op: CosiOperation,
        body: Bytes,
        request_id: String,
    ) -> HandlerFuture {
        let identity = Arc::clone(&self.identity);
        let provisioner = Arc::clone(&self.provisioner);
        Box::pin(async move { dispatch(&identity, &provisioner, op, &body, &request_id).await })
    }
}

/// Dispatch a COSI operation to the appropriate service method.
async fn dispatch(
    identity: &IdentityServer,
    provisioner: &Provisioner,
    op: CosiOperation,
    body: &[u8],
    request_id: &str,
) -> Result<http::Response<CosiResponseBody>, CosiError> {
    match op {
        CosiOperation::DriverGetInfo => {
            let input = deserialize(body)?;
            let output = identity.handle_get_info(input);
            serialize(&output, request_id)
        }
        CosiOperation::DriverCreateBucket => {
            let input = deserialize(body)?;
            let output = provisioner.handle_create_bucket(input).await?;
            serialize(&output, request_id)
        }
        CosiOperation::DriverDeleteBucket => {
            let input = deserialize(body)?;
            let output = provisioner.handle_delete_bucket(input).await?;
            serialize(&output, request_id)
        }
        CosiOperation::DriverGrantBucketAccess => {
            let input = deserialize(body)?;
            let output = provisioner.handle_grant_bucket_access(input).await?;
            serialize(&output, request_id)
        }
        CosiOperation::DriverRevokeBucketAccess => {
            let input = deserialize(body)?;
            let output = provisioner.handle_revoke_bucket_access(input).await?;
            serialize(&output, request_id)
        }
    }
}

/// Deserialize a JSON request body into the input type. An empty body is an
/// empty message.
fn deserialize<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, CosiError> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}".as_slice()
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|e| {
        CosiError::invalid_argument(format!("failed to deserialize request body: {e}"))
    })
}

/// Serialize an output type into a JSON HTTP response.
fn serialize<T: serde::Serialize>(
    output: &T,
    request_id: &str,
) -> Result<http::Response<CosiResponseBody>, CosiError> {
    let json = serde_json::to_vec(output)
        .map_err(|e| CosiError::internal(format!("failed to serialize response: {e}")))?;
    Ok(json_response(json, request_id))
}
