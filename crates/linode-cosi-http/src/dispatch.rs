//! COSI handler trait and operation dispatch.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use linode_cosi_model::error::CosiError;
use linode_cosi_model::operations::CosiOperation;

use crate::body::CosiResponseBody;

/// Future returned by [`CosiHandler::handle_operation`].
pub type HandlerFuture =
    Pin<Box<dyn Future<Output = Result<http::Response<CosiResponseBody>, CosiError>> + Send>>;

/// Trait that the driver implements to serve COSI calls.
///
/// The handler receives the resolved operation, the raw JSON request body and
/// the request id the service logs the call under, and returns a complete
/// HTTP response.
pub trait CosiHandler: Send + Sync + 'static {
    /// Handle a COSI operation and produce an HTTP response.
    fn handle_operation(
        &self,
        op: CosiOperation,
        body: Bytes,
        request_id: String,
    ) -> HandlerFuture;
}

/// Dispatch a COSI operation to the handler.
pub async fn dispatch_operation<H: CosiHandler>(
    handler: &H,
    op: CosiOperation,
    body: Bytes,
    request_id: &str,
) -> Result<http::Response<CosiResponseBody>, CosiError> {
    tracing::debug!(operation = %op, request_id, "dispatching COSI operation");
    handler
        .handle_operation(op, body, request_id.to_owned())
        .await
}

/// Handler that answers `Unimplemented` for every operation.
#[derive(Debug, Clone, Default)]
pub struct NotImplementedHandler;

impl CosiHandler for NotImplementedHandler {
    fn handle_operation(
        &self,
        op: CosiOperation,
        _body: Bytes,
        _request_id: String,
    ) -> HandlerFuture {
        Box::pin(async move { Err(CosiError::unimplemented(&op.path())) })
    }
}
