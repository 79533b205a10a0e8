//! COSI request router.
//!
//! Every call is `POST /<package>.<Service>/<Method>`, the same path a gRPC
//! client would use:
//!
//! ```text
//! POST /cosi.v1alpha1.Provisioner/DriverCreateBucket
//! ```

use linode_cosi_model::error::CosiError;
use linode_cosi_model::operations::CosiOperation;

/// Resolve a COSI operation from the request method and path.
pub fn resolve_operation(method: &http::Method, path: &str) -> Result<CosiOperation, CosiError> {
    if method != http::Method::POST {
        return Err(CosiError::unimplemented(&format!("{method} {path}")));
    }
    CosiOperation::from_path(path).ok_or_else(|| CosiError::unimplemented(path))
}
