//! COSI response serialization and error formatting.

use linode_cosi_model::error::{CosiCode, CosiError};

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::body::CosiResponseBody;

/// Content type for COSI JSON responses.
pub const CONTENT_TYPE: &str = "application/json";

/// Header carrying the numeric gRPC status.
pub const GRPC_STATUS: &str = "grpc-status";

/// Header carrying the percent-encoded status message.
pub const GRPC_MESSAGE: &str = "grpc-message";

/// Header carrying the per-call request id.
pub const REQUEST_ID: &str = "x-request-id";

/// Serialize a COSI error into a JSON response body.
///
/// ```json
/// {"code": "AlreadyExists", "message": "bucket exists with different parameters"}
/// ```
#[must_use]
pub fn error_to_json(error: &CosiError) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "code": error.code.as_str(),
        "message": error.message,
    }))
    .expect("JSON serialization of error cannot fail")
}

/// Convert a `CosiError` into a complete HTTP error response.
#[must_use]
pub fn error_to_response(error: &CosiError, request_id: &str) -> http::Response<CosiResponseBody> {
    let body = CosiResponseBody::from_json(error_to_json(error));

    let mut response = http::Response::builder()
        .status(error.code.http_status())
        .header("content-type", CONTENT_TYPE)
        .header(GRPC_STATUS, error.code.as_i32())
        .body(body)
        .expect("valid error response");

    if let Ok(hv) = http::HeaderValue::from_str(&encode_grpc_message(&error.message)) {
        response.headers_mut().insert(GRPC_MESSAGE, hv);
    }
    if let Ok(hv) = http::HeaderValue::from_str(request_id) {
        response.headers_mut().insert(REQUEST_ID, hv);
    }

    response
}

/// Build a success response from JSON bytes.
#[must_use]
pub fn json_response(json: Vec<u8>, request_id: &str) -> http::Response<CosiResponseBody> {
    let mut response = http::Response::builder()
        .status(http::StatusCode::OK)
        .header("content-type", CONTENT_TYPE)
        .header(GRPC_STATUS, CosiCode::Ok.as_i32())
        .body(CosiResponseBody::from_json(json))
        .expect("valid JSON response");

    if let Ok(hv) = http::HeaderValue::from_str(request_id) {
        response.headers_mut().insert(REQUEST_ID, hv);
    }

    response
}

/// Bytes escaped in `grpc-message`: controls, non-ASCII and `%` itself.
const GRPC_MESSAGE_ESCAPES: &AsciiSet = &CONTROLS.add(b'%');

/// Percent-encode a status message the way gRPC encodes `grpc-message`.
#[must_use]
pub fn encode_grpc_message(message: &str) -> String {
    utf8_percent_encode(message, GRPC_MESSAGE_ESCAPES).to_string()
}
