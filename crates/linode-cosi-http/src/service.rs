//! COSI HTTP service implementing the hyper `Service` trait.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::BodyExt;

use linode_cosi_model::error::{CosiCode, CosiError};

use crate::body::CosiResponseBody;
use crate::dispatch::{CosiHandler, dispatch_operation};
use crate::response::{CONTENT_TYPE, GRPC_STATUS, error_to_response};
use crate::router::resolve_operation;

/// Header carrying the caller's deadline, in milliseconds.
pub const TIMEOUT_HEADER: &str = "x-cosi-timeout-ms";

/// Configuration for the COSI HTTP service.
#[derive(Debug, Clone, Default)]
pub struct CosiHttpConfig {
    /// Deadline applied when the caller sends none. `None` means unbounded.
    pub default_timeout: Option<Duration>,
}

/// Hyper `Service` implementation for COSI.
///
/// Wraps a [`CosiHandler`] and routes incoming HTTP requests to it.
#[derive(Debug)]
pub struct CosiHttpService<H: CosiHandler> {
    handler: Arc<H>,
    config: Arc<CosiHttpConfig>,
}

impl<H: CosiHandler> CosiHttpService<H> {
    /// Create a new `CosiHttpService`.
    pub fn new(handler: Arc<H>, config: CosiHttpConfig) -> Self {
        Self {
            handler,
            config: Arc::new(config),
        }
    }
}

impl<H: CosiHandler> Clone for CosiHttpService<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            config: Arc::clone(&self.config),
        }
    }
}

impl<H, B> hyper::service::Service<http::Request<B>> for CosiHttpService<H>
where
    H: CosiHandler,
    B: http_body::Body + Send + 'static,
    B::Data: Send,
    B::Error: std::fmt::Display,
{
    type Response = http::Response<CosiResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<B>) -> Self::Future {
        let handler = Arc::clone(&self.handler);
        let config = Arc::clone(&self.config);
        let request_id = uuid::Uuid::new_v4().to_string();

        Box::pin(async move {
            let response = process_request(req, handler.as_ref(), &config, &request_id).await;
            Ok(add_common_headers(response))
        })
    }
}

/// Process a single COSI HTTP request through the full pipeline.
async fn process_request<H, B>(
    req: http::Request<B>,
    handler: &H,
    config: &CosiHttpConfig,
    request_id: &str,
) -> http::Response<CosiResponseBody>
where
    H: CosiHandler,
    B: http_body::Body + Send,
    B::Data: Send,
    B::Error: std::fmt::Display,
{
    let (parts, incoming) = req.into_parts();
    let started = Instant::now();

    // 1. Route: method and path select the operation.
    let op = match resolve_operation(&parts.method, parts.uri.path()) {
        Ok(op) => op,
        Err(err) => {
            tracing::warn!(path = %parts.uri.path(), method = %parts.method, "unknown COSI method");
            return error_to_response(&err, request_id);
        }
    };

    // 2. Deadline: caller header wins over the configured default.
    let deadline = match request_timeout(&parts.headers) {
        Ok(timeout) => timeout.or(config.default_timeout),
        Err(err) => return error_to_response(&err, request_id),
    };

    // 3. Collect body.
    let body = match collect_body(incoming).await {
        Ok(body) => body,
        Err(err) => return error_to_response(&err, request_id),
    };

    // 4. Dispatch to handler, bounded by the deadline.
    let result = match deadline {
        Some(limit) => {
            tokio::time::timeout(limit, dispatch_operation(handler, op, body, request_id))
                .await
                .unwrap_or_else(|_| {
                    Err(CosiError::deadline_exceeded(format!(
                        "{op} did not finish within {}ms",
                        limit.as_millis()
                    )))
                })
        }
        None => dispatch_operation(handler, op, body, request_id).await,
    };

    let (response, code) = match result {
        Ok(response) => (response, CosiCode::Ok),
        Err(err) => (error_to_response(&err, request_id), err.code),
    };

    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    if code == CosiCode::Ok {
        tracing::info!(operation = %op, %code, elapsed_ms, request_id, "COSI call finished");
    } else {
        tracing::warn!(operation = %op, %code, elapsed_ms, request_id, "COSI call failed");
    }

    response
}

/// Parse the optional deadline header.
fn request_timeout(headers: &http::HeaderMap) -> Result<Option<Duration>, CosiError> {
    let Some(value) = headers.get(TIMEOUT_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|ms| Some(Duration::from_millis(ms)))
        .ok_or_else(|| CosiError::invalid_argument(format!("invalid {TIMEOUT_HEADER} header")))
}

/// Collect the incoming body into a single `Bytes` buffer.
async fn collect_body<B>(incoming: B) -> Result<Bytes, CosiError>
where
    B: http_body::Body,
    B::Error: std::fmt::Display,
{
    incoming
        .collect()
        .await
        .map(http_body_util::Collected::to_bytes)
        .map_err(|e| CosiError::internal(format!("failed to read request body: {e}")))
}

/// Add common response headers to every COSI response.
fn add_common_headers(
    mut response: http::Response<CosiResponseBody>,
) -> http::Response<CosiResponseBody> {
    let headers = response.headers_mut();

    headers
        .entry("content-type")
        .or_insert(http::HeaderValue::from_static(CONTENT_TYPE));
    headers
        .entry(GRPC_STATUS)
        .or_insert(http::HeaderValue::from_static("0"));
    headers.insert(
        "server",
        http::HeaderValue::from_static("linode-cosi-driver"),
    );

    response
}
