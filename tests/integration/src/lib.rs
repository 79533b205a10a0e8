//! Integration tests for the Linode COSI driver.
//!
//! Each test boots the real HTTP service on a loopback port, backed by the
//! in-memory provider and S3 stubs, and talks to it over the wire with
//! `reqwest`. No external services are needed.
//!
//! Run them with:
//! ```text
//! cargo test -p linode-cosi-integration
//! ```

use std::net::SocketAddr;
use std::sync::{Arc, Once};
use std::time::Duration;

use anyhow::{Context, Result};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use linode_cosi_core::linode::StubLinodeClient;
use linode_cosi_core::s3::StubS3ClientFactory;
use linode_cosi_core::{CosiDriverHandler, EndpointCache, IdentityServer, KeyBroker, Provisioner};
use linode_cosi_http::service::{CosiHttpConfig, CosiHttpService};
use linode_cosi_model::operations::CosiOperation;

/// Region seeded into the endpoint cache of every test driver.
pub const TEST_REGION: &str = "test-region";

/// S3 hostname of [`TEST_REGION`].
pub const TEST_ENDPOINT: &str = "test-region-1.linodeobjects.com";

/// Bucket label used by the seeded scenarios.
pub const TEST_BUCKET: &str = "test-bucket";

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Driver options.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverOptions {
    /// Enable forced cleanup on delete.
    pub force_cleanup: bool,
    /// Deadline applied to calls without a deadline header.
    pub default_timeout: Option<Duration>,
}

/// A driver served on a loopback port.
#[derive(Debug)]
pub struct TestDriver {
    /// Bound address.
    pub addr: SocketAddr,
    /// Provider stub behind the driver.
    pub linode: Arc<StubLinodeClient>,
    /// S3 stub behind the driver.
    pub s3: StubS3ClientFactory,
    client: reqwest::Client,
    server: JoinHandle<()>,
}

/// Outcome of one COSI call.
#[derive(Debug)]
pub struct CallResult {
    /// HTTP status.
    pub status: http::StatusCode,
    /// Value of the `grpc-status` header.
    pub grpc_status: Option<i32>,
    /// JSON body.
    pub body: serde_json::Value,
}

impl CallResult {
    /// `code` field of an error body.
    #[must_use]
    pub fn code(&self) -> &str {
        self.body["code"].as_str().unwrap_or("OK")
    }
}

impl TestDriver {
    /// Start a driver over an empty provider.
    pub async fn start() -> Result<Self> {
        Self::start_with(StubLinodeClient::new(), DriverOptions::default()).await
    }

    /// Start a driver over a seeded provider.
    pub async fn start_with(linode: StubLinodeClient, options: DriverOptions) -> Result<Self> {
        init_tracing();

        let linode = Arc::new(linode);
        let s3 = StubS3ClientFactory::with_tracker(linode.clone());

        let cache = Arc::new(EndpointCache::new(linode.clone(), Duration::ZERO));
        cache.set(TEST_REGION, TEST_ENDPOINT);

        let broker = KeyBroker::ephemeral(linode.clone(), Arc::new(s3.clone()));
        let provisioner =
            Provisioner::new(linode.clone(), cache, broker).with_force_cleanup(options.force_cleanup);
        let handler = CosiDriverHandler::new(
            Arc::new(IdentityServer::default()),
            Arc::new(provisioner),
        );
        let service = CosiHttpService::new(
            Arc::new(handler),
            CosiHttpConfig {
                default_timeout: options.default_timeout,
            },
        );

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind loopback listener")?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(accept_loop(listener, service));

        Ok(Self {
            addr,
            linode,
            s3,
            client: reqwest::Client::new(),
            server,
        })
    }

    /// Call a COSI method with a JSON message.
    pub async fn call(&self, op: CosiOperation, body: serde_json::Value) -> Result<CallResult> {
        let req = self
            .client
            .post(format!("http://{}{}", self.addr, op.path()))
            .json(&body);
        Self::execute(req).await
    }

    /// Send an arbitrary request to `path`.
    pub async fn raw(
        &self,
        method: reqwest::Method,
        path: &str,
        headers: &[(&str, &str)],
        body: &'static [u8],
    ) -> Result<CallResult> {
        let mut req = self
            .client
            .request(method, format!("http://{}{path}", self.addr))
            .body(body);
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        Self::execute(req).await
    }

    async fn execute(req: reqwest::RequestBuilder) -> Result<CallResult> {
        let resp = req.send().await.context("request failed")?;
        let status = http::StatusCode::from_u16(resp.status().as_u16())?;
        let grpc_status = resp
            .headers()
            .get("grpc-status")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let bytes = resp.bytes().await?;
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).context("response is not JSON")?
        };
        Ok(CallResult {
            status,
            grpc_status,
            body,
        })
    }

    /// `DriverCreateBucket` for `name` with the given parameters.
    pub async fn create_bucket(&self, name: &str, params: &[(&str, &str)]) -> Result<CallResult> {
        self.call(
            CosiOperation::DriverCreateBucket,
            serde_json::json!({ "name": name, "parameters": to_map(params) }),
        )
        .await
    }

    /// `DriverGrantBucketAccess` on `bucket_id`.
    pub async fn grant(
        &self,
        bucket_id: &str,
        auth: &str,
        params: &[(&str, &str)],
    ) -> Result<CallResult> {
        self.call(
            CosiOperation::DriverGrantBucketAccess,
            serde_json::json!({
                "bucketId": bucket_id,
                "name": "ba-integration",
                "authenticationType": auth,
                "parameters": to_map(params),
            }),
        )
        .await
    }

    /// `DriverRevokeBucketAccess` of `account_id`.
    pub async fn revoke(&self, bucket_id: &str, account_id: &str) -> Result<CallResult> {
        self.call(
            CosiOperation::DriverRevokeBucketAccess,
            serde_json::json!({ "bucketId": bucket_id, "accountId": account_id }),
        )
        .await
    }
}

impl Drop for TestDriver {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Parameter pairs as a JSON object.
#[must_use]
pub fn to_map(pairs: &[(&str, &str)]) -> serde_json::Value {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), serde_json::Value::String((*v).to_owned())))
        .collect::<serde_json::Map<_, _>>()
        .into()
}

async fn accept_loop(listener: TcpListener, service: CosiHttpService<CosiDriverHandler>) {
    let http = HttpConnBuilder::new(TokioExecutor::new());
    loop {
        let stream = match listener.accept().await {
            Ok((stream, _)) => stream,
            Err(e) => {
                tracing::warn!(error = %e, "failed to accept connection");
                continue;
            }
        };
        let conn = http
            .serve_connection(TokioIo::new(stream), service.clone())
            .into_owned();
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "connection error");
            }
        });
    }
}

mod test_access;
mod test_linode_api;
mod test_s3_client;
