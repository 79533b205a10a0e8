//! Linode COSI driver.
//!
//! Serves the COSI identity and provisioner methods for Linode Object Storage.
//! The COSI sidecar reaches the driver on `COSI_ENDPOINT`.
//!
//! # Usage
//!
//! ```text
//! LINODE_TOKEN=... COSI_ENDPOINT=unix:///var/lib/cosi/cosi.sock linode-cosi-driver
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LINODE_TOKEN` | *(required)* | Provider API token |
//! | `COSI_ENDPOINT` | `unix:///var/lib/cosi/cosi.sock` | Listener URL |
//! | `S3_CLIENT_EPHEMERAL_CREDENTIALS` | `true` | Mint bucket-scoped keys for S3 calls |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `LOG_FORMAT` | `text` | `text` or `json` |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

mod endpoint;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use linode_cosi_core::linode::{LinodeApiClient, LinodeClient};
use linode_cosi_core::s3::{LinodeS3ClientFactory, S3ClientFactory};
use linode_cosi_core::{
    CosiDriverHandler, DRIVER_NAME, DriverConfig, EndpointCache, IdentityServer, KeyBroker,
    Provisioner,
};
use linode_cosi_http::service::{CosiHttpConfig, CosiHttpService};

use crate::endpoint::{Connection, ListenAddr, Listener};

/// Driver version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How long in-flight calls may run after a shutdown signal.
const GRACE_PERIOD: Duration = Duration::from_secs(5);

type Service = CosiHttpService<CosiDriverHandler>;

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str, log_format: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}

/// Wire the provider client, endpoint cache and services together.
fn build(config: &DriverConfig) -> Result<(Service, Arc<EndpointCache>)> {
    let linode: Arc<dyn LinodeClient> = Arc::new(
        LinodeApiClient::new(&config.linode_api_config())
            .context("failed to create provider client")?,
    );
    let cache = Arc::new(EndpointCache::new(
        Arc::clone(&linode),
        config.endpoint_cache_ttl,
    ));
    let factory: Arc<dyn S3ClientFactory> = Arc::new(LinodeS3ClientFactory::new(
        cache.clone(),
        config.s3_ssl_enabled,
    ));

    let broker = match config.static_s3_keys() {
        Some((access_key, secret_key)) if !config.s3_ephemeral_credentials => {
            KeyBroker::with_static_keys(Arc::clone(&linode), factory, access_key, secret_key)
        }
        _ => KeyBroker::ephemeral(Arc::clone(&linode), factory),
    };

    let provisioner = Provisioner::new(linode, cache.clone(), broker)
        .with_force_cleanup(config.force_bucket_cleanup);
    let identity = IdentityServer::new(DRIVER_NAME)?;
    let handler = CosiDriverHandler::new(Arc::new(identity), Arc::new(provisioner));

    Ok((
        CosiHttpService::new(Arc::new(handler), CosiHttpConfig::default()),
        cache,
    ))
}

/// Resolve when SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("received shutdown signal, draining connections");
}

/// Serve one accepted connection under graceful shutdown.
fn spawn_connection<IO>(
    http: &HttpConnBuilder<TokioExecutor>,
    graceful: &GracefulShutdown,
    io: IO,
    service: Service,
    peer: String,
) where
    IO: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let conn = http.serve_connection(TokioIo::new(io), service);
    let conn = graceful.watch(conn.into_owned());

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            error!(peer_addr = %peer, error = %e, "connection error");
        }
    });
}

/// Run the accept loop, serving connections until `shutdown` resolves.
async fn serve(
    listener: &Listener,
    service: Service,
    shutdown: impl std::future::Future<Output = ()>,
) {
    let graceful = GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (conn, peer) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.clone();
                match conn {
                    Connection::Unix(stream) => spawn_connection(&http, &graceful, stream, svc, peer),
                    Connection::Tcp(stream) => spawn_connection(&http, &graceful, stream, svc, peer),
                }
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    // Wait for in-flight calls, but not forever.
    if tokio::time::timeout(GRACE_PERIOD, graceful.shutdown())
        .await
        .is_err()
    {
        warn!(grace_period = ?GRACE_PERIOD, "grace period elapsed, dropping open connections");
    } else {
        info!("all connections drained");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = DriverConfig::from_env().context("failed to load configuration")?;

    init_tracing(&config.log_level, &config.log_format)?;
    config.validate().context("invalid configuration")?;

    info!(
        driver = DRIVER_NAME,
        endpoint = %config.cosi_endpoint,
        api_url = %config.linode_api_url,
        ephemeral_credentials = config.s3_ephemeral_credentials,
        force_bucket_cleanup = config.force_bucket_cleanup,
        version = VERSION,
        "starting Linode COSI driver",
    );

    let (service, cache) = build(&config)?;

    let shutdown = CancellationToken::new();
    let cache_task = tokio::spawn({
        let cache = Arc::clone(&cache);
        let shutdown = shutdown.clone();
        async move { cache.run(shutdown).await }
    });

    let addr = ListenAddr::parse(&config.cosi_endpoint)?;
    let listener = addr.bind().await?;
    info!(addr = %listener.local_addr()?, "listening for connections");

    serve(&listener, service, shutdown_signal()).await;

    shutdown.cancel();
    if let Err(e) = cache_task.await {
        warn!(error = %e, "endpoint cache task failed");
    }
    listener.cleanup()?;
    info!("driver stopped");

    Ok(())
}
