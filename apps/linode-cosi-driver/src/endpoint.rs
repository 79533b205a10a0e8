//! Listener endpoints: `unix://<path>` and `tcp://<host>:<port>`.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tokio::net::{TcpListener, TcpStream, UnixListener, UnixStream};

/// Parsed `COSI_ENDPOINT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddr {
    /// Unix domain socket path.
    Unix(PathBuf),
    /// TCP `host:port`.
    Tcp(String),
}

impl ListenAddr {
    /// Parse a listener URL.
    pub fn parse(endpoint: &str) -> Result<Self> {
        let url = url::Url::parse(endpoint)
            .with_context(|| format!("invalid endpoint url: {endpoint}"))?;

        match url.scheme() {
            "unix" => {
                // `unix://relative.sock` puts the path in the host part.
                let path = format!("{}{}", url.host_str().unwrap_or_default(), url.path());
                if path.is_empty() {
                    bail!("unix endpoint has no socket path: {endpoint}");
                }
                Ok(Self::Unix(PathBuf::from(path)))
            }
            "tcp" => {
                let host = url
                    .host_str()
                    .with_context(|| format!("tcp endpoint has no host: {endpoint}"))?;
                let port = url
                    .port()
                    .with_context(|| format!("tcp endpoint has no port: {endpoint}"))?;
                Ok(Self::Tcp(format!("{host}:{port}")))
            }
            other => bail!("unsupported endpoint scheme {other:?}, expected unix or tcp"),
        }
    }

    /// Bind the listener. A stale unix socket file is removed first.
    pub async fn bind(&self) -> Result<Listener> {
        match self {
            Self::Unix(path) => {
                remove_socket(path)?;
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .with_context(|| format!("failed to create {}", parent.display()))?;
                }
                let listener = UnixListener::bind(path)
                    .with_context(|| format!("failed to bind to {}", path.display()))?;
                Ok(Listener::Unix(listener, path.clone()))
            }
            Self::Tcp(addr) => {
                let listener = TcpListener::bind(addr)
                    .await
                    .with_context(|| format!("failed to bind to {addr}"))?;
                Ok(Listener::Tcp(listener))
            }
        }
    }
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
        }
    }
}

/// A bound listener.
#[derive(Debug)]
pub enum Listener {
    /// Unix domain socket, with the path to remove on shutdown.
    Unix(UnixListener, PathBuf),
    /// TCP socket.
    Tcp(TcpListener),
}

/// An accepted connection.
#[derive(Debug)]
pub enum Connection {
    /// Unix domain socket stream.
    Unix(UnixStream),
    /// TCP stream.
    Tcp(TcpStream),
}

impl Listener {
    /// Accept one connection. Returns the stream and a printable peer address.
    pub async fn accept(&self) -> std::io::Result<(Connection, String)> {
        match self {
            Self::Unix(listener, _) => {
                let (stream, _) = listener.accept().await?;
                Ok((Connection::Unix(stream), "unix".to_owned()))
            }
            Self::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                Ok((Connection::Tcp(stream), peer.to_string()))
            }
        }
    }

    /// Address actually bound.
    pub fn local_addr(&self) -> Result<ListenAddr> {
        match self {
            Self::Unix(_, path) => Ok(ListenAddr::Unix(path.clone())),
            Self::Tcp(listener) => Ok(ListenAddr::Tcp(listener.local_addr()?.to_string())),
        }
    }

    /// Remove the unix socket file, if any.
    pub fn cleanup(&self) -> Result<()> {
        match self {
            Self::Unix(_, path) => remove_socket(path),
            Self::Tcp(_) => Ok(()),
        }
    }
}

fn remove_socket(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
    }
}
