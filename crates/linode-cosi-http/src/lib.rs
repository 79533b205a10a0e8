//! COSI HTTP service layer for the Linode COSI driver.
//!
//! COSI is defined as a gRPC API. This crate serves the same methods as JSON
//! over HTTP/1.1 and HTTP/2, using the proto3 JSON mapping for messages:
//!
//! - **Router**: maps `POST /<service>/<method>` to a [`CosiOperation`]
//! - **Handler trait**: the boundary between HTTP and the provisioner
//! - **Service**: Hyper `Service` with deadlines and per-call logging
//! - **Response helpers**: JSON bodies plus `grpc-status`/`grpc-message`
//!
//! [`CosiOperation`]: linode_cosi_model::CosiOperation

pub mod body;
pub mod dispatch;
pub mod response;
pub mod router;
pub mod service;

pub use body::CosiResponseBody;
pub use dispatch::{CosiHandler, NotImplementedHandler};
pub use service::{CosiHttpConfig, CosiHttpService};
