//! Linode COSI driver core.
//!
//! Provisions Linode Object Storage buckets and access keys on behalf of the
//! Kubernetes Container Object Storage Interface:
//!
//! - [`linode`]: provider API contract, reqwest client and in-memory stub
//! - [`cache`]: region to S3 endpoint cache with a background refresh loop
//! - [`s3`]: bucket policy and cleanup client built on `aws-sdk-s3`
//! - [`broker`]: short-lived, bucket-scoped S3 keys
//! - [`provisioner`] and [`identity`]: the COSI services
//! - [`handler`]: the bridge from the HTTP layer to the services

pub mod broker;
pub mod cache;
pub mod config;
pub mod error;
pub mod handler;
pub mod identity;
pub mod linode;
pub mod params;
pub mod provisioner;
pub mod s3;

pub use broker::KeyBroker;
pub use cache::{EndpointCache, EndpointResolver};
pub use config::DriverConfig;
pub use handler::CosiDriverHandler;
pub use identity::{DRIVER_NAME, IdentityServer};
pub use provisioner::Provisioner;
