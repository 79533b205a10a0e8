//! COSI model types for the Linode COSI driver.
//!
//! Hand-written counterparts of the `cosi.v1alpha1` protobuf messages. Field
//! names follow the proto3 JSON mapping (`lowerCamelCase`, enums as names) so
//! the HTTP layer can (de)serialize them with serde directly.
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod input;
pub mod operations;
pub mod output;
pub mod types;

pub use error::{CosiCode, CosiError};
pub use operations::CosiOperation;
