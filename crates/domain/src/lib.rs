//! # Courier Domain
//!
//! Request, response, error and configuration types for the Courier
//! dispatch layer.
//!
//! ## Architecture
//! - No dependencies on other Courier crates
//! - Only external dependencies allowed
//! - Pure data types; all I/O lives in `courier-infra`

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;
pub mod utils;

pub use config::*;
pub use errors::*;
pub use types::*;
