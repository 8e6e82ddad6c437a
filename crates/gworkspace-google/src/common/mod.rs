//! Common utilities shared across the auth and API modules.

pub mod error;
pub mod http;
pub mod paths;

pub use error::GoogleError;
