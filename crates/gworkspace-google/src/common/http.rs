//! HTTP Client Utilities
//!
//! Shared HTTP client creation with consistent configuration.

use std::time::Duration;

use super::GoogleError;

/// Create a reqwest HTTP client with standard configuration
///
/// - 30 second request timeout
/// - 10 second connect timeout
pub fn create_http_client() -> Result<reqwest::Client, GoogleError> {
    create_http_client_with_timeout(30)
}

/// Create a reqwest HTTP client with custom request timeout
pub fn create_http_client_with_timeout(timeout_secs: u64) -> Result<reqwest::Client, GoogleError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .build()?;
    Ok(client)
}
