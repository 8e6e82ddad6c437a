//! Error type for credential handling and Google REST calls.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GoogleError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Google API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("credentials file not found: {}", .0.display())]
    CredentialsNotFound(PathBuf),

    #[error("invalid credentials file: {0}")]
    InvalidCredentials(String),

    #[error("no stored token for {0}; run the `auth` command first")]
    TokenNotFound(String),

    #[error("token missing scope: {0}")]
    ScopeInsufficient(String),

    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("OAuth flow failed: {0}")]
    OAuthFlow(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
