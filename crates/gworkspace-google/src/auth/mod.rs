//! OAuth credential management
//!
//! Loads the OAuth client secrets, runs the installed-app consent flow once,
//! refreshes access tokens before they expire and persists the result so the
//! next process start can reuse it.

pub mod flow;
pub mod manager;
pub mod oauth;
pub mod secrets;
pub mod store;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::GoogleError;

pub use flow::ConsentPrompt;
pub use manager::TokenManager;
pub use oauth::OAuthClient;
pub use secrets::ClientSecrets;
pub use store::TokenStore;

/// Refresh tokens this close to expiry.
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Anything that can hand out a bearer token for the next request.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, GoogleError>;
}

/// A fixed access token, for tests and for callers that manage tokens themselves.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, GoogleError> {
        Ok(self.0.clone())
    }
}

/// Stored token record, in Google's "authorized user" JSON layout.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct TokenRecord {
    #[serde(alias = "access_token")]
    pub token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    #[zeroize(skip)]
    pub token_uri: String,
    #[serde(default)]
    #[zeroize(skip)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    #[zeroize(skip)]
    pub scopes: Vec<String>,
    #[serde(default)]
    #[zeroize(skip)]
    pub expiry: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[zeroize(skip)]
    pub account: Option<String>,
}

// Custom Debug implementation that redacts sensitive fields
impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("token_uri", &self.token_uri)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .field("expiry", &self.expiry)
            .field("account", &self.account)
            .finish()
    }
}

impl TokenRecord {
    /// Whether the access token expires within `margin_secs` of now.
    pub fn is_expiring(&self, margin_secs: i64) -> bool {
        is_token_expiring(&self.expiry, margin_secs)
    }

    /// Whether every scope in `required` was granted to this token.
    /// Tokens that never recorded their scopes are assumed to cover them.
    pub fn covers(&self, required: &[String]) -> bool {
        self.scopes.is_empty() || required.iter().all(|s| self.scopes.contains(s))
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }
}

/// Expiry timestamp `expires_in` seconds from now, as written to token files.
pub fn expiry_from_now(expires_in: i64) -> String {
    (Utc::now() + Duration::seconds(expires_in)).to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Check whether an RFC 3339 expiry is within `margin_secs` of now.
fn is_token_expiring(expiry: &str, margin_secs: i64) -> bool {
    match DateTime::parse_from_rfc3339(expiry) {
        Ok(exp) => {
            let remaining = exp.signed_duration_since(Utc::now()).num_seconds();
            remaining < margin_secs
        }
        Err(_) => true, // unparseable ⇒ treat as expired
    }
}
