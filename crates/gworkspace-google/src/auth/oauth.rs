//! Google OAuth2 endpoints
//!
//! Implements the PKCE authorization code exchange, token refresh, revocation
//! and the userinfo lookup used to label stored tokens.

use serde_json::Value;
use tracing::{error, info};

use super::{expiry_from_now, ClientSecrets, TokenRecord};
use crate::common::http::create_http_client;
use crate::GoogleError;

const REVOKE_ENDPOINT: &str = "https://oauth2.googleapis.com/revoke";
const USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Tokens returned by the token endpoint.
#[derive(Clone)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expiry: String,
    pub scopes: Vec<String>,
}

/// OAuth client bound to one set of client secrets.
pub struct OAuthClient {
    http: reqwest::Client,
    secrets: ClientSecrets,
    revoke_uri: String,
    userinfo_uri: String,
}

impl OAuthClient {
    pub fn new(secrets: ClientSecrets) -> Result<Self, GoogleError> {
        Self::with_endpoints(secrets, REVOKE_ENDPOINT, USERINFO_ENDPOINT)
    }

    /// Point revocation and userinfo at custom endpoints.
    /// The token endpoint always comes from the client secrets.
    pub fn with_endpoints(
        secrets: ClientSecrets,
        revoke_uri: impl Into<String>,
        userinfo_uri: impl Into<String>,
    ) -> Result<Self, GoogleError> {
        Ok(Self {
            http: create_http_client()?,
            secrets,
            revoke_uri: revoke_uri.into(),
            userinfo_uri: userinfo_uri.into(),
        })
    }

    pub fn secrets(&self) -> &ClientSecrets {
        &self.secrets
    }

    pub fn authorize_url(
        &self,
        scopes: &[String],
        state: &str,
        code_challenge: &str,
        redirect_uri: &str,
    ) -> String {
        let scope_str = scopes.join(" ");
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&code_challenge={}&code_challenge_method=S256&access_type=offline&prompt=consent",
            self.secrets.auth_uri,
            urlencoding::encode(&self.secrets.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scope_str),
            urlencoding::encode(state),
            urlencoding::encode(code_challenge),
        )
    }

    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<OAuthTokens, GoogleError> {
        info!("Exchanging authorization code for tokens");

        let params = [
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_str()),
            ("code", code),
            ("code_verifier", code_verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];

        let body = self
            .post_form(&self.secrets.token_uri, &params)
            .await
            .map_err(|e| GoogleError::OAuthFlow(e.to_string()))?;
        parse_token_response(&body).map_err(GoogleError::OAuthFlow)
    }

    /// Refresh using the client id/secret and token endpoint stored in the
    /// record, falling back to the loaded client secrets.
    pub async fn refresh(&self, record: &TokenRecord) -> Result<OAuthTokens, GoogleError> {
        info!("Refreshing access token");

        if !record.has_refresh_token() {
            return Err(GoogleError::RefreshFailed("stored token has no refresh_token".to_string()));
        }

        let client_id = non_empty_or(&record.client_id, &self.secrets.client_id);
        let client_secret = non_empty_or(&record.client_secret, &self.secrets.client_secret);
        let token_uri = non_empty_or(&record.token_uri, &self.secrets.token_uri);

        let params = [
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", record.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let body = self
            .post_form(token_uri, &params)
            .await
            .map_err(|e| GoogleError::RefreshFailed(e.to_string()))?;
        parse_token_response(&body).map_err(GoogleError::RefreshFailed)
    }

    pub async fn revoke(&self, token: &str) -> Result<(), GoogleError> {
        info!("Revoking token at Google");
        self.post_form(&self.revoke_uri, &[("token", token)]).await?;
        Ok(())
    }

    /// Email address of the account that granted `access_token`.
    pub async fn fetch_account_email(&self, access_token: &str) -> Result<String, GoogleError> {
        let response = self
            .http
            .get(&self.userinfo_uri)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GoogleError::Api {
                status: status.as_u16(),
                message: "Failed to fetch user info".to_string(),
            });
        }

        let user_info: Value = response.json().await?;
        user_info
            .get("email")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| GoogleError::OAuthFlow("email not found in user info".to_string()))
    }

    /// POST a form-encoded request and return the response body.
    async fn post_form(&self, url: &str, params: &[(&str, &str)]) -> Result<String, GoogleError> {
        let response = self.http.post(url).form(params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!("HTTP error {} from {}", status, url);
            return Err(GoogleError::Api {
                status: status.as_u16(),
                message: oauth_error_message(&body),
            });
        }
        Ok(body)
    }
}

fn non_empty_or<'a>(preferred: &'a str, fallback: &'a str) -> &'a str {
    if preferred.is_empty() {
        fallback
    } else {
        preferred
    }
}

fn oauth_error_message(body: &str) -> String {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    match (
        parsed.get("error").and_then(|v| v.as_str()),
        parsed.get("error_description").and_then(|v| v.as_str()),
    ) {
        (Some(err), Some(desc)) => format!("{}: {}", err, desc),
        (Some(err), None) => err.to_string(),
        _ if body.trim().is_empty() => "empty response".to_string(),
        _ => body.trim().chars().take(200).collect(),
    }
}

/// Parse a Google OAuth2 token response.
fn parse_token_response(body: &str) -> Result<OAuthTokens, String> {
    let parsed: Value =
        serde_json::from_str(body).map_err(|e| format!("Invalid JSON response: {}", e))?;

    if let Some(err) = parsed.get("error").and_then(|v| v.as_str()) {
        let desc = parsed
            .get("error_description")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown error");
        return Err(format!("{}: {}", err, desc));
    }

    let access_token = parsed
        .get("access_token")
        .and_then(|v| v.as_str())
        .ok_or("Missing access_token in response")?
        .to_string();

    let refresh_token = parsed
        .get("refresh_token")
        .and_then(|v| v.as_str())
        .map(String::from);

    let expires_in = parsed
        .get("expires_in")
        .and_then(|v| v.as_i64())
        .unwrap_or(3600);

    let scopes = parsed
        .get("scope")
        .and_then(|v| v.as_str())
        .map(|s| s.split_whitespace().map(String::from).collect())
        .unwrap_or_default();

    Ok(OAuthTokens {
        access_token,
        refresh_token,
        expiry: expiry_from_now(expires_in),
        scopes,
    })
}

// ── PKCE Utilities ──────────────────────────────────────────────────────────

/// Generate a PKCE code verifier (43-128 characters of unreserved URI characters).
pub fn generate_code_verifier() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64_url_encode(&bytes)
}

/// Derive the PKCE code challenge from a code verifier using S256.
pub fn generate_code_challenge(verifier: &str) -> String {
    use sha2::{Digest, Sha256};
    let hash = Sha256::digest(verifier.as_bytes());
    base64_url_encode(&hash)
}

/// Base64url encoding (no padding) per RFC 4648 §5.
fn base64_url_encode(data: &[u8]) -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    URL_SAFE_NO_PAD.encode(data)
}
