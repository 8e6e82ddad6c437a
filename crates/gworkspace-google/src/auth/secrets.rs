//! OAuth client secrets (`credentials.json` from the Google Cloud Console).

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::GoogleError;

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// The `installed` (Desktop app) or `web` client description.
#[derive(Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

#[derive(Deserialize)]
struct SecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl fmt::Debug for ClientSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSecrets")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("auth_uri", &self.auth_uri)
            .field("token_uri", &self.token_uri)
            .field("redirect_uris", &self.redirect_uris)
            .finish()
    }
}

impl ClientSecrets {
    /// Load client secrets from a `credentials.json` file.
    pub fn load(path: &Path) -> Result<Self, GoogleError> {
        if !path.exists() {
            return Err(GoogleError::CredentialsNotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, GoogleError> {
        let file: SecretsFile = serde_json::from_str(raw)
            .map_err(|e| GoogleError::InvalidCredentials(e.to_string()))?;

        let secrets = file.installed.or(file.web).ok_or_else(|| {
            GoogleError::InvalidCredentials("expected an \"installed\" or \"web\" client".to_string())
        })?;

        if secrets.client_id.trim().is_empty() {
            return Err(GoogleError::InvalidCredentials("client_id is empty".to_string()));
        }
        Ok(secrets)
    }
}
