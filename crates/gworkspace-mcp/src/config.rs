//! Runtime settings shared by the CLI subcommands

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::info;

use gworkspace_google::auth::{ClientSecrets, ConsentPrompt, OAuthClient, TokenStore};
use gworkspace_google::common::paths::default_token_dir;
use gworkspace_google::{GoogleClient, Service, TokenManager};

/// Resolved locations and consent behavior for one service.
#[derive(Debug, Clone)]
pub struct Settings {
    pub service: Service,
    pub credentials: Option<PathBuf>,
    pub token_dir: PathBuf,
    pub prompt: ConsentPrompt,
}

impl Settings {
    /// `token_dir` falls back to the platform config directory.
    pub fn new(service: Service, credentials: Option<PathBuf>, token_dir: Option<PathBuf>, no_browser: bool) -> Result<Self> {
        let token_dir = match token_dir {
            Some(dir) => dir,
            None => default_token_dir().ok_or_else(|| anyhow!("could not determine a config directory; pass --token-dir"))?,
        };
        Ok(Self {
            service,
            credentials,
            token_dir,
            prompt: if no_browser {
                ConsentPrompt::PrintUrl
            } else {
                ConsentPrompt::OpenBrowser
            },
        })
    }

    pub fn credentials_path(&self) -> Result<&Path> {
        self.credentials
            .as_deref()
            .ok_or_else(|| anyhow!("--credentials (or GWORKSPACE_MCP_CREDENTIALS) is required"))
    }

    pub fn token_store(&self) -> TokenStore {
        TokenStore::for_service(&self.token_dir, self.service)
    }

    pub fn load_secrets(&self) -> Result<ClientSecrets> {
        let path = self.credentials_path()?;
        ClientSecrets::load(path).with_context(|| format!("loading client secrets from {}", path.display()))
    }

    /// Token manager for this service. `lazy_consent` lets a tool call start
    /// the browser flow when no usable token is stored.
    pub fn token_manager(&self, lazy_consent: bool) -> Result<TokenManager> {
        let oauth = OAuthClient::new(self.load_secrets()?)?;
        let store = self.token_store();
        info!("Token file: {}", store.path().display());
        let scopes = self.service.scopes();
        Ok(if lazy_consent {
            TokenManager::with_consent(oauth, store, scopes, self.prompt)
        } else {
            TokenManager::new(oauth, store, scopes)
        })
    }

    pub fn google_client(&self) -> Result<GoogleClient> {
        let tokens = Arc::new(self.token_manager(true)?);
        Ok(GoogleClient::new(tokens)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_token_dir() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::new(Service::Gmail, None, Some(dir.path().to_path_buf()), true).unwrap();
        assert_eq!(settings.prompt, ConsentPrompt::PrintUrl);
        assert_eq!(
            settings.token_store().path(),
            dir.path().join("gmail_auth_token.json").as_path()
        );
    }

    #[test]
    fn test_credentials_required_for_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::new(Service::Drive, None, Some(dir.path().to_path_buf()), false).unwrap();
        assert!(settings.load_secrets().is_err());
    }

    #[test]
    fn test_missing_credentials_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::new(
            Service::Drive,
            Some(dir.path().join("credentials.json")),
            Some(dir.path().to_path_buf()),
            false,
        )
        .unwrap();
        let Err(err) = settings.token_manager(true) else {
            panic!("a missing credentials file should fail");
        };
        assert!(format!("{:#}", err).contains("credentials.json"));
    }

    #[test]
    fn test_token_manager_from_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let credentials = dir.path().join("credentials.json");
        std::fs::write(
            &credentials,
            r#"{"installed": {"client_id": "id.apps.googleusercontent.com", "client_secret": "s"}}"#,
        )
        .unwrap();
        let settings = Settings::new(Service::Tasks, Some(credentials), Some(dir.path().to_path_buf()), false).unwrap();
        assert!(settings.google_client().is_ok());
    }
}
