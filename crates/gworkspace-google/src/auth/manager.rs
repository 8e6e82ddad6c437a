//! Token lifecycle for one service
//!
//! Owns the stored token, refreshes it before expiry and falls back to the
//! consent flow when no usable token exists.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::flow::{run_consent_flow, ConsentPrompt};
use super::oauth::{OAuthClient, OAuthTokens};
use super::store::TokenStore;
use super::{AccessTokenSource, TokenRecord, REFRESH_MARGIN_SECS};
use crate::GoogleError;

pub struct TokenManager {
    oauth: OAuthClient,
    store: TokenStore,
    scopes: Vec<String>,
    /// `None` disables interactive consent; missing tokens become errors.
    prompt: Option<ConsentPrompt>,
    current: Mutex<Option<TokenRecord>>,
}

impl TokenManager {
    /// Manager that never starts the consent flow on its own.
    pub fn new(oauth: OAuthClient, store: TokenStore, scopes: Vec<String>) -> Self {
        Self {
            oauth,
            store,
            scopes,
            prompt: None,
            current: Mutex::new(None),
        }
    }

    /// Manager that runs consent lazily when no usable token exists.
    pub fn with_consent(oauth: OAuthClient, store: TokenStore, scopes: Vec<String>, prompt: ConsentPrompt) -> Self {
        Self {
            prompt: Some(prompt),
            ..Self::new(oauth, store, scopes)
        }
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Run the consent flow unconditionally and persist the result.
    /// Returns the authorized account email when Google reports it.
    pub async fn authorize(&self, prompt: ConsentPrompt) -> Result<Option<String>, GoogleError> {
        let mut current = self.current.lock().await;
        let record = self.consent(prompt).await?;
        let account = record.account.clone();
        *current = Some(record);
        Ok(account)
    }

    /// Revoke the stored token at Google (best-effort) and delete it locally.
    /// Returns whether a token file existed.
    pub async fn revoke(&self) -> Result<bool, GoogleError> {
        let mut current = self.current.lock().await;
        *current = None;

        if let Some(record) = self.store.load()? {
            let token = if record.has_refresh_token() {
                &record.refresh_token
            } else {
                &record.token
            };
            if let Err(e) = self.oauth.revoke(token).await {
                warn!("Token revocation failed, deleting local copy anyway: {}", e);
            }
        }
        self.store.remove()
    }

    async fn consent(&self, prompt: ConsentPrompt) -> Result<TokenRecord, GoogleError> {
        info!("Starting OAuth consent flow");
        let tokens = run_consent_flow(&self.oauth, &self.scopes, prompt).await?;

        let account = match self.oauth.fetch_account_email(&tokens.access_token).await {
            Ok(email) => Some(email),
            Err(e) => {
                warn!("Could not determine account email: {}", e);
                None
            }
        };

        let record = self.record_from(tokens, account);
        self.store.save(&record)?;
        info!("Stored new token for {}", record.account.as_deref().unwrap_or("unknown account"));
        Ok(record)
    }

    fn record_from(&self, tokens: OAuthTokens, account: Option<String>) -> TokenRecord {
        let secrets = self.oauth.secrets();
        TokenRecord {
            token: tokens.access_token,
            refresh_token: tokens.refresh_token.unwrap_or_default(),
            token_uri: secrets.token_uri.clone(),
            client_id: secrets.client_id.clone(),
            client_secret: secrets.client_secret.clone(),
            scopes: if tokens.scopes.is_empty() {
                self.scopes.clone()
            } else {
                tokens.scopes
            },
            expiry: tokens.expiry,
            account,
        }
    }

    /// Apply a refresh response to the stored record in place.
    /// Google omits the refresh token and sometimes the scopes on refresh.
    fn apply_refresh(record: &mut TokenRecord, tokens: OAuthTokens) {
        record.token = tokens.access_token;
        if let Some(refresh) = tokens.refresh_token {
            record.refresh_token = refresh;
        }
        if !tokens.scopes.is_empty() {
            record.scopes = tokens.scopes;
        }
        record.expiry = tokens.expiry;
    }

    /// No usable token: run consent when allowed, otherwise report why.
    async fn consent_or(&self, err: GoogleError) -> Result<TokenRecord, GoogleError> {
        match self.prompt {
            Some(prompt) => self.consent(prompt).await,
            None => Err(err),
        }
    }
}

#[async_trait]
impl AccessTokenSource for TokenManager {
    async fn access_token(&self) -> Result<String, GoogleError> {
        let mut current = self.current.lock().await;

        if current.is_none() {
            *current = self.store.load()?;
        }

        if let Some(record) = current.as_ref() {
            if !record.covers(&self.scopes) {
                warn!("Stored token lacks required scopes");
                let missing: Vec<&str> = self
                    .scopes
                    .iter()
                    .filter(|s| !record.scopes.contains(*s))
                    .map(String::as_str)
                    .collect();
                let err = GoogleError::ScopeInsufficient(missing.join(" "));
                *current = None;
                let fresh = self.consent_or(err).await?;
                let token = fresh.token.clone();
                *current = Some(fresh);
                return Ok(token);
            }
        }

        let Some(record) = current.as_mut() else {
            let err = GoogleError::TokenNotFound(self.store.path().display().to_string());
            let fresh = self.consent_or(err).await?;
            let token = fresh.token.clone();
            *current = Some(fresh);
            return Ok(token);
        };

        if !record.is_expiring(REFRESH_MARGIN_SECS) {
            return Ok(record.token.clone());
        }

        debug!("Access token expiring, refreshing");
        match self.oauth.refresh(record).await {
            Ok(tokens) => {
                Self::apply_refresh(record, tokens);
                self.store.save(record)?;
                Ok(record.token.clone())
            }
            Err(e) if !record.is_expiring(0) => {
                warn!("Refresh failed, using current token until it expires: {}", e);
                Ok(record.token.clone())
            }
            Err(e) => {
                warn!("Refresh failed: {}", e);
                *current = None;
                let fresh = self.consent_or(e).await?;
                let token = fresh.token.clone();
                *current = Some(fresh);
                Ok(token)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{expiry_from_now, ClientSecrets};
    use crate::Service;

    fn oauth(token_uri: &str) -> OAuthClient {
        let secrets = ClientSecrets::from_json(&format!(
            r#"{{"installed": {{"client_id": "cid", "client_secret": "csecret", "token_uri": "{}"}}}}"#,
            token_uri
        ))
        .unwrap();
        OAuthClient::new(secrets).unwrap()
    }

    fn record(token_uri: &str, expiry: String, scopes: Vec<String>) -> TokenRecord {
        TokenRecord {
            token: "ya29.stored".to_string(),
            refresh_token: "1//refresh".to_string(),
            token_uri: token_uri.to_string(),
            client_id: "cid".to_string(),
            client_secret: "csecret".to_string(),
            scopes,
            expiry,
            account: Some("user@example.com".to_string()),
        }
    }

    #[tokio::test]
    async fn test_missing_token_without_consent() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TokenManager::new(
            oauth("http://127.0.0.1:9/token"),
            TokenStore::for_service(dir.path(), Service::Drive),
            Service::Drive.scopes(),
        );
        let err = manager.access_token().await.unwrap_err();
        assert!(matches!(err, GoogleError::TokenNotFound(_)));
    }

    #[tokio::test]
    async fn test_fresh_token_is_used_without_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::for_service(dir.path(), Service::Tasks);
        store
            .save(&record("http://127.0.0.1:9/token", expiry_from_now(3600), Service::Tasks.scopes()))
            .unwrap();

        let manager = TokenManager::new(oauth("http://127.0.0.1:9/token"), store, Service::Tasks.scopes());
        assert_eq!(manager.access_token().await.unwrap(), "ya29.stored");
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_persisted() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "ya29.refreshed", "expires_in": 3599}"#)
            .expect(1)
            .create_async()
            .await;
        let token_uri = format!("{}/token", server.url());

        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::for_service(dir.path(), Service::Gmail);
        store
            .save(&record(&token_uri, expiry_from_now(-60), Service::Gmail.scopes()))
            .unwrap();

        let manager = TokenManager::new(oauth(&token_uri), store, Service::Gmail.scopes());
        assert_eq!(manager.access_token().await.unwrap(), "ya29.refreshed");
        // Second call is served from the refreshed in-memory record
        assert_eq!(manager.access_token().await.unwrap(), "ya29.refreshed");
        mock.assert_async().await;

        let saved = manager.store().load().unwrap().unwrap();
        assert_eq!(saved.token, "ya29.refreshed");
        assert_eq!(saved.refresh_token, "1//refresh");
        assert_eq!(saved.scopes, Service::Gmail.scopes());
        assert!(!saved.is_expiring(REFRESH_MARGIN_SECS));
    }

    #[tokio::test]
    async fn test_refresh_failure_on_expired_token() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error": "invalid_grant"}"#)
            .create_async()
            .await;
        let token_uri = format!("{}/token", server.url());

        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::for_service(dir.path(), Service::Calendar);
        store
            .save(&record(&token_uri, expiry_from_now(-60), Service::Calendar.scopes()))
            .unwrap();

        let manager = TokenManager::new(oauth(&token_uri), store, Service::Calendar.scopes());
        let err = manager.access_token().await.unwrap_err();
        assert!(matches!(err, GoogleError::RefreshFailed(_)));
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_unexpired_token() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .with_status(500)
            .create_async()
            .await;
        let token_uri = format!("{}/token", server.url());

        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::for_service(dir.path(), Service::Calendar);
        store
            .save(&record(&token_uri, expiry_from_now(30), Service::Calendar.scopes()))
            .unwrap();

        let manager = TokenManager::new(oauth(&token_uri), store, Service::Calendar.scopes());
        assert_eq!(manager.access_token().await.unwrap(), "ya29.stored");
    }

    #[tokio::test]
    async fn test_insufficient_scopes_without_consent() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::for_service(dir.path(), Service::Gmail);
        store
            .save(&record("http://127.0.0.1:9/token", expiry_from_now(3600), Service::Drive.scopes()))
            .unwrap();

        let manager = TokenManager::new(oauth("http://127.0.0.1:9/token"), store, Service::Gmail.scopes());
        let err = manager.access_token().await.unwrap_err();
        match err {
            GoogleError::ScopeInsufficient(missing) => assert!(missing.contains("gmail.send")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_revoke_deletes_token_file() {
        let mut server = mockito::Server::new_async().await;
        let revoke = server
            .mock("POST", "/revoke")
            .with_status(200)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::for_service(dir.path(), Service::Drive);
        store
            .save(&record("http://127.0.0.1:9/token", expiry_from_now(3600), Vec::new()))
            .unwrap();

        let secrets = ClientSecrets::from_json(r#"{"installed": {"client_id": "cid"}}"#).unwrap();
        let oauth = OAuthClient::with_endpoints(
            secrets,
            format!("{}/revoke", server.url()),
            format!("{}/userinfo", server.url()),
        )
        .unwrap();
        let manager = TokenManager::new(oauth, store, Service::Drive.scopes());

        assert!(manager.revoke().await.unwrap());
        assert!(manager.store().load().unwrap().is_none());
        assert!(!manager.revoke().await.unwrap());
        revoke.assert_async().await;
    }
}
