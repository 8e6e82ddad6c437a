//! Google API Authenticated HTTP Client
//!
//! Provides an HTTP client that injects a fresh OAuth access token into every
//! request. Handles pagination and error responses according to Google API
//! REST conventions.

use std::borrow::Cow;
use std::sync::Arc;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::auth::AccessTokenSource;
use crate::common::http::create_http_client;
use crate::GoogleError;

type Query<'a> = [(&'a str, String)];

/// Google API HTTP client with OAuth token injection
#[derive(Clone)]
pub struct GoogleClient {
    client: Client,
    tokens: Arc<dyn AccessTokenSource>,
}

impl GoogleClient {
    /// Create a new Google API client that asks `tokens` for a bearer token per request
    pub fn new(tokens: Arc<dyn AccessTokenSource>) -> Result<Self, GoogleError> {
        Ok(Self {
            client: create_http_client()?,
            tokens,
        })
    }

    /// Make an authenticated GET request
    pub async fn get(&self, url: &str, query: &Query<'_>) -> Result<Value, GoogleError> {
        let builder = self.client.get(url).query(query);
        self.execute_request(builder).await
    }

    /// Make an authenticated GET request and return the raw body (media downloads, exports)
    pub async fn get_bytes(&self, url: &str, query: &Query<'_>) -> Result<Vec<u8>, GoogleError> {
        let builder = self.client.get(url).query(query);
        let response = self.send(builder).await?;
        let response = ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Make an authenticated POST request with JSON body
    pub async fn post(&self, url: &str, query: &Query<'_>, body: &Value) -> Result<Value, GoogleError> {
        let builder = self.client.post(url).query(query).json(body);
        self.execute_request(builder).await
    }

    /// Make an authenticated PUT request with JSON body
    pub async fn put(&self, url: &str, query: &Query<'_>, body: &Value) -> Result<Value, GoogleError> {
        let builder = self.client.put(url).query(query).json(body);
        self.execute_request(builder).await
    }

    /// Make an authenticated PATCH request with JSON body
    pub async fn patch(&self, url: &str, query: &Query<'_>, body: &Value) -> Result<Value, GoogleError> {
        let builder = self.client.patch(url).query(query).json(body);
        self.execute_request(builder).await
    }

    /// Make an authenticated DELETE request
    pub async fn delete(&self, url: &str, query: &Query<'_>) -> Result<Value, GoogleError> {
        let builder = self.client.delete(url).query(query);
        self.execute_request(builder).await
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, GoogleError> {
        let token = self.tokens.access_token().await?;
        debug!("Executing Google API request");
        let response = builder.bearer_auth(token).send().await?;
        debug!("Response status: {}", response.status());
        Ok(response)
    }

    /// Execute a request and handle Google API response patterns
    async fn execute_request(&self, builder: RequestBuilder) -> Result<Value, GoogleError> {
        let response = self.send(builder).await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        // Empty successful responses (e.g., DELETE)
        if body.trim().is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Follow `nextPageToken` until `limit` items from `items_field` are collected
    pub async fn get_paginated(
        &self,
        url: &str,
        base_query: &Query<'_>,
        items_field: &str,
        limit: usize,
    ) -> Result<Vec<Value>, GoogleError> {
        let mut all_items = Vec::new();
        if limit == 0 {
            return Ok(all_items);
        }
        let mut page_token: Option<String> = None;

        loop {
            let mut query = base_query.to_vec();
            query.push(("maxResults", (limit - all_items.len()).to_string()));
            if let Some(ref token) = page_token {
                query.push(("pageToken", token.clone()));
            }

            let response = self.get(url, &query).await?;

            if let Some(items) = response.get(items_field).and_then(|v| v.as_array()) {
                all_items.extend(items.iter().cloned());
            }

            if all_items.len() >= limit {
                all_items.truncate(limit);
                break;
            }

            match response.get("nextPageToken").and_then(|v| v.as_str()) {
                Some(next) => page_token = Some(next.to_string()),
                None => break,
            }
        }

        debug!("Collected {} items from {}", all_items.len(), items_field);
        Ok(all_items)
    }
}

/// Percent-encode a resource id for use as a URL path segment.
/// Calendar ids in particular contain `@` and `#`.
pub fn path_segment(id: &str) -> Cow<'_, str> {
    urlencoding::encode(id)
}

async fn ensure_success(response: Response) -> Result<Response, GoogleError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(api_error(status, &body))
}

fn api_error(status: StatusCode, body: &str) -> GoogleError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        warn!("Rate limited by Google API");
    }
    let message = extract_error_message(body, status);
    error!("Google API error {}: {}", status.as_u16(), message);
    GoogleError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Extract error message from a Google API error body
fn extract_error_message(body: &str, status: StatusCode) -> String {
    // Google APIs return errors in this format:
    // {
    //   "error": {
    //     "code": 400,
    //     "message": "Invalid request",
    //     "errors": [...]
    //   }
    // }
    if let Ok(parsed) = serde_json::from_str::<Value>(body) {
        let error = parsed.get("error");
        if let Some(message) = error.and_then(|e| e.get("message")).and_then(|v| v.as_str()) {
            return message.to_string();
        }
        // OAuth endpoints use a flat {"error": "...", "error_description": "..."}
        if let Some(desc) = parsed.get("error_description").and_then(|v| v.as_str()) {
            return desc.to_string();
        }
        if let Some(code) = error.and_then(|v| v.as_str()) {
            return code.to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        status.canonical_reason().unwrap_or("Unknown error").to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use serde_json::json;

    fn client() -> GoogleClient {
        GoogleClient::new(Arc::new(StaticToken::new("test-token"))).unwrap()
    }

    #[test]
    fn test_extract_error_message() {
        let body = json!({
            "error": {
                "code": 400,
                "message": "Invalid request format"
            }
        })
        .to_string();

        let msg = extract_error_message(&body, StatusCode::BAD_REQUEST);
        assert_eq!(msg, "Invalid request format");
    }

    #[test]
    fn test_extract_error_message_fallbacks() {
        let oauth = r#"{"error": "invalid_grant", "error_description": "Token has been revoked"}"#;
        assert_eq!(extract_error_message(oauth, StatusCode::BAD_REQUEST), "Token has been revoked");
        assert_eq!(extract_error_message("", StatusCode::NOT_FOUND), "Not Found");
        assert_eq!(extract_error_message("upstream exploded", StatusCode::BAD_GATEWAY), "upstream exploded");
    }

    #[test]
    fn test_path_segment_encodes_calendar_ids() {
        assert_eq!(
            path_segment("en.usa#holiday@group.v.calendar.google.com"),
            "en.usa%23holiday%40group.v.calendar.google.com"
        );
    }

    #[tokio::test]
    async fn test_bearer_token_is_injected() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/thing")
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok": true}"#)
            .create_async()
            .await;

        let value = client().get(&format!("{}/thing", server.url()), &[]).await.unwrap();
        assert_eq!(value, json!({"ok": true}));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_success_body_becomes_empty_object() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("DELETE", "/thing").with_status(204).create_async().await;

        let value = client().delete(&format!("{}/thing", server.url()), &[]).await.unwrap();
        assert_eq!(value, json!({}));
    }

    #[tokio::test]
    async fn test_error_status_maps_to_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .with_body(r#"{"error": {"code": 404, "message": "File not found: x"}}"#)
            .create_async()
            .await;

        let err = client().get(&format!("{}/missing", server.url()), &[]).await.unwrap_err();
        match err {
            GoogleError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "File not found: x");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_paginated_follows_page_tokens() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/items")
            .match_query(mockito::Matcher::UrlEncoded("maxResults".into(), "3".into()))
            .with_status(200)
            .with_body(r#"{"messages": [{"id": "1"}, {"id": "2"}], "nextPageToken": "p2"}"#)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/items")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("maxResults".into(), "1".into()),
                mockito::Matcher::UrlEncoded("pageToken".into(), "p2".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"messages": [{"id": "3"}], "nextPageToken": "p3"}"#)
            .create_async()
            .await;

        let items = client()
            .get_paginated(&format!("{}/items", server.url()), &[], "messages", 3)
            .await
            .unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[2]["id"], json!("3"));
        first.assert_async().await;
        second.assert_async().await;
    }
}
