//! Gmail API v1 wrapper
//!
//! Provides typed access to Gmail operations:
//! - Profile lookup
//! - List/get/send messages
//! - Modify labels, trash and untrash
//! - Draft list/get/create/update/send/delete

use serde_json::{json, Value};
use tracing::info;

use crate::client::{path_segment, GoogleClient};
use crate::GoogleError;

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

/// Gmail API client
pub struct GmailApi {
    client: GoogleClient,
    base_url: String,
}

crate::google_api_wrapper!(GmailApi, GMAIL_API_BASE);

/// Parameters shared by `messages.list` and `drafts.list`
#[derive(Debug, Default)]
pub struct ListQuery {
    pub q: Option<String>,
    pub limit: usize,
    pub include_spam_trash: Option<bool>,
}

impl ListQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(ref q) = self.q {
            params.push(("q", q.clone()));
        }
        if let Some(include) = self.include_spam_trash {
            params.push(("includeSpamTrash", include.to_string()));
        }
        params
    }
}

impl GmailApi {
    fn user_url(&self, user_id: &str, path: &str) -> String {
        self.url(&format!("users/{}/{}", path_segment(user_id), path))
    }

    pub async fn get_profile(&self, user_id: &str) -> Result<Value, GoogleError> {
        self.client.get(&self.user_url(user_id, "profile"), &[]).await
    }

    /// List message ids (`{id, threadId}`), following pages up to `query.limit`
    pub async fn list_messages(&self, user_id: &str, query: &ListQuery) -> Result<Vec<Value>, GoogleError> {
        info!("Listing Gmail messages");
        self.client
            .get_paginated(&self.user_url(user_id, "messages"), &query.params(), "messages", query.limit)
            .await
    }

    pub async fn get_message(
        &self,
        user_id: &str,
        message_id: &str,
        format: Option<&str>,
    ) -> Result<Value, GoogleError> {
        let url = self.user_url(user_id, &format!("messages/{}", path_segment(message_id)));
        let mut params = Vec::new();
        if let Some(format) = format {
            params.push(("format", format.to_string()));
        }
        self.client.get(&url, &params).await
    }

    /// Send a base64url-encoded RFC 2822 message
    pub async fn send_message(&self, user_id: &str, raw: &str, thread_id: Option<&str>) -> Result<Value, GoogleError> {
        info!("Sending Gmail message");
        let body = message_body(raw, thread_id);
        self.client
            .post(&self.user_url(user_id, "messages/send"), &[], &body)
            .await
    }

    pub async fn modify_labels(
        &self,
        user_id: &str,
        message_id: &str,
        add: &[String],
        remove: &[String],
    ) -> Result<Value, GoogleError> {
        let url = self.user_url(user_id, &format!("messages/{}/modify", path_segment(message_id)));
        let body = json!({
            "addLabelIds": add,
            "removeLabelIds": remove,
        });
        self.client.post(&url, &[], &body).await
    }

    pub async fn trash_message(&self, user_id: &str, message_id: &str) -> Result<Value, GoogleError> {
        let url = self.user_url(user_id, &format!("messages/{}/trash", path_segment(message_id)));
        self.client.post(&url, &[], &json!({})).await
    }

    pub async fn untrash_message(&self, user_id: &str, message_id: &str) -> Result<Value, GoogleError> {
        let url = self.user_url(user_id, &format!("messages/{}/untrash", path_segment(message_id)));
        self.client.post(&url, &[], &json!({})).await
    }

    pub async fn list_drafts(&self, user_id: &str, query: &ListQuery) -> Result<Vec<Value>, GoogleError> {
        info!("Listing Gmail drafts");
        self.client
            .get_paginated(&self.user_url(user_id, "drafts"), &query.params(), "drafts", query.limit)
            .await
    }

    pub async fn get_draft(&self, user_id: &str, draft_id: &str, format: Option<&str>) -> Result<Value, GoogleError> {
        let url = self.user_url(user_id, &format!("drafts/{}", path_segment(draft_id)));
        let mut params = Vec::new();
        if let Some(format) = format {
            params.push(("format", format.to_string()));
        }
        self.client.get(&url, &params).await
    }

    pub async fn send_draft(&self, user_id: &str, draft_id: &str) -> Result<Value, GoogleError> {
        info!("Sending Gmail draft {}", draft_id);
        self.client
            .post(&self.user_url(user_id, "drafts/send"), &[], &json!({"id": draft_id}))
            .await
    }

    pub async fn create_draft(&self, user_id: &str, raw: &str, thread_id: Option<&str>) -> Result<Value, GoogleError> {
        info!("Creating Gmail draft");
        let body = json!({"message": message_body(raw, thread_id)});
        self.client.post(&self.user_url(user_id, "drafts"), &[], &body).await
    }

    /// Replace the draft's message with `raw`
    pub async fn update_draft(&self, user_id: &str, draft_id: &str, raw: &str) -> Result<Value, GoogleError> {
        info!("Updating Gmail draft {}", draft_id);
        let url = self.user_url(user_id, &format!("drafts/{}", path_segment(draft_id)));
        let body = json!({"id": draft_id, "message": {"raw": raw}});
        self.client.put(&url, &[], &body).await
    }

    pub async fn delete_draft(&self, user_id: &str, draft_id: &str) -> Result<(), GoogleError> {
        info!("Deleting Gmail draft {}", draft_id);
        let url = self.user_url(user_id, &format!("drafts/{}", path_segment(draft_id)));
        self.client.delete(&url, &[]).await?;
        Ok(())
    }
}

fn message_body(raw: &str, thread_id: Option<&str>) -> Value {
    let mut body = json!({"raw": raw});
    if let Some(thread_id) = thread_id {
        body["threadId"] = json!(thread_id);
    }
    body
}
