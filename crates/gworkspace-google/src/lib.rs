//! Google Workspace REST adapters
//!
//! OAuth credential management plus thin clients for Drive v3, Gmail v1,
//! Calendar v3 and Tasks v1. Each API struct wraps a [`GoogleClient`] that
//! injects a fresh bearer token on every request.

pub mod auth;
pub mod calendar_api;
pub mod client;
pub mod common;
pub mod drive;
pub mod gmail;
pub mod mime;
pub mod service;
pub mod tasks;
pub mod validate;

pub use auth::{AccessTokenSource, StaticToken, TokenManager};
pub use calendar_api::CalendarApi;
pub use client::GoogleClient;
pub use common::error::GoogleError;
pub use drive::DriveApi;
pub use gmail::GmailApi;
pub use service::Service;
pub use tasks::TasksApi;

/// Implements the constructor pattern shared by every API wrapper.
/// Each struct wraps a `GoogleClient` and a base URL that tests can point
/// at a mock server.
macro_rules! google_api_wrapper {
    ($name:ident, $base:expr) => {
        impl $name {
            /// Create an API wrapper against the production endpoint
            pub fn new(client: $crate::client::GoogleClient) -> Self {
                Self::with_base_url(client, $base)
            }

            /// Create an API wrapper against a custom endpoint
            pub fn with_base_url(client: $crate::client::GoogleClient, base_url: impl Into<String>) -> Self {
                let base_url: String = base_url.into();
                Self {
                    client,
                    base_url: base_url.trim_end_matches('/').to_string(),
                }
            }

            fn url(&self, path: &str) -> String {
                format!("{}/{}", self.base_url, path)
            }
        }
    };
}

pub(crate) use google_api_wrapper;
