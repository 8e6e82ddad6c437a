//! Google Tasks API v1 wrapper
//!
//! Provides typed access to Tasks operations:
//! - Tasklist list/create/get/patch/delete
//! - Task list/create/get/patch/move/delete and clearing completed tasks

use serde_json::{json, Value};
use tracing::info;

use crate::client::{path_segment, GoogleClient};
use crate::GoogleError;

const TASKS_API_BASE: &str = "https://tasks.googleapis.com/tasks/v1";

/// Google Tasks API client
pub struct TasksApi {
    client: GoogleClient,
    base_url: String,
}

crate::google_api_wrapper!(TasksApi, TASKS_API_BASE);

/// Parameters for `tasks.list`
#[derive(Debug, Default)]
pub struct TaskQuery {
    pub limit: usize,
    pub completed_max: Option<String>,
    pub completed_min: Option<String>,
    pub due_max: Option<String>,
    pub due_min: Option<String>,
    pub show_assigned: Option<bool>,
    pub show_completed: Option<bool>,
    pub show_deleted: Option<bool>,
    pub show_hidden: Option<bool>,
    pub updated_min: Option<String>,
}

/// Target position for `tasks.move`
#[derive(Debug, Default)]
pub struct MoveTarget {
    pub destination_tasklist: Option<String>,
    pub parent: Option<String>,
    pub previous: Option<String>,
}

impl TaskQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        let strings = [
            ("completedMax", &self.completed_max),
            ("completedMin", &self.completed_min),
            ("dueMax", &self.due_max),
            ("dueMin", &self.due_min),
            ("updatedMin", &self.updated_min),
        ];
        let flags = [
            ("showAssigned", self.show_assigned),
            ("showCompleted", self.show_completed),
            ("showDeleted", self.show_deleted),
            ("showHidden", self.show_hidden),
        ];

        strings
            .into_iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k, v.clone())))
            .chain(flags.into_iter().filter_map(|(k, v)| v.map(|v| (k, v.to_string()))))
            .collect()
    }
}

impl TasksApi {
    fn tasklist_url(&self, tasklist_id: &str) -> String {
        self.url(&format!("users/@me/lists/{}", path_segment(tasklist_id)))
    }

    fn tasks_url(&self, tasklist_id: &str, rest: &str) -> String {
        self.url(&format!("lists/{}/{}", path_segment(tasklist_id), rest))
    }

    fn task_url(&self, tasklist_id: &str, task_id: &str) -> String {
        self.tasks_url(tasklist_id, &format!("tasks/{}", path_segment(task_id)))
    }

    pub async fn list_tasklists(&self, limit: usize) -> Result<Vec<Value>, GoogleError> {
        info!("Listing tasklists");
        self.client
            .get_paginated(&self.url("users/@me/lists"), &[], "items", limit)
            .await
    }

    pub async fn insert_tasklist(&self, title: &str) -> Result<Value, GoogleError> {
        info!("Creating tasklist");
        self.client
            .post(&self.url("users/@me/lists"), &[], &json!({"title": title}))
            .await
    }

    pub async fn get_tasklist(&self, tasklist_id: &str) -> Result<Value, GoogleError> {
        self.client.get(&self.tasklist_url(tasklist_id), &[]).await
    }

    pub async fn patch_tasklist(&self, tasklist_id: &str, title: &str) -> Result<Value, GoogleError> {
        info!("Renaming tasklist {}", tasklist_id);
        self.client
            .patch(&self.tasklist_url(tasklist_id), &[], &json!({"title": title}))
            .await
    }

    pub async fn delete_tasklist(&self, tasklist_id: &str) -> Result<(), GoogleError> {
        info!("Deleting tasklist {}", tasklist_id);
        self.client.delete(&self.tasklist_url(tasklist_id), &[]).await?;
        Ok(())
    }

    /// Hide all completed tasks from the list
    pub async fn clear_tasklist(&self, tasklist_id: &str) -> Result<(), GoogleError> {
        info!("Clearing completed tasks from {}", tasklist_id);
        self.client
            .post(&self.tasks_url(tasklist_id, "clear"), &[], &json!({}))
            .await?;
        Ok(())
    }

    pub async fn list_tasks(&self, tasklist_id: &str, query: &TaskQuery) -> Result<Vec<Value>, GoogleError> {
        info!("Listing tasks in {}", tasklist_id);
        self.client
            .get_paginated(&self.tasks_url(tasklist_id, "tasks"), &query.params(), "items", query.limit)
            .await
    }

    pub async fn insert_task(&self, tasklist_id: &str, body: &Value) -> Result<Value, GoogleError> {
        info!("Creating task in {}", tasklist_id);
        self.client.post(&self.tasks_url(tasklist_id, "tasks"), &[], body).await
    }

    pub async fn get_task(&self, tasklist_id: &str, task_id: &str) -> Result<Value, GoogleError> {
        self.client.get(&self.task_url(tasklist_id, task_id), &[]).await
    }

    pub async fn patch_task(&self, tasklist_id: &str, task_id: &str, body: &Value) -> Result<Value, GoogleError> {
        info!("Updating task {}", task_id);
        self.client.patch(&self.task_url(tasklist_id, task_id), &[], body).await
    }

    pub async fn move_task(&self, tasklist_id: &str, task_id: &str, target: &MoveTarget) -> Result<Value, GoogleError> {
        let mut params = Vec::new();
        if let Some(ref dest) = target.destination_tasklist {
            params.push(("destinationTasklist", dest.clone()));
        }
        if let Some(ref parent) = target.parent {
            params.push(("parent", parent.clone()));
        }
        if let Some(ref previous) = target.previous {
            params.push(("previous", previous.clone()));
        }

        info!("Moving task {}", task_id);
        let url = format!("{}/move", self.task_url(tasklist_id, task_id));
        self.client.post(&url, &params, &json!({})).await
    }

    pub async fn delete_task(&self, tasklist_id: &str, task_id: &str) -> Result<(), GoogleError> {
        info!("Deleting task {}", task_id);
        self.client.delete(&self.task_url(tasklist_id, task_id), &[]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use mockito::Matcher;
    use std::sync::Arc;

    fn api(server: &mockito::Server) -> TasksApi {
        let client = GoogleClient::new(Arc::new(StaticToken::new("t"))).unwrap();
        TasksApi::with_base_url(client, server.url())
    }

    #[test]
    fn test_task_query_params_skip_unset() {
        let query = TaskQuery {
            limit: 20,
            due_min: Some("2025-01-01T00:00:00Z".to_string()),
            show_completed: Some(true),
            show_hidden: Some(true),
            ..Default::default()
        };
        assert_eq!(
            query.params(),
            vec![
                ("dueMin", "2025-01-01T00:00:00Z".to_string()),
                ("showCompleted", "true".to_string()),
                ("showHidden", "true".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_list_tasklists_paths() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/users/@me/lists")
            .match_query(Matcher::UrlEncoded("maxResults".into(), "5".into()))
            .with_status(200)
            .with_body(r#"{"items": [{"id": "L1", "title": "Inbox"}]}"#)
            .create_async()
            .await;

        let lists = api(&server).list_tasklists(5).await.unwrap();
        assert_eq!(lists[0]["title"], "Inbox");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_move_task_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/lists/L1/tasks/T1/move")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("parent".into(), "P".into()),
                Matcher::UrlEncoded("destinationTasklist".into(), "L2".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"id": "T1", "parent": "P"}"#)
            .create_async()
            .await;

        let moved = api(&server)
            .move_task(
                "L1",
                "T1",
                &MoveTarget {
                    destination_tasklist: Some("L2".to_string()),
                    parent: Some("P".to_string()),
                    previous: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(moved["parent"], "P");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_clear_and_delete() {
        let mut server = mockito::Server::new_async().await;
        let clear = server.mock("POST", "/lists/L1/clear").with_status(204).create_async().await;
        let delete = server.mock("DELETE", "/lists/L1/tasks/T1").with_status(204).create_async().await;

        let api = api(&server);
        api.clear_tasklist("L1").await.unwrap();
        api.delete_task("L1", "T1").await.unwrap();
        clear.assert_async().await;
        delete.assert_async().await;
    }
}
