//! Google Drive API v3 wrapper
//!
//! Provides typed access to Drive operations:
//! - List files with name search, sorting, spaces and shared drives
//! - Create, copy, update and delete files
//! - Download file content or export Google Workspace files
//! - Empty trash

use serde_json::{json, Value};
use tracing::info;

use crate::client::{path_segment, GoogleClient};
use crate::GoogleError;

const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

const LIST_FIELDS: &str = "nextPageToken, files(id, name, webViewLink)";
const CREATE_FIELDS: &str = "id, name, webViewLink, mimeType";
const COPY_FIELDS: &str = "id, name, webViewLink";
const UPDATE_FIELDS: &str = "id, name, mimeType, webViewLink, description, starred, modifiedTime, parents";

/// Google Drive API client
pub struct DriveApi {
    client: GoogleClient,
    base_url: String,
}

crate::google_api_wrapper!(DriveApi, DRIVE_API_BASE);

/// Parameters for `files.list`
#[derive(Debug, Default)]
pub struct FileListQuery {
    pub page_size: u32,
    /// Drive search expression (`q`)
    pub q: Option<String>,
    pub order_by: Vec<String>,
    pub spaces: Vec<String>,
    pub drive_id: Option<String>,
}

/// Metadata for a new file
#[derive(Debug, Default)]
pub struct NewFile {
    pub name: String,
    pub mime_type: String,
    pub parent: Option<String>,
    pub enforce_single_parent: Option<bool>,
    pub use_content_as_indexable_text: Option<bool>,
}

impl DriveApi {
    /// List one page of files, returning the `files` array
    pub async fn list_files(&self, query: &FileListQuery) -> Result<Vec<Value>, GoogleError> {
        let mut params = vec![
            ("pageSize", query.page_size.to_string()),
            ("fields", LIST_FIELDS.to_string()),
        ];
        if let Some(ref q) = query.q {
            params.push(("q", q.clone()));
        }
        if !query.order_by.is_empty() {
            params.push(("orderBy", query.order_by.join(", ")));
        }
        if !query.spaces.is_empty() {
            params.push(("spaces", query.spaces.join(", ")));
        }
        // driveId is only honoured together with corpora=drive
        if let Some(ref drive_id) = query.drive_id {
            params.push(("driveId", drive_id.clone()));
            params.push(("corpora", "drive".to_string()));
            params.push(("includeItemsFromAllDrives", "true".to_string()));
            params.push(("supportsAllDrives", "true".to_string()));
        }

        info!("Listing Drive files (page size {})", query.page_size);
        let response = self.client.get(&self.url("files"), &params).await?;
        Ok(response
            .get("files")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default())
    }

    pub async fn create_file(&self, file: &NewFile) -> Result<Value, GoogleError> {
        let mut body = json!({
            "name": file.name,
            "mimeType": file.mime_type,
        });
        if let Some(ref parent) = file.parent {
            body["parents"] = json!([parent]);
        }

        let mut params = vec![("fields", CREATE_FIELDS.to_string())];
        if let Some(enforce) = file.enforce_single_parent {
            params.push(("enforceSingleParent", enforce.to_string()));
        }
        if let Some(indexable) = file.use_content_as_indexable_text {
            params.push(("useContentAsIndexableText", indexable.to_string()));
        }

        info!("Creating Drive file '{}'", file.name);
        self.client.post(&self.url("files"), &params, &body).await
    }

    /// Get file metadata restricted to `fields` (`*` for everything)
    pub async fn get_file(&self, file_id: &str, fields: &str) -> Result<Value, GoogleError> {
        let url = self.url(&format!("files/{}", path_segment(file_id)));
        let params = [
            ("fields", fields.to_string()),
            ("supportsAllDrives", "true".to_string()),
        ];
        self.client.get(&url, &params).await
    }

    /// Export a Google Workspace file to `mime_type`
    pub async fn export_file(&self, file_id: &str, mime_type: &str) -> Result<Vec<u8>, GoogleError> {
        info!("Exporting Drive file {} as {}", file_id, mime_type);
        let url = self.url(&format!("files/{}/export", path_segment(file_id)));
        self.client.get_bytes(&url, &[("mimeType", mime_type.to_string())]).await
    }

    /// Download the raw content of a binary file
    pub async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, GoogleError> {
        info!("Downloading Drive file {}", file_id);
        let url = self.url(&format!("files/{}", path_segment(file_id)));
        let params = [
            ("alt", "media".to_string()),
            ("supportsAllDrives", "true".to_string()),
        ];
        self.client.get_bytes(&url, &params).await
    }

    pub async fn update_file(
        &self,
        file_id: &str,
        body: &Value,
        add_parents: &[String],
        remove_parents: &[String],
    ) -> Result<Value, GoogleError> {
        let mut params = vec![
            ("fields", UPDATE_FIELDS.to_string()),
            ("supportsAllDrives", "true".to_string()),
        ];
        if !add_parents.is_empty() {
            params.push(("addParents", add_parents.join(", ")));
        }
        if !remove_parents.is_empty() {
            params.push(("removeParents", remove_parents.join(", ")));
        }

        info!("Updating Drive file {}", file_id);
        let url = self.url(&format!("files/{}", path_segment(file_id)));
        self.client.patch(&url, &params, body).await
    }

    /// Permanently delete a file (bypasses trash)
    pub async fn delete_file(&self, file_id: &str) -> Result<(), GoogleError> {
        info!("Deleting Drive file {}", file_id);
        let url = self.url(&format!("files/{}", path_segment(file_id)));
        self.client
            .delete(&url, &[("supportsAllDrives", "true".to_string())])
            .await?;
        Ok(())
    }

    pub async fn copy_file(
        &self,
        file_id: &str,
        body: &Value,
        enforce_single_parent: Option<bool>,
    ) -> Result<Value, GoogleError> {
        let mut params = vec![("fields", COPY_FIELDS.to_string())];
        if let Some(enforce) = enforce_single_parent {
            params.push(("enforceSingleParent", enforce.to_string()));
        }

        info!("Copying Drive file {}", file_id);
        let url = self.url(&format!("files/{}/copy", path_segment(file_id)));
        self.client.post(&url, &params, body).await
    }

    pub async fn empty_trash(&self) -> Result<(), GoogleError> {
        info!("Emptying Drive trash");
        self.client.delete(&self.url("files/trash"), &[]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use mockito::Matcher;
    use std::sync::Arc;

    fn api(server: &mockito::Server) -> DriveApi {
        let client = GoogleClient::new(Arc::new(StaticToken::new("t"))).unwrap();
        DriveApi::with_base_url(client, server.url())
    }

    #[tokio::test]
    async fn test_list_files_shared_drive_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/files")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("pageSize".into(), "5".into()),
                Matcher::UrlEncoded("q".into(), "name contains \"plan\"".into()),
                Matcher::UrlEncoded("orderBy".into(), "modifiedTime desc, name".into()),
                Matcher::UrlEncoded("driveId".into(), "d1".into()),
                Matcher::UrlEncoded("corpora".into(), "drive".into()),
                Matcher::UrlEncoded("fields".into(), LIST_FIELDS.into()),
            ]))
            .with_status(200)
            .with_body(r#"{"files": [{"id": "f1", "name": "plan.txt", "webViewLink": "https://x"}]}"#)
            .create_async()
            .await;

        let files = api(&server)
            .list_files(&FileListQuery {
                page_size: 5,
                q: Some("name contains \"plan\"".to_string()),
                order_by: vec!["modifiedTime desc".to_string(), "name".to_string()],
                spaces: Vec::new(),
                drive_id: Some("d1".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(files.len(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_file_in_folder() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/files")
            .match_query(Matcher::UrlEncoded("enforceSingleParent".into(), "true".into()))
            .match_body(Matcher::Json(json!({
                "name": "Notes",
                "mimeType": "application/vnd.google-apps.document",
                "parents": ["folder1"]
            })))
            .with_status(200)
            .with_body(r#"{"id": "new", "name": "Notes"}"#)
            .create_async()
            .await;

        let created = api(&server)
            .create_file(&NewFile {
                name: "Notes".to_string(),
                mime_type: "application/vnd.google-apps.document".to_string(),
                parent: Some("folder1".to_string()),
                enforce_single_parent: Some(true),
                use_content_as_indexable_text: None,
            })
            .await
            .unwrap();
        assert_eq!(created["id"], "new");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_export_and_download() {
        let mut server = mockito::Server::new_async().await;
        let export = server
            .mock("GET", "/files/doc1/export")
            .match_query(Matcher::UrlEncoded("mimeType".into(), "text/plain".into()))
            .with_status(200)
            .with_body("hello")
            .create_async()
            .await;
        let download = server
            .mock("GET", "/files/bin1")
            .match_query(Matcher::UrlEncoded("alt".into(), "media".into()))
            .with_status(200)
            .with_body(vec![0xEF, 0xBB, 0xBF, b'h', b'i'])
            .create_async()
            .await;

        let api = api(&server);
        assert_eq!(api.export_file("doc1", "text/plain").await.unwrap(), b"hello");
        assert_eq!(api.download_file("bin1").await.unwrap(), vec![0xEF, 0xBB, 0xBF, b'h', b'i']);
        export.assert_async().await;
        download.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_file_joins_parents() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PATCH", "/files/f1")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("addParents".into(), "a, b".into()),
                Matcher::UrlEncoded("removeParents".into(), "c".into()),
                Matcher::UrlEncoded("supportsAllDrives".into(), "true".into()),
            ]))
            .match_body(Matcher::Json(json!({"name": "renamed"})))
            .with_status(200)
            .with_body(r#"{"id": "f1", "name": "renamed"}"#)
            .create_async()
            .await;

        api(&server)
            .update_file(
                "f1",
                &json!({"name": "renamed"}),
                &["a".to_string(), "b".to_string()],
                &["c".to_string()],
            )
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_and_empty_trash() {
        let mut server = mockito::Server::new_async().await;
        let delete = server
            .mock("DELETE", "/files/f1")
            .match_query(Matcher::UrlEncoded("supportsAllDrives".into(), "true".into()))
            .with_status(204)
            .create_async()
            .await;
        let trash = server
            .mock("DELETE", "/files/trash")
            .with_status(204)
            .create_async()
            .await;

        let api = api(&server);
        api.delete_file("f1").await.unwrap();
        api.empty_trash().await.unwrap();
        delete.assert_async().await;
        trash.assert_async().await;
    }
}
