//! Google Drive tools

use serde::Deserialize;
use serde_json::{json, Map, Value};

use gworkspace_google::drive::{FileListQuery, NewFile};
use gworkspace_google::DriveApi;
use gworkspace_protocol::{McpTool, ToolAnnotations};

use super::{invalid, non_blank, parse_args, require, ToolResult};

const SORT_KEYS: &[&str] = &[
    "folder",
    "modifiedByMeTime",
    "viewedByMeTime",
    "name",
    "starred",
    "name_natural",
    "quotaBytesUsed",
    "recency",
    "sharedWithMeTime",
    "createdTime",
    "modifiedTime",
];

const SPACES: &[&str] = &["drive", "appDataFolder", "photos"];

const METADATA_FIELDS: &[&str] = &[
    "hasThumbnail", "mimeType", "modifiedByMeTime", "thumbnailLink", "thumbnailVersion",
    "explicitlyTrashed", "teamDriveId", "isAppAuthorized", "writersCanShare", "ownedByMe",
    "viewedByMeTime", "id", "shortcutDetails", "size", "videoMediaMetadata", "lastModifyingUser",
    "sharingUser", "folderColorRgb", "appProperties", "version", "parents", "capabilities",
    "trashedTime", "webViewLink", "sharedWithMeTime", "exportLinks", "shared",
    "copyRequiresWriterPermission", "fullFileExtension", "originalFilename", "description",
    "modifiedTime", "viewersCanCopyContent", "viewedByMe", "modifiedByMe", "owners", "createdTime",
    "quotaBytesUsed", "starred", "properties", "md5Checksum", "iconLink", "imageMediaMetadata",
    "kind", "name", "webContentLink", "trashingUser", "driveId", "spaces", "permissionIds",
    "trashed", "contentHints", "fileExtension", "hasAugmentedPermissions", "permissions",
    "headRevisionId",
];

/// Body fields `update_file_metadata` forwards to Drive
const UPDATABLE_FIELDS: &[&str] = &["name", "description", "starred"];

const WORKSPACE_PREFIX: &str = "application/vnd.google-apps.";

pub fn tools() -> Vec<McpTool> {
    vec![
        McpTool::new(
            "list_files",
            "Search the user's Google Drive for files whose name contains a keyword, with optional sorting, space filtering and shared drive selection.",
            json!({
                "type": "object",
                "properties": {
                    "max_results": {"type": "integer", "minimum": 1, "maximum": 15, "description": "Max number of files to retrieve"},
                    "keyword": {"type": "string", "description": "Keyword to search for in file names"},
                    "order_by": {"type": "array", "items": {"type": "string"}, "description": "Sort keys, each optionally followed by ' desc' (e.g. 'modifiedTime desc')"},
                    "spaces": {"type": "array", "items": {"type": "string", "enum": SPACES}, "description": "Drive spaces to search"},
                    "drive_id": {"type": "string", "description": "ID of the shared drive to search"}
                },
                "required": ["max_results"]
            }),
            ToolAnnotations::read_only(),
        ),
        McpTool::new(
            "create_file",
            "Create a new file or folder in the user's Google Drive, optionally inside a given folder.",
            json!({
                "type": "object",
                "properties": {
                    "file_name": {"type": "string", "description": "Name of the file to create"},
                    "target_mime_type": {"type": "string", "description": "MIME type, e.g. 'application/vnd.google-apps.document' or 'application/vnd.google-apps.folder'"},
                    "folder_id": {"type": "string", "description": "ID of the parent folder"},
                    "enforce_single_parent": {"type": "boolean"},
                    "use_content_as_indexable_text": {"type": "boolean"}
                },
                "required": ["file_name", "target_mime_type"]
            }),
            ToolAnnotations::mutating(),
        ),
        McpTool::new(
            "fetch_file_content",
            "Fetch the text content of a Drive file. Google Docs and Slides are exported as plain text, Sheets as CSV, other files are downloaded as-is.",
            json!({
                "type": "object",
                "properties": {
                    "file_id": {"type": "string", "description": "ID of the file to fetch"}
                },
                "required": ["file_id"]
            }),
            ToolAnnotations::read_only(),
        ),
        McpTool::new(
            "fetch_workspace_file_content",
            "Export a Google Workspace file (Doc, Sheet, Slides) to the given MIME type and return its content.",
            json!({
                "type": "object",
                "properties": {
                    "file_id": {"type": "string", "description": "ID of the Google Workspace file"},
                    "export_mime_type": {"type": "string", "description": "Export MIME type, e.g. 'text/plain', 'text/csv'"}
                },
                "required": ["file_id", "export_mime_type"]
            }),
            ToolAnnotations::read_only(),
        ),
        McpTool::new(
            "update_file_metadata",
            "Update a file's name, description or starred flag, and move it between folders with addParents/removeParents.",
            json!({
                "type": "object",
                "properties": {
                    "file_id": {"type": "string", "description": "ID of the file to update"},
                    "metadata": {
                        "type": "object",
                        "description": "Fields to update: name, description, starred, addParents (list of folder IDs), removeParents (list of folder IDs)"
                    }
                },
                "required": ["file_id", "metadata"]
            }),
            ToolAnnotations::mutating(),
        ),
        McpTool::new(
            "delete_file",
            "Permanently delete a file from the user's Drive, skipping the trash. Use with caution.",
            json!({
                "type": "object",
                "properties": {
                    "file_id": {"type": "string", "description": "ID of the file to delete"}
                },
                "required": ["file_id"]
            }),
            ToolAnnotations::destructive(),
        ),
        McpTool::new(
            "fetch_file_metadata",
            "Retrieve selected metadata fields for a file, or all metadata when no fields are given.",
            json!({
                "type": "object",
                "properties": {
                    "file_id": {"type": "string", "description": "ID of the file"},
                    "metadata": {"type": "array", "items": {"type": "string", "enum": METADATA_FIELDS}, "description": "Metadata fields to fetch"}
                },
                "required": ["file_id"]
            }),
            ToolAnnotations::read_only(),
        ),
        McpTool::new(
            "copy_file",
            "Create a copy of an existing file, optionally renaming it and placing it in another folder.",
            json!({
                "type": "object",
                "properties": {
                    "file_id": {"type": "string", "description": "ID of the file to copy"},
                    "new_name": {"type": "string"},
                    "parent_folder_id": {"type": "string"},
                    "enforce_single_parent": {"type": "boolean"}
                },
                "required": ["file_id"]
            }),
            ToolAnnotations::mutating(),
        ),
        McpTool::new(
            "empty_trash",
            "Permanently delete every item in the user's Drive trash. This cannot be undone.",
            json!({"type": "object", "properties": {}}),
            ToolAnnotations::destructive(),
        ),
    ]
}

pub async fn call(api: &DriveApi, name: &str, arguments: Value) -> ToolResult {
    match name {
        "list_files" => list_files(api, parse_args(arguments)?).await,
        "create_file" => create_file(api, parse_args(arguments)?).await,
        "fetch_file_content" => fetch_file_content(api, parse_args(arguments)?).await,
        "fetch_workspace_file_content" => fetch_workspace_file_content(api, parse_args(arguments)?).await,
        "update_file_metadata" => update_file_metadata(api, parse_args(arguments)?).await,
        "delete_file" => delete_file(api, parse_args(arguments)?).await,
        "fetch_file_metadata" => fetch_file_metadata(api, parse_args(arguments)?).await,
        "copy_file" => copy_file(api, parse_args(arguments)?).await,
        "empty_trash" => {
            api.empty_trash().await?;
            Ok(json!({"status": "success", "message": "trash emptied successfully"}))
        }
        other => Err(invalid(format!("unknown drive tool: {}", other))),
    }
}

#[derive(Debug, Deserialize)]
struct ListFilesArgs {
    max_results: u32,
    keyword: Option<String>,
    order_by: Option<Vec<String>>,
    spaces: Option<Vec<String>>,
    drive_id: Option<String>,
}

async fn list_files(api: &DriveApi, args: ListFilesArgs) -> ToolResult {
    if !(1..=15).contains(&args.max_results) {
        return Err(invalid("max_results must be between 1 and 15"));
    }

    let order_by = args.order_by.unwrap_or_default();
    let invalid_keys: Vec<&String> = order_by
        .iter()
        .filter(|k| !is_valid_sort_key(k))
        .collect();
    if !invalid_keys.is_empty() {
        return Err(invalid(format!("invalid sort keys: {:?}", invalid_keys)));
    }

    let spaces = args.spaces.unwrap_or_default();
    let invalid_spaces: Vec<&String> = spaces.iter().filter(|s| !SPACES.contains(&s.as_str())).collect();
    if !invalid_spaces.is_empty() {
        return Err(invalid(format!("invalid spaces: {:?}", invalid_spaces)));
    }

    let q = non_blank(args.keyword.as_deref())
        .map(|keyword| format!("name contains \"{}\"", keyword.replace('"', "\\\"")));

    let files = api
        .list_files(&FileListQuery {
            page_size: args.max_results,
            q,
            order_by,
            spaces,
            drive_id: non_blank(args.drive_id.as_deref()),
        })
        .await?;

    if files.is_empty() {
        return Ok(json!({"status": "not_found", "files": "no files found"}));
    }
    Ok(json!({"status": "success", "files": files}))
}

fn is_valid_sort_key(key: &str) -> bool {
    let mut parts = key.split_whitespace();
    let field_ok = parts.next().is_some_and(|field| SORT_KEYS.contains(&field));
    let modifier_ok = match parts.next() {
        None => true,
        Some(modifier) => modifier == "desc" && parts.next().is_none(),
    };
    field_ok && modifier_ok
}

#[derive(Debug, Deserialize)]
struct CreateFileArgs {
    file_name: String,
    target_mime_type: String,
    folder_id: Option<String>,
    enforce_single_parent: Option<bool>,
    use_content_as_indexable_text: Option<bool>,
}

async fn create_file(api: &DriveApi, args: CreateFileArgs) -> ToolResult {
    require(&args.file_name, "file name cannot be empty")?;
    require(&args.target_mime_type, "file MIME type is required")?;

    let created = api
        .create_file(&NewFile {
            name: args.file_name.trim().to_string(),
            mime_type: args.target_mime_type.trim().to_string(),
            parent: non_blank(args.folder_id.as_deref()),
            enforce_single_parent: args.enforce_single_parent,
            use_content_as_indexable_text: args.use_content_as_indexable_text,
        })
        .await?;

    Ok(json!({
        "status": "success",
        "id": created.get("id"),
        "name": created.get("name"),
        "webViewLink": created.get("webViewLink"),
    }))
}

#[derive(Debug, Deserialize)]
struct FileIdArgs {
    file_id: String,
}

/// Export format used for each Google Workspace document kind
fn export_mime_for(mime_type: &str) -> Option<&'static str> {
    let kind = mime_type.strip_prefix(WORKSPACE_PREFIX)?;
    match kind {
        "document" => Some("text/plain"),
        "spreadsheet" => Some("text/csv"),
        "presentation" => Some("text/plain"),
        _ => None,
    }
}

/// Decode downloaded bytes as UTF-8, dropping a BOM and replacing invalid sequences
fn decode_content(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.strip_prefix('\u{feff}').unwrap_or(&text).to_string()
}

fn capability(metadata: &Value, name: &str) -> Option<bool> {
    metadata.get("capabilities").and_then(|c| c.get(name)).and_then(Value::as_bool)
}

async fn fetch_file_content(api: &DriveApi, args: FileIdArgs) -> ToolResult {
    require(&args.file_id, "file id is required")?;
    let file_id = args.file_id.trim();

    let metadata = api.get_file(file_id, "mimeType, name, capabilities").await?;

    let can_download = capability(&metadata, "canDownload").unwrap_or(true);
    let can_read_drive = capability(&metadata, "canReadDrive").unwrap_or(true);
    if !can_download && !can_read_drive {
        return Err(invalid("you do not have permission to export this file"));
    }

    let mime_type = metadata.get("mimeType").and_then(Value::as_str).unwrap_or_default();
    let bytes = if mime_type.starts_with(WORKSPACE_PREFIX) {
        let Some(export_mime) = export_mime_for(mime_type) else {
            return Err(invalid(format!("unsupported workspace file type: {}", mime_type)));
        };
        api.export_file(file_id, export_mime).await?
    } else {
        api.download_file(file_id).await?
    };

    Ok(json!({"status": "success", "content": decode_content(&bytes)}))
}

#[derive(Debug, Deserialize)]
struct ExportArgs {
    file_id: String,
    export_mime_type: String,
}

async fn fetch_workspace_file_content(api: &DriveApi, args: ExportArgs) -> ToolResult {
    if args.file_id.trim().is_empty() || args.export_mime_type.trim().is_empty() {
        return Err(invalid("file id and export mime type are required"));
    }
    let file_id = args.file_id.trim();

    let metadata = api.get_file(file_id, "mimeType, name, capabilities").await?;
    if !capability(&metadata, "canDownload").unwrap_or(false) {
        return Err(invalid("you do not have permission to export this file"));
    }

    let bytes = api.export_file(file_id, args.export_mime_type.trim()).await?;
    Ok(json!({"status": "success", "content": decode_content(&bytes)}))
}

#[derive(Debug, Deserialize)]
struct UpdateMetadataArgs {
    file_id: String,
    metadata: Map<String, Value>,
}

/// Folder ids given either as a list or a comma-separated string
fn id_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

fn joined_or_null(ids: &[String]) -> Value {
    if ids.is_empty() {
        Value::Null
    } else {
        json!(ids.join(", "))
    }
}

async fn update_file_metadata(api: &DriveApi, args: UpdateMetadataArgs) -> ToolResult {
    require(&args.file_id, "file id is required")?;
    if args.metadata.is_empty() {
        return Err(invalid("metadata is required"));
    }

    let add_parents = id_list(args.metadata.get("addParents"));
    let remove_parents = id_list(args.metadata.get("removeParents"));
    let body: Map<String, Value> = args
        .metadata
        .iter()
        .filter(|(k, _)| UPDATABLE_FIELDS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let mut updated = api
        .update_file(args.file_id.trim(), &Value::Object(body), &add_parents, &remove_parents)
        .await?;

    if let Some(obj) = updated.as_object_mut() {
        obj.insert("addedParents".to_string(), joined_or_null(&add_parents));
        obj.insert("removedParents".to_string(), joined_or_null(&remove_parents));
    }

    Ok(json!({"status": "success", "updated_file_metadata": updated}))
}

async fn delete_file(api: &DriveApi, args: FileIdArgs) -> ToolResult {
    require(&args.file_id, "file id is required")?;
    api.delete_file(args.file_id.trim()).await?;
    Ok(json!({
        "status": "success",
        "message": format!("file with id '{}' deleted successfully", args.file_id.trim()),
    }))
}

#[derive(Debug, Deserialize)]
struct FetchMetadataArgs {
    file_id: String,
    metadata: Option<Vec<String>>,
}

async fn fetch_file_metadata(api: &DriveApi, args: FetchMetadataArgs) -> ToolResult {
    require(&args.file_id, "file id is required")?;

    let fields = args.metadata.unwrap_or_default();
    let unknown: Vec<&String> = fields
        .iter()
        .filter(|f| !METADATA_FIELDS.contains(&f.as_str()))
        .collect();
    if !unknown.is_empty() {
        return Err(invalid(format!("invalid metadata fields: {:?}", unknown)));
    }

    let fields = if fields.is_empty() { "*".to_string() } else { fields.join(", ") };
    let metadata = api.get_file(args.file_id.trim(), &fields).await?;

    if metadata.as_object().is_some_and(|m| m.is_empty()) {
        return Ok(json!({"status": "success", "message": "No metadata found for the specified fields"}));
    }
    Ok(json!({"status": "success", "file_metadata": metadata}))
}

#[derive(Debug, Deserialize)]
struct CopyFileArgs {
    file_id: String,
    new_name: Option<String>,
    parent_folder_id: Option<String>,
    enforce_single_parent: Option<bool>,
}

async fn copy_file(api: &DriveApi, args: CopyFileArgs) -> ToolResult {
    require(&args.file_id, "File ID is required")?;

    let mut body = Map::new();
    if let Some(name) = non_blank(args.new_name.as_deref()) {
        body.insert("name".to_string(), json!(name));
    }
    if let Some(parent) = non_blank(args.parent_folder_id.as_deref()) {
        body.insert("parents".to_string(), json!([parent]));
    }

    let copied = api
        .copy_file(args.file_id.trim(), &Value::Object(body), args.enforce_single_parent)
        .await?;

    Ok(json!({
        "status": "success",
        "id": copied.get("id"),
        "name": copied.get("name"),
        "webViewLink": copied.get("webViewLink"),
    }))
}
