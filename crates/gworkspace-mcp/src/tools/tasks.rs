//! Google Tasks tools

use serde::Deserialize;
use serde_json::{json, Map, Value};

use gworkspace_google::tasks::{MoveTarget, TaskQuery};
use gworkspace_google::validate::is_rfc3339;
use gworkspace_google::TasksApi;
use gworkspace_protocol::{McpTool, ToolAnnotations};

use super::{invalid, not_found, parse_args, require, ToolFailure, ToolResult};

const TASK_STATUSES: &[&str] = &["needsAction", "completed"];
const MAX_TITLE_CHARS: usize = 1024;
const MAX_NOTES_CHARS: usize = 8192;
const DEFAULT_TASKLIST_LIMIT: u32 = 5;
const DEFAULT_TASK_LIMIT: u32 = 20;

fn object(properties: Value, required: &[&str]) -> Value {
    json!({"type": "object", "properties": properties, "required": required})
}

pub fn tools() -> Vec<McpTool> {
    let id = json!({"type": "string"});
    let timestamp = json!({"type": "string", "description": "RFC 3339 timestamp"});
    vec![
        McpTool::new(
            "list_tasklists",
            "List the user's tasklists.",
            object(
                json!({"max_results": {"type": "integer", "minimum": 1, "maximum": 1000, "default": DEFAULT_TASKLIST_LIMIT}}),
                &[],
            ),
            ToolAnnotations::read_only(),
        ),
        McpTool::new(
            "create_tasklist",
            "Create a tasklist.",
            object(json!({"title": {"type": "string", "maxLength": MAX_TITLE_CHARS}}), &["title"]),
            ToolAnnotations::mutating(),
        ),
        McpTool::new(
            "get_tasklist",
            "Fetch a tasklist.",
            object(json!({"tasklist_id": id}), &["tasklist_id"]),
            ToolAnnotations::read_only(),
        ),
        McpTool::new(
            "update_tasklist",
            "Rename a tasklist.",
            object(
                json!({"tasklist_id": id, "new_title": {"type": "string", "maxLength": MAX_TITLE_CHARS}}),
                &["tasklist_id", "new_title"],
            ),
            ToolAnnotations::mutating(),
        ),
        McpTool::new(
            "delete_tasklist",
            "Delete a tasklist and every task in it.",
            object(json!({"tasklist_id": id}), &["tasklist_id"]),
            ToolAnnotations::destructive(),
        ),
        McpTool::new(
            "clear_tasklist",
            "Remove all completed tasks from a tasklist.",
            object(json!({"tasklist_id": id}), &["tasklist_id"]),
            ToolAnnotations::destructive(),
        ),
        McpTool::new(
            "list_tasks",
            "List tasks in a tasklist, filtered by due, completion and update times. Completed tasks are only shown when show_completed is set.",
            object(
                json!({
                    "tasklist_id": id,
                    "completed_max": timestamp,
                    "completed_min": timestamp,
                    "due_max": timestamp,
                    "due_min": timestamp,
                    "max_results": {"type": "integer", "minimum": 1, "maximum": 100, "default": DEFAULT_TASK_LIMIT},
                    "show_assigned": {"type": "boolean"},
                    "show_completed": {"type": "boolean"},
                    "show_deleted": {"type": "boolean"},
                    "show_hidden": {"type": "boolean"},
                    "updated_min": timestamp
                }),
                &["tasklist_id"],
            ),
            ToolAnnotations::read_only(),
        ),
        McpTool::new(
            "create_task",
            "Create a task in a tasklist.",
            object(
                json!({
                    "tasklist_id": id,
                    "title": {"type": "string", "maxLength": MAX_TITLE_CHARS},
                    "notes": {"type": "string", "maxLength": MAX_NOTES_CHARS},
                    "due": timestamp,
                    "status": {"type": "string", "enum": TASK_STATUSES}
                }),
                &["tasklist_id", "title"],
            ),
            ToolAnnotations::mutating(),
        ),
        McpTool::new(
            "get_task",
            "Fetch a task.",
            object(json!({"tasklist_id": id, "task_id": id}), &["tasklist_id", "task_id"]),
            ToolAnnotations::read_only(),
        ),
        McpTool::new(
            "update_task",
            "Patch a task's title, notes, due date or status.",
            object(
                json!({
                    "tasklist_id": id,
                    "task_id": id,
                    "title": {"type": "string", "maxLength": MAX_TITLE_CHARS},
                    "notes": {"type": "string", "maxLength": MAX_NOTES_CHARS},
                    "due": timestamp,
                    "status": {"type": "string", "enum": TASK_STATUSES}
                }),
                &["tasklist_id", "task_id"],
            ),
            ToolAnnotations::mutating(),
        ),
        McpTool::new(
            "move_task",
            "Move a task under a parent, after a sibling, or into another tasklist.",
            object(
                json!({
                    "tasklist_id": id,
                    "task_id": id,
                    "destination_tasklist_id": id,
                    "parent_task_id": id,
                    "previous_task_id": id
                }),
                &["tasklist_id", "task_id"],
            ),
            ToolAnnotations::mutating(),
        ),
        McpTool::new(
            "delete_task",
            "Delete a task.",
            object(json!({"tasklist_id": id, "task_id": id}), &["tasklist_id", "task_id"]),
            ToolAnnotations::destructive(),
        ),
    ]
}

pub async fn call(api: &TasksApi, name: &str, arguments: Value) -> ToolResult {
    match name {
        "list_tasklists" => list_tasklists(api, parse_args(arguments)?).await,
        "create_tasklist" => create_tasklist(api, parse_args(arguments)?).await,
        "get_tasklist" => get_tasklist(api, parse_args(arguments)?).await,
        "update_tasklist" => update_tasklist(api, parse_args(arguments)?).await,
        "delete_tasklist" => delete_tasklist(api, parse_args(arguments)?).await,
        "clear_tasklist" => clear_tasklist(api, parse_args(arguments)?).await,
        "list_tasks" => list_tasks(api, parse_args(arguments)?).await,
        "create_task" => create_task(api, parse_args(arguments)?).await,
        "get_task" => get_task(api, parse_args(arguments)?).await,
        "update_task" => update_task(api, parse_args(arguments)?).await,
        "move_task" => move_task(api, parse_args(arguments)?).await,
        "delete_task" => delete_task(api, parse_args(arguments)?).await,
        other => Err(invalid(format!("unknown tasks tool: {}", other))),
    }
}

/// Tasklist resource in the shape returned to the host
fn tasklist_summary(tasklist: &Value, fallback_id: &str) -> Value {
    let field = |name: &str| tasklist.get(name).and_then(Value::as_str).unwrap_or_default();
    let id = tasklist.get("id").and_then(Value::as_str).unwrap_or(fallback_id);
    json!({
        "etag": field("etag"),
        "tasklist_id": id,
        "title": field("title"),
        "updated": field("updated"),
        "self_link": field("selfLink"),
    })
}

fn check_title(title: &str, empty_message: &str, too_long_message: &str) -> Result<(), ToolFailure> {
    require(title, empty_message)?;
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(invalid(too_long_message));
    }
    Ok(())
}

fn check_timestamp(value: Option<&str>, field: &str) -> Result<(), ToolFailure> {
    match value {
        Some(v) if !is_rfc3339(v) => Err(invalid(format!(
            "Invalid {} format: '{}'. Expected RFC3339 format (e.g., 2023-10-01T12:00:00Z).",
            field, v
        ))),
        _ => Ok(()),
    }
}

fn check_notes(notes: Option<&str>) -> Result<(), ToolFailure> {
    match notes {
        Some(n) if n.chars().count() > MAX_NOTES_CHARS => Err(invalid("Task notes exceed 8192 characters.")),
        _ => Ok(()),
    }
}

fn check_status(status: Option<&str>) -> Result<(), ToolFailure> {
    match status {
        Some(s) if !TASK_STATUSES.contains(&s) => Err(invalid(format!(
            "Invalid status value: `{}`. Must be 'needsAction' or 'completed'.",
            s
        ))),
        _ => Ok(()),
    }
}

#[derive(Debug, Deserialize)]
struct ListTasklistsArgs {
    max_results: Option<u32>,
}

async fn list_tasklists(api: &TasksApi, args: ListTasklistsArgs) -> ToolResult {
    let max_results = args.max_results.unwrap_or(DEFAULT_TASKLIST_LIMIT);
    if !(1..=1000).contains(&max_results) {
        return Err(invalid(format!(
            "Invalid max_results value: {}. Must be between 1 and 1000.",
            max_results
        )));
    }

    let items = api.list_tasklists(max_results as usize).await?;
    if items.is_empty() {
        return Ok(not_found("No tasklists found in the user's Google Tasks account."));
    }
    let tasklists: Vec<Value> = items.iter().map(|t| tasklist_summary(t, "")).collect();
    Ok(json!({"status": "success", "tasklists": tasklists}))
}

#[derive(Debug, Deserialize)]
struct CreateTasklistArgs {
    title: String,
}

async fn create_tasklist(api: &TasksApi, args: CreateTasklistArgs) -> ToolResult {
    check_title(
        &args.title,
        "Tasklist title cannot be empty.",
        "Title exceeds maximum length of 1024 characters.",
    )?;
    let created = api.insert_tasklist(args.title.trim()).await?;
    Ok(json!({"status": "success", "tasklist": tasklist_summary(&created, "")}))
}

#[derive(Debug, Deserialize)]
struct TasklistArgs {
    tasklist_id: String,
}

async fn get_tasklist(api: &TasksApi, args: TasklistArgs) -> ToolResult {
    require(&args.tasklist_id, "Tasklist ID cannot be empty.")?;
    let tasklist_id = args.tasklist_id.trim();
    let tasklist = api.get_tasklist(tasklist_id).await?;
    if tasklist.as_object().map_or(true, Map::is_empty) {
        return Ok(not_found(format!("No tasklist found with ID: {}", tasklist_id)));
    }
    Ok(json!({"status": "success", "tasklist": tasklist_summary(&tasklist, tasklist_id)}))
}

#[derive(Debug, Deserialize)]
struct UpdateTasklistArgs {
    tasklist_id: String,
    new_title: String,
}

async fn update_tasklist(api: &TasksApi, args: UpdateTasklistArgs) -> ToolResult {
    require(&args.tasklist_id, "Tasklist ID cannot be empty.")?;
    check_title(
        &args.new_title,
        "New tasklist title cannot be empty.",
        "Title exceeds maximum length of 1024 characters.",
    )?;
    let tasklist_id = args.tasklist_id.trim();
    let updated = api.patch_tasklist(tasklist_id, args.new_title.trim()).await?;
    Ok(json!({"status": "success", "tasklist": tasklist_summary(&updated, tasklist_id)}))
}

async fn delete_tasklist(api: &TasksApi, args: TasklistArgs) -> ToolResult {
    require(&args.tasklist_id, "Tasklist ID cannot be empty.")?;
    let tasklist_id = args.tasklist_id.trim();
    api.delete_tasklist(tasklist_id).await?;
    Ok(json!({
        "status": "success",
        "message": format!("Tasklist with ID `{}` deleted successfully.", tasklist_id),
    }))
}

async fn clear_tasklist(api: &TasksApi, args: TasklistArgs) -> ToolResult {
    require(&args.tasklist_id, "Tasklist ID cannot be empty.")?;
    let tasklist_id = args.tasklist_id.trim();
    api.clear_tasklist(tasklist_id).await?;
    Ok(json!({
        "status": "success",
        "message": format!("Completed tasks cleared from tasklist `{}`.", tasklist_id),
    }))
}

#[derive(Debug, Deserialize)]
struct ListTasksArgs {
    tasklist_id: String,
    completed_max: Option<String>,
    completed_min: Option<String>,
    due_max: Option<String>,
    due_min: Option<String>,
    max_results: Option<u32>,
    show_assigned: Option<bool>,
    show_completed: Option<bool>,
    show_deleted: Option<bool>,
    show_hidden: Option<bool>,
    updated_min: Option<String>,
}

async fn list_tasks(api: &TasksApi, args: ListTasksArgs) -> ToolResult {
    require(&args.tasklist_id, "Tasklist ID cannot be empty.")?;
    check_timestamp(args.completed_max.as_deref(), "completed_max")?;
    check_timestamp(args.completed_min.as_deref(), "completed_min")?;
    check_timestamp(args.due_max.as_deref(), "due_max")?;
    check_timestamp(args.due_min.as_deref(), "due_min")?;
    check_timestamp(args.updated_min.as_deref(), "updated_min")?;
    let max_results = args.max_results.unwrap_or(DEFAULT_TASK_LIMIT);
    if !(1..=100).contains(&max_results) {
        return Err(invalid("max_results must be between 1 and 100"));
    }

    // Completed tasks are hidden unless show_hidden is also set.
    let show_hidden = if args.show_completed == Some(true) {
        Some(true)
    } else {
        args.show_hidden
    };

    let query = TaskQuery {
        limit: max_results as usize,
        completed_max: args.completed_max,
        completed_min: args.completed_min,
        due_max: args.due_max,
        due_min: args.due_min,
        show_assigned: args.show_assigned,
        show_completed: args.show_completed,
        show_deleted: args.show_deleted,
        show_hidden,
        updated_min: args.updated_min,
    };

    let tasklist_id = args.tasklist_id.trim();
    let tasks = api.list_tasks(tasklist_id, &query).await?;
    if tasks.is_empty() {
        return Ok(not_found(format!("No tasks found in tasklist {}", tasklist_id)));
    }
    Ok(json!({"status": "success", "tasks": tasks}))
}

#[derive(Debug, Deserialize)]
struct CreateTaskArgs {
    tasklist_id: String,
    title: String,
    notes: Option<String>,
    due: Option<String>,
    status: Option<String>,
}

async fn create_task(api: &TasksApi, args: CreateTaskArgs) -> ToolResult {
    require(&args.tasklist_id, "Tasklist ID cannot be empty.")?;
    check_title(&args.title, "Task title cannot be empty.", "Task title exceeds 1024 characters.")?;
    check_notes(args.notes.as_deref())?;
    check_timestamp(args.due.as_deref(), "due")?;
    check_status(args.status.as_deref())?;

    let mut body = json!({
        "title": args.title,
        "status": args.status.as_deref().unwrap_or("needsAction"),
    });
    if let Some(notes) = args.notes {
        body["notes"] = json!(notes);
    }
    if let Some(due) = args.due {
        body["due"] = json!(due);
    }

    let task = api.insert_task(args.tasklist_id.trim(), &body).await?;
    if task.get("id").is_none() {
        return Err(invalid("Failed to create task."));
    }
    Ok(json!({"status": "success", "task": task}))
}

#[derive(Debug, Deserialize)]
struct TaskArgs {
    tasklist_id: String,
    task_id: String,
}

impl TaskArgs {
    fn ids(&self) -> Result<(&str, &str), ToolFailure> {
        require(&self.tasklist_id, "Tasklist ID cannot be empty.")?;
        require(&self.task_id, "Task ID cannot be empty.")?;
        Ok((self.tasklist_id.trim(), self.task_id.trim()))
    }
}

async fn get_task(api: &TasksApi, args: TaskArgs) -> ToolResult {
    let (tasklist_id, task_id) = args.ids()?;
    let task = api.get_task(tasklist_id, task_id).await?;
    if task.as_object().map_or(true, Map::is_empty) {
        return Err(invalid(format!("Task {} not found in tasklist {}.", task_id, tasklist_id)));
    }
    Ok(json!({"status": "success", "task": task}))
}

#[derive(Debug, Deserialize)]
struct UpdateTaskArgs {
    #[serde(flatten)]
    ids: TaskArgs,
    title: Option<String>,
    notes: Option<String>,
    due: Option<String>,
    status: Option<String>,
}

async fn update_task(api: &TasksApi, args: UpdateTaskArgs) -> ToolResult {
    let (tasklist_id, task_id) = args.ids.ids()?;
    if args.title.as_deref().map_or(false, |t| t.chars().count() > MAX_TITLE_CHARS) {
        return Err(invalid("Task title exceeds 1024 characters."));
    }
    check_notes(args.notes.as_deref())?;
    check_timestamp(args.due.as_deref(), "due")?;
    check_status(args.status.as_deref())?;

    let mut body = Map::new();
    for (key, value) in [
        ("title", &args.title),
        ("notes", &args.notes),
        ("due", &args.due),
        ("status", &args.status),
    ] {
        if let Some(value) = value {
            body.insert(key.to_string(), json!(value));
        }
    }
    if body.is_empty() {
        return Err(invalid(format!("No fields provided to update in task `{}`.", task_id)));
    }

    let task = api.patch_task(tasklist_id, task_id, &Value::Object(body)).await?;
    if task.get("id").is_none() {
        return Err(invalid(format!("Failed to update task {} in {}.", task_id, tasklist_id)));
    }
    Ok(json!({"status": "success", "task": task}))
}

#[derive(Debug, Deserialize)]
struct MoveTaskArgs {
    #[serde(flatten)]
    ids: TaskArgs,
    destination_tasklist_id: Option<String>,
    parent_task_id: Option<String>,
    previous_task_id: Option<String>,
}

/// Move targets are optional but may not be blank when given.
fn move_field(value: Option<String>, label: &str) -> Result<Option<String>, ToolFailure> {
    match value {
        Some(v) if v.trim().is_empty() => Err(invalid(format!("Invalid value provided for {}: '{}'", label, v))),
        Some(v) => Ok(Some(v.trim().to_string())),
        None => Ok(None),
    }
}

async fn move_task(api: &TasksApi, args: MoveTaskArgs) -> ToolResult {
    let (tasklist_id, task_id) = args.ids.ids()?;
    let target = MoveTarget {
        destination_tasklist: move_field(args.destination_tasklist_id, "destination_tasklist")?,
        parent: move_field(args.parent_task_id, "parent")?,
        previous: move_field(args.previous_task_id, "previous")?,
    };

    let task = api.move_task(tasklist_id, task_id, &target).await?;
    if task.as_object().map_or(true, Map::is_empty) {
        return Err(invalid(format!("Failed to move task {} in tasklist {}", task_id, tasklist_id)));
    }
    Ok(json!({"status": "success", "task": task}))
}

async fn delete_task(api: &TasksApi, args: TaskArgs) -> ToolResult {
    let (tasklist_id, task_id) = args.ids()?;
    api.delete_task(tasklist_id, task_id).await?;
    Ok(json!({
        "status": "success",
        "message": format!("Task {} deleted from tasklist `{}`", task_id, tasklist_id),
    }))
}
