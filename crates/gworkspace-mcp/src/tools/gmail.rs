//! Gmail tools

use serde::Deserialize;
use serde_json::{json, Map, Value};

use gworkspace_google::gmail::ListQuery;
use gworkspace_google::mime::{self, OutgoingMessage, NO_SUBJECT};
use gworkspace_google::validate::{is_valid_email, is_valid_user_id, partition_addresses, split_addresses};
use gworkspace_google::GmailApi;
use gworkspace_protocol::{McpTool, ToolAnnotations};

use super::{invalid, non_blank, not_found, parse_args, require, ToolFailure, ToolResult};

const MESSAGE_FORMATS: &[&str] = &["full", "metadata", "minimal", "raw"];
const DEFAULT_LIST_LIMIT: usize = 100;
const SKIPPED_WARNING: &str = "Skipped some email addresses that were invalid.";

fn user_id_property() -> Value {
    json!({"type": "string", "default": "me", "description": "User's email address, or 'me' for the authenticated user"})
}

fn schema(properties: Value, required: &[&str]) -> Value {
    let mut properties = properties;
    if let Some(map) = properties.as_object_mut() {
        map.insert("user_id".to_string(), user_id_property());
    }
    json!({"type": "object", "properties": properties, "required": required})
}

pub fn tools() -> Vec<McpTool> {
    vec![
        McpTool::new(
            "get_profile",
            "Get the Gmail profile of the user: email address, total messages and threads, and latest history id.",
            schema(json!({}), &[]),
            ToolAnnotations::read_only(),
        ),
        McpTool::new(
            "list_messages",
            "List message ids in the user's mailbox, optionally filtered with a Gmail search query (e.g. 'from:someone@example.com is:unread').",
            schema(
                json!({
                    "query": {"type": "string", "description": "Gmail search query"},
                    "max_results": {"type": "integer", "minimum": 1, "maximum": 100},
                    "include_spam_and_trash": {"type": "boolean"}
                }),
                &[],
            ),
            ToolAnnotations::read_only(),
        ),
        McpTool::new(
            "get_email_message",
            "Retrieve a single message by id.",
            schema(
                json!({
                    "message_id": {"type": "string"},
                    "format": {"type": "string", "enum": MESSAGE_FORMATS}
                }),
                &["message_id"],
            ),
            ToolAnnotations::read_only(),
        ),
        McpTool::new(
            "send_message",
            "Compose and send a plain-text email. Set thread_id and in_reply_to to send a reply within an existing conversation.",
            schema(
                json!({
                    "to": {"type": "string", "description": "Comma-separated recipient addresses"},
                    "body": {"type": "string"},
                    "subject": {"type": "string"},
                    "cc": {"type": "string", "description": "Comma-separated CC addresses"},
                    "bcc": {"type": "string", "description": "Comma-separated BCC addresses"},
                    "thread_id": {"type": "string"},
                    "in_reply_to": {"type": "string", "description": "Message-ID header of the message being replied to"}
                }),
                &["to", "body"],
            ),
            ToolAnnotations::mutating(),
        ),
        McpTool::new(
            "modify_message_label",
            "Add or remove label ids on a message (e.g. STARRED, UNREAD, IMPORTANT).",
            schema(
                json!({
                    "message_id": {"type": "string"},
                    "add_labels": {"type": "array", "items": {"type": "string"}},
                    "remove_labels": {"type": "array", "items": {"type": "string"}}
                }),
                &["message_id"],
            ),
            ToolAnnotations::mutating(),
        ),
        McpTool::new(
            "trash_message",
            "Move a message to the trash.",
            schema(json!({"message_id": {"type": "string"}}), &["message_id"]),
            ToolAnnotations::destructive(),
        ),
        McpTool::new(
            "untrash_message",
            "Restore a message from the trash.",
            schema(json!({"message_id": {"type": "string"}}), &["message_id"]),
            ToolAnnotations::mutating(),
        ),
        McpTool::new(
            "list_drafts",
            "List drafts with their message id, thread id, labels and snippet.",
            schema(
                json!({
                    "query": {"type": "string"},
                    "max_results": {"type": "integer", "minimum": 1, "maximum": 100},
                    "include_spam_and_trash": {"type": "boolean"}
                }),
                &[],
            ),
            ToolAnnotations::read_only(),
        ),
        McpTool::new(
            "get_draft",
            "Retrieve the message stored in a draft.",
            schema(
                json!({
                    "draft_id": {"type": "string"},
                    "format": {"type": "string", "enum": MESSAGE_FORMATS}
                }),
                &["draft_id"],
            ),
            ToolAnnotations::read_only(),
        ),
        McpTool::new(
            "send_draft",
            "Send an existing draft to its To, Cc and Bcc recipients.",
            schema(json!({"draft_id": {"type": "string"}}), &["draft_id"]),
            ToolAnnotations::mutating(),
        ),
        McpTool::new(
            "create_draft",
            "Save a new plain-text draft. Invalid recipient addresses are skipped and reported.",
            schema(
                json!({
                    "to": {"type": "string"},
                    "body": {"type": "string"},
                    "subject": {"type": "string"},
                    "cc": {"type": "string"},
                    "bcc": {"type": "string"},
                    "thread_id": {"type": "string"},
                    "in_reply_to": {"type": "string"}
                }),
                &[],
            ),
            ToolAnnotations::mutating(),
        ),
        McpTool::new(
            "update_draft",
            "Edit an existing draft: replace body or subject and add or remove To, Cc and Bcc recipients.",
            schema(
                json!({
                    "draft_id": {"type": "string"},
                    "body": {"type": "string"},
                    "subject": {"type": "string"},
                    "add_to": {"type": "array", "items": {"type": "string"}},
                    "remove_to": {"type": "array", "items": {"type": "string"}},
                    "add_cc": {"type": "array", "items": {"type": "string"}},
                    "remove_cc": {"type": "array", "items": {"type": "string"}},
                    "add_bcc": {"type": "array", "items": {"type": "string"}},
                    "remove_bcc": {"type": "array", "items": {"type": "string"}}
                }),
                &["draft_id"],
            ),
            ToolAnnotations::mutating(),
        ),
        McpTool::new(
            "delete_draft",
            "Permanently delete a draft.",
            schema(json!({"draft_id": {"type": "string"}}), &["draft_id"]),
            ToolAnnotations::destructive(),
        ),
    ]
}

pub async fn call(api: &GmailApi, name: &str, arguments: Value) -> ToolResult {
    match name {
        "get_profile" => get_profile(api, parse_args(arguments)?).await,
        "list_messages" => list_messages(api, parse_args(arguments)?).await,
        "get_email_message" => get_email_message(api, parse_args(arguments)?).await,
        "send_message" => send_message(api, parse_args(arguments)?).await,
        "modify_message_label" => modify_message_label(api, parse_args(arguments)?).await,
        "trash_message" => trash_message(api, parse_args(arguments)?, true).await,
        "untrash_message" => trash_message(api, parse_args(arguments)?, false).await,
        "list_drafts" => list_drafts(api, parse_args(arguments)?).await,
        "get_draft" => get_draft(api, parse_args(arguments)?).await,
        "send_draft" => send_draft(api, parse_args(arguments)?).await,
        "create_draft" => create_draft(api, parse_args(arguments)?).await,
        "update_draft" => update_draft(api, parse_args(arguments)?).await,
        "delete_draft" => delete_draft(api, parse_args(arguments)?).await,
        other => Err(invalid(format!("unknown gmail tool: {}", other))),
    }
}

fn default_user() -> String {
    "me".to_string()
}

fn check_user(user_id: &str) -> Result<(), ToolFailure> {
    require(user_id, "User Id cannot be empty.")?;
    if !is_valid_user_id(user_id) {
        return Err(invalid("Invalid User Id format."));
    }
    Ok(())
}

fn check_format(format: Option<&str>) -> Result<(), ToolFailure> {
    match format {
        Some(f) if !MESSAGE_FORMATS.contains(&f) => Err(invalid(format!(
            "Invalid format '{}'. Must be one of: full, metadata, minimal, raw.",
            f
        ))),
        _ => Ok(()),
    }
}

fn check_single_line(value: Option<&str>, field: &str) -> Result<(), ToolFailure> {
    if value.is_some_and(|v| v.contains(['\r', '\n'])) {
        return Err(invalid(format!("{} cannot contain line breaks.", field)));
    }
    Ok(())
}

fn list_limit(max_results: Option<u32>) -> Result<usize, ToolFailure> {
    match max_results {
        None => Ok(DEFAULT_LIST_LIMIT),
        Some(n) if (1..=100).contains(&n) => Ok(n as usize),
        Some(_) => Err(invalid("max_results must be between 1 and 100")),
    }
}

/// `From` is only set when sending on behalf of an explicit address
fn sender(user_id: &str) -> Option<String> {
    (user_id != "me").then(|| user_id.to_string())
}

#[derive(Debug, Deserialize)]
struct UserArgs {
    #[serde(default = "default_user")]
    user_id: String,
}

async fn get_profile(api: &GmailApi, args: UserArgs) -> ToolResult {
    check_user(&args.user_id)?;
    let profile = api.get_profile(&args.user_id).await?;
    if profile.as_object().map_or(true, Map::is_empty) {
        return Ok(not_found(format!("Profile not found for user with id: `{}`.", args.user_id)));
    }
    Ok(json!({"status": "success", "profile_information": profile}))
}

#[derive(Debug, Deserialize)]
struct ListArgs {
    #[serde(default = "default_user")]
    user_id: String,
    query: Option<String>,
    max_results: Option<u32>,
    include_spam_and_trash: Option<bool>,
}

impl ListArgs {
    fn query(&self) -> Result<ListQuery, ToolFailure> {
        Ok(ListQuery {
            q: non_blank(self.query.as_deref()),
            limit: list_limit(self.max_results)?,
            include_spam_trash: self.include_spam_and_trash,
        })
    }
}

async fn list_messages(api: &GmailApi, args: ListArgs) -> ToolResult {
    check_user(&args.user_id)?;
    let messages = api.list_messages(&args.user_id, &args.query()?).await?;
    if messages.is_empty() {
        return Ok(not_found(format!("No messages found for user with id: '{}'", args.user_id)));
    }
    Ok(json!({"status": "success", "email_messages": messages}))
}

#[derive(Debug, Deserialize)]
struct MessageArgs {
    message_id: String,
    #[serde(default = "default_user")]
    user_id: String,
    format: Option<String>,
}

async fn get_email_message(api: &GmailApi, args: MessageArgs) -> ToolResult {
    check_user(&args.user_id)?;
    require(&args.message_id, "Message Id cannot be empty.")?;
    check_format(args.format.as_deref())?;

    let message = api
        .get_message(&args.user_id, args.message_id.trim(), args.format.as_deref())
        .await?;
    if message.as_object().map_or(true, Map::is_empty) {
        return Ok(not_found(format!(
            "Message id: {} not found for user {}",
            args.message_id, args.user_id
        )));
    }
    Ok(json!({"status": "success", "email_message": message}))
}

#[derive(Debug, Deserialize)]
struct SendArgs {
    #[serde(default = "default_user")]
    user_id: String,
    to: String,
    body: String,
    subject: Option<String>,
    cc: Option<String>,
    bcc: Option<String>,
    thread_id: Option<String>,
    in_reply_to: Option<String>,
}

/// Valid and invalid addresses from an optional comma-separated list
fn optional_recipients(raw: Option<&str>) -> (Vec<String>, Vec<String>) {
    match raw {
        Some(raw) => partition_addresses(split_addresses(raw)),
        None => (Vec::new(), Vec::new()),
    }
}

async fn send_message(api: &GmailApi, args: SendArgs) -> ToolResult {
    check_user(&args.user_id)?;
    require(&args.to, "Recipient email id cannot be empty.")?;

    let to = split_addresses(&args.to);
    if let Some(bad) = to.iter().find(|a| !is_valid_email(a)) {
        return Err(invalid(format!("Invalid recipient email address: {}.", bad)));
    }
    if to.is_empty() {
        return Err(invalid("Recipient email id cannot be empty."));
    }

    check_single_line(args.subject.as_deref(), "Subject")?;
    check_single_line(args.in_reply_to.as_deref(), "In-Reply-To")?;

    let (cc, invalid_cc) = optional_recipients(args.cc.as_deref());
    let (bcc, invalid_bcc) = optional_recipients(args.bcc.as_deref());
    let in_reply_to = non_blank(args.in_reply_to.as_deref());

    let message = OutgoingMessage {
        from: sender(&args.user_id),
        to,
        cc,
        bcc,
        subject: mime::reply_subject(args.subject.as_deref(), in_reply_to.is_some()),
        in_reply_to,
        body: args.body,
    };

    let thread_id = non_blank(args.thread_id.as_deref());
    let sent = api
        .send_message(&args.user_id, &message.to_raw(), thread_id.as_deref())
        .await?;

    let mut result = json!({
        "status": "success",
        "message": format!("Email delivered with id: {}", id_of(&sent)),
    });
    if !invalid_cc.is_empty() {
        result["warning"] = json!(SKIPPED_WARNING);
        result["invalid_emails_in_cc"] = json!(invalid_cc);
    }
    if !invalid_bcc.is_empty() {
        result["warning"] = json!(SKIPPED_WARNING);
        result["invalid_emails_in_bcc"] = json!(invalid_bcc);
    }
    Ok(result)
}

fn id_of(value: &Value) -> &str {
    value.get("id").and_then(Value::as_str).unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct ModifyArgs {
    message_id: String,
    #[serde(default = "default_user")]
    user_id: String,
    #[serde(default)]
    add_labels: Vec<String>,
    #[serde(default)]
    remove_labels: Vec<String>,
}

async fn modify_message_label(api: &GmailApi, args: ModifyArgs) -> ToolResult {
    check_user(&args.user_id)?;
    require(&args.message_id, "Message Id cannot be empty.")?;
    if args.add_labels.is_empty() && args.remove_labels.is_empty() {
        return Err(invalid("No labels provided to modify."));
    }

    api.modify_labels(&args.user_id, args.message_id.trim(), &args.add_labels, &args.remove_labels)
        .await?;
    Ok(json!({
        "status": "success",
        "message": format!("Labels modified for message id: {}.", args.message_id),
    }))
}

async fn trash_message(api: &GmailApi, args: MessageArgs, trash: bool) -> ToolResult {
    check_user(&args.user_id)?;
    require(&args.message_id, "Message Id cannot be empty.")?;

    let message_id = args.message_id.trim();
    let verb = if trash {
        api.trash_message(&args.user_id, message_id).await?;
        "trashed"
    } else {
        api.untrash_message(&args.user_id, message_id).await?;
        "recovered"
    };
    Ok(json!({
        "status": "success",
        "message": format!("Message with id: {} has been {}.", message_id, verb),
    }))
}

/// Flatten a draft list entry for the host
fn draft_summary(draft: &Value) -> Value {
    let message = draft.get("message");
    let field = |name: &str| message.and_then(|m| m.get(name)).cloned().unwrap_or(Value::Null);
    json!({
        "draft_id": draft.get("id"),
        "message_id": field("id"),
        "thread_id": field("threadId"),
        "label_ids": message.and_then(|m| m.get("labelIds")).cloned().unwrap_or_else(|| json!([])),
        "snippet": field("snippet"),
    })
}

async fn list_drafts(api: &GmailApi, args: ListArgs) -> ToolResult {
    check_user(&args.user_id)?;
    let drafts = api.list_drafts(&args.user_id, &args.query()?).await?;
    if drafts.is_empty() {
        return Ok(not_found("No drafts found in user's gmail account."));
    }
    let drafts: Vec<Value> = drafts.iter().map(draft_summary).collect();
    Ok(json!({"status": "success", "drafts": drafts}))
}

#[derive(Debug, Deserialize)]
struct DraftArgs {
    draft_id: String,
    #[serde(default = "default_user")]
    user_id: String,
    format: Option<String>,
}

fn check_draft(args: &DraftArgs) -> Result<(), ToolFailure> {
    check_user(&args.user_id)?;
    require(&args.draft_id, "Draft Id cannot be empty.")
}

async fn get_draft(api: &GmailApi, args: DraftArgs) -> ToolResult {
    check_draft(&args)?;
    check_format(args.format.as_deref())?;

    let draft = api
        .get_draft(&args.user_id, args.draft_id.trim(), args.format.as_deref())
        .await?;
    if draft.as_object().map_or(true, Map::is_empty) {
        return Ok(not_found(format!(
            "Draft id: {} not found for user {}",
            args.draft_id, args.user_id
        )));
    }
    match draft.get("message") {
        Some(message) => Ok(json!({"status": "success", "draft": message})),
        None => Err(invalid(format!(
            "Draft {} does not contain a message object.",
            args.draft_id
        ))),
    }
}

async fn send_draft(api: &GmailApi, args: DraftArgs) -> ToolResult {
    check_draft(&args)?;
    let sent = api.send_draft(&args.user_id, args.draft_id.trim()).await?;
    Ok(json!({
        "status": "success",
        "message": format!("Email delivered with id: {}.", id_of(&sent)),
    }))
}

async fn delete_draft(api: &GmailApi, args: DraftArgs) -> ToolResult {
    check_draft(&args)?;
    api.delete_draft(&args.user_id, args.draft_id.trim()).await?;
    Ok(json!({
        "status": "success",
        "message": format!("Draft with id: {} has been deleted permanently.", args.draft_id),
    }))
}

#[derive(Debug, Deserialize)]
struct CreateDraftArgs {
    #[serde(default = "default_user")]
    user_id: String,
    to: Option<String>,
    body: Option<String>,
    subject: Option<String>,
    cc: Option<String>,
    bcc: Option<String>,
    thread_id: Option<String>,
    in_reply_to: Option<String>,
}

/// Record skipped addresses under `invalid_emails_in_<field>` plus a combined `warnings` text
fn report_skipped(result: &mut Value, skipped: [(&str, Vec<String>); 3]) {
    let mut warnings = Vec::new();
    for (field, addresses) in skipped {
        if addresses.is_empty() {
            continue;
        }
        warnings.push(format!("Skipped invalid email addresses in {}.", field));
        result[format!("invalid_emails_in_{}", field)] = json!(addresses);
    }
    if !warnings.is_empty() {
        result["warnings"] = json!(warnings.join(" "));
    }
}

async fn create_draft(api: &GmailApi, args: CreateDraftArgs) -> ToolResult {
    check_user(&args.user_id)?;

    let (to, invalid_to) = optional_recipients(args.to.as_deref());
    check_single_line(args.subject.as_deref(), "Subject")?;
    check_single_line(args.in_reply_to.as_deref(), "In-Reply-To")?;

    let (cc, invalid_cc) = optional_recipients(args.cc.as_deref());
    let (bcc, invalid_bcc) = optional_recipients(args.bcc.as_deref());
    let in_reply_to = non_blank(args.in_reply_to.as_deref());

    let message = OutgoingMessage {
        from: sender(&args.user_id),
        to,
        cc,
        bcc,
        subject: mime::reply_subject(args.subject.as_deref(), in_reply_to.is_some()),
        in_reply_to,
        body: args.body.unwrap_or_default(),
    };

    let thread_id = non_blank(args.thread_id.as_deref());
    let draft = api
        .create_draft(&args.user_id, &message.to_raw(), thread_id.as_deref())
        .await?;

    let mut result = json!({
        "status": "success",
        "message": format!("Draft created with id: {}", id_of(&draft)),
    });
    report_skipped(&mut result, [("to", invalid_to), ("cc", invalid_cc), ("bcc", invalid_bcc)]);
    Ok(result)
}

#[derive(Debug, Deserialize)]
struct UpdateDraftArgs {
    #[serde(default = "default_user")]
    user_id: String,
    draft_id: String,
    body: Option<String>,
    subject: Option<String>,
    #[serde(default)]
    add_to: Vec<String>,
    #[serde(default)]
    remove_to: Vec<String>,
    #[serde(default)]
    add_cc: Vec<String>,
    #[serde(default)]
    remove_cc: Vec<String>,
    #[serde(default)]
    add_bcc: Vec<String>,
    #[serde(default)]
    remove_bcc: Vec<String>,
}

/// Recipients already present in a header, kept verbatim
fn header_addresses(payload: &Value, name: &str) -> Vec<String> {
    mime::header(payload, name)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Apply additions and removals, de-duplicating while keeping first-seen order.
/// Returns the new list and the rejected (invalid) addresses.
fn edit_recipients(existing: Vec<String>, add: &[String], remove: &[String]) -> (Vec<String>, Vec<String>) {
    let mut rejected = Vec::new();
    let mut list = existing;

    for address in add {
        if is_valid_email(address.trim()) {
            list.push(address.trim().to_string());
        } else {
            rejected.push(address.clone());
        }
    }
    for address in remove {
        if is_valid_email(address.trim()) {
            if let Some(pos) = list.iter().position(|a| a == address.trim()) {
                list.remove(pos);
            }
        } else {
            rejected.push(address.clone());
        }
    }

    let mut seen = std::collections::HashSet::new();
    list.retain(|a| seen.insert(a.clone()));
    (list, rejected)
}

async fn update_draft(api: &GmailApi, args: UpdateDraftArgs) -> ToolResult {
    check_user(&args.user_id)?;
    require(&args.draft_id, "Draft Id cannot be empty.")?;
    check_single_line(args.subject.as_deref(), "Subject")?;
    let draft_id = args.draft_id.trim();

    let existing = api.get_draft(&args.user_id, draft_id, None).await?;
    let payload = existing
        .get("message")
        .and_then(|m| m.get("payload"))
        .cloned()
        .unwrap_or_else(|| json!({}));

    let body = match args.body {
        Some(body) => body,
        None => mime::plain_text_body(&payload).unwrap_or_default(),
    };

    let subject = match args.subject.as_deref() {
        None | Some("") => mime::header(&payload, "Subject").unwrap_or(NO_SUBJECT).to_string(),
        given => mime::reply_subject(given, false),
    };

    let (to, invalid_to) = edit_recipients(header_addresses(&payload, "To"), &args.add_to, &args.remove_to);
    let (cc, invalid_cc) = edit_recipients(header_addresses(&payload, "Cc"), &args.add_cc, &args.remove_cc);
    let (bcc, invalid_bcc) = edit_recipients(header_addresses(&payload, "Bcc"), &args.add_bcc, &args.remove_bcc);

    let message = OutgoingMessage {
        from: None,
        to,
        cc,
        bcc,
        subject,
        in_reply_to: None,
        body,
    };

    let updated = api.update_draft(&args.user_id, draft_id, &message.to_raw()).await?;

    let mut result = json!({
        "status": "success",
        "message": format!("Draft updated successfully with id: {}.", id_of(&updated)),
    });
    report_skipped(&mut result, [("to", invalid_to), ("cc", invalid_cc), ("bcc", invalid_bcc)]);
    Ok(result)
}
