use gworkspace_google::Service;
use gworkspace_protocol::{
    InitializeRequest, InitializeResponse, ServerCapabilities, ServerInfo, ToolsCapabilities, MCP_PROTOCOL_VERSION,
};
use tracing::info;

pub fn handle_initialize(service: Service, request: &InitializeRequest) -> InitializeResponse {
    info!(
        "Initialize from {} {} (protocol {})",
        request.client_info.name, request.client_info.version, request.protocol_version
    );
    InitializeResponse {
        protocol_version: MCP_PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities {
            tools: ToolsCapabilities { list_changed: false },
        },
        server_info: ServerInfo {
            name: server_name(service),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        instructions: instructions(service).to_string(),
    }
}

/// `gworkspace-<service>`; also the default host config entry name.
pub fn server_name(service: Service) -> String {
    format!("gworkspace-{}", service.name())
}

fn instructions(service: Service) -> &'static str {
    match service {
        Service::Drive => {
            "Google Drive tools for the signed-in user. Use list_files to find a file id by name, then \
             fetch_file_metadata or fetch_file_content (fetch_workspace_file_content for Docs, Sheets and \
             Slides, which are exported as text or CSV). Copies and new files land in My Drive unless a \
             parent folder id is given. delete_file and empty_trash are permanent: confirm with the user first."
        }
        Service::Gmail => {
            "Gmail tools for the signed-in user. user_id defaults to 'me'. list_messages accepts Gmail search \
             syntax (from:, to:, subject:, is:unread, newer_than:2d) and returns ids; call get_email_message for \
             content. To reply, pass the original thread_id and its Message-ID header as in_reply_to. Prefer \
             create_draft for anything the user has not explicitly approved to send. trash_message is reversible \
             with untrash_message; delete_draft is not."
        }
        Service::Calendar => {
            "Google Calendar tools for the signed-in user. Use 'primary' as the calendar id for the user's main \
             calendar. Times are RFC 3339 (2025-06-01T09:30:00+01:00) and time zones IANA names (Europe/Dublin). \
             To find free time, list_events with time_min, time_max, single_events=true and order_by=startTime. \
             send_updates defaults to 'none'; set 'all' only when the user wants attendees notified. \
             clear_primary_calendar deletes every event: confirm first."
        }
        Service::Tasks => {
            "Google Tasks tools for the signed-in user. Call list_tasklists to get a tasklist id before working \
             with tasks. Due dates are RFC 3339 timestamps; Google keeps only the date part. Mark a task done with \
             update_task status='completed'. clear_tasklist hides every completed task in the list."
        }
    }
}
