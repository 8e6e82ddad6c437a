//! Google Calendar tools

use serde::Deserialize;
use serde_json::{json, Map, Value};

use gworkspace_google::calendar_api::{CalendarListQuery, EventQuery};
use gworkspace_google::client::path_segment;
use gworkspace_google::validate::{is_rfc3339, is_valid_email, is_valid_timezone, start_before_end};
use gworkspace_google::CalendarApi;
use gworkspace_protocol::{McpTool, ToolAnnotations};

use super::{invalid, non_blank, not_found, parse_args, require, ToolFailure, ToolResult};

const ACCESS_ROLES: &[&str] = &["freeBusyReader", "owner", "reader", "writer"];
const EVENT_ORDER: &[&str] = &["startTime", "updateTime"];
const VISIBILITY: &[&str] = &["default", "public", "private", "confidential"];
const TRANSPARENCY: &[&str] = &["transparent", "opaque"];
const SEND_UPDATES: &[&str] = &["all", "externalOnly", "none"];

const DEFAULT_EVENT_LIMIT: usize = 250;
const CALENDAR_WEB_URL: &str = "https://calendar.google.com/calendar/u/0/r";

pub fn tools() -> Vec<McpTool> {
    let event_fields = json!({
        "summary": {"type": "string"},
        "description": {"type": "string"},
        "location": {"type": "string"},
        "start_time": {"type": "string", "description": "RFC 3339 timestamp, e.g. 2025-06-01T10:00:00+05:30"},
        "end_time": {"type": "string", "description": "RFC 3339 timestamp"},
        "time_zone": {"type": "string", "description": "IANA time zone, e.g. Asia/Kolkata"},
        "recurrence": {"type": "array", "items": {"type": "string"}, "description": "RFC 5545 RRULE/EXRULE/RDATE/EXDATE lines"},
        "visibility": {"type": "string", "enum": VISIBILITY},
        "transparency": {"type": "string", "enum": TRANSPARENCY},
        "guests_can_invite_others": {"type": "boolean"},
        "guests_can_see_other_guests": {"type": "boolean"},
        "send_updates": {"type": "string", "enum": SEND_UPDATES}
    });

    let mut create_props = event_fields.clone();
    let mut update_props = event_fields;
    if let (Some(create), Some(update)) = (create_props.as_object_mut(), update_props.as_object_mut()) {
        create.insert("calendar_id".into(), json!({"type": "string"}));
        create.insert("add_google_meet_link".into(), json!({"type": "boolean"}));
        create.insert(
            "attendees".into(),
            json!({"type": "array", "items": {"type": "string"}, "description": "Attendee email addresses"}),
        );
        update.insert("calendar_id".into(), json!({"type": "string"}));
        update.insert("event_id".into(), json!({"type": "string"}));
    }

    vec![
        McpTool::new(
            "list_calendars",
            "List the calendars on the user's calendar list, filtered by access role, deleted and hidden state.",
            json!({
                "type": "object",
                "properties": {
                    "max_results": {"type": "integer", "minimum": 1, "maximum": 250},
                    "min_access_role": {"type": "string", "enum": ACCESS_ROLES},
                    "show_deleted": {"type": "boolean"},
                    "show_hidden": {"type": "boolean"}
                },
                "required": ["max_results"]
            }),
            ToolAnnotations::read_only(),
        ),
        McpTool::new(
            "create_calendar",
            "Create a secondary calendar. The time zone defaults to UTC.",
            json!({
                "type": "object",
                "properties": {
                    "summary": {"type": "string"},
                    "description": {"type": "string"},
                    "time_zone": {"type": "string"},
                    "location": {"type": "string"}
                },
                "required": ["summary"]
            }),
            ToolAnnotations::mutating(),
        ),
        McpTool::new(
            "get_calendar",
            "Fetch a calendar's metadata (title, time zone, description, location).",
            calendar_id_schema(),
            ToolAnnotations::read_only(),
        ),
        McpTool::new(
            "update_calendar",
            "Patch a calendar's title, description, location or time zone. Pass an empty string to clear description or location.",
            json!({
                "type": "object",
                "properties": {
                    "calendar_id": {"type": "string"},
                    "summary": {"type": "string"},
                    "description": {"type": "string"},
                    "location": {"type": "string"},
                    "timezone": {"type": "string"}
                },
                "required": ["calendar_id"]
            }),
            ToolAnnotations::mutating(),
        ),
        McpTool::new(
            "delete_calendar",
            "Delete a secondary calendar. The primary calendar cannot be deleted.",
            calendar_id_schema(),
            ToolAnnotations::destructive(),
        ),
        McpTool::new(
            "list_events",
            "List events on a calendar, with free-text search, time window and ordering.",
            json!({
                "type": "object",
                "properties": {
                    "calendar_id": {"type": "string"},
                    "query": {"type": "string"},
                    "max_results": {"type": "integer", "minimum": 1, "maximum": 250},
                    "max_attendees": {"type": "integer", "minimum": 1, "maximum": 250},
                    "show_hidden_invitations": {"type": "boolean"},
                    "show_deleted": {"type": "boolean"},
                    "time_min": {"type": "string", "description": "RFC 3339 lower bound for event end time"},
                    "time_max": {"type": "string", "description": "RFC 3339 upper bound for event start time"},
                    "time_zone": {"type": "string"},
                    "updated_min": {"type": "string", "description": "RFC 3339 lower bound for last modification"},
                    "single_events": {"type": "boolean", "description": "Expand recurring events into instances"},
                    "order_by": {"type": "string", "enum": EVENT_ORDER}
                },
                "required": ["calendar_id"]
            }),
            ToolAnnotations::read_only(),
        ),
        McpTool::new(
            "get_event",
            "Fetch a single event.",
            json!({
                "type": "object",
                "properties": {
                    "calendar_id": {"type": "string"},
                    "event_id": {"type": "string"},
                    "max_attendees": {"type": "integer", "minimum": 1, "maximum": 250},
                    "time_zone": {"type": "string"}
                },
                "required": ["calendar_id", "event_id"]
            }),
            ToolAnnotations::read_only(),
        ),
        McpTool::new(
            "create_event",
            "Create an event with optional attendees, recurrence and Google Meet link.",
            json!({
                "type": "object",
                "properties": create_props,
                "required": ["calendar_id", "summary", "start_time", "end_time"]
            }),
            ToolAnnotations::mutating(),
        ),
        McpTool::new(
            "update_event",
            "Patch an event. start_time and end_time must be given together.",
            json!({
                "type": "object",
                "properties": update_props,
                "required": ["calendar_id", "event_id"]
            }),
            ToolAnnotations::mutating(),
        ),
        McpTool::new(
            "delete_event",
            "Delete an event, optionally notifying attendees.",
            json!({
                "type": "object",
                "properties": {
                    "calendar_id": {"type": "string"},
                    "event_id": {"type": "string"},
                    "send_updates": {"type": "string", "enum": SEND_UPDATES}
                },
                "required": ["calendar_id", "event_id"]
            }),
            ToolAnnotations::destructive(),
        ),
        McpTool::new(
            "clear_primary_calendar",
            "Delete every event on the primary calendar. Secondary calendars are refused.",
            calendar_id_schema(),
            ToolAnnotations::destructive(),
        ),
    ]
}

fn calendar_id_schema() -> Value {
    json!({
        "type": "object",
        "properties": {"calendar_id": {"type": "string", "description": "Calendar ID, or 'primary'"}},
        "required": ["calendar_id"]
    })
}

pub async fn call(api: &CalendarApi, name: &str, arguments: Value) -> ToolResult {
    match name {
        "list_calendars" => list_calendars(api, parse_args(arguments)?).await,
        "create_calendar" => create_calendar(api, parse_args(arguments)?).await,
        "get_calendar" => get_calendar(api, parse_args(arguments)?).await,
        "update_calendar" => update_calendar(api, parse_args(arguments)?).await,
        "delete_calendar" => delete_calendar(api, parse_args(arguments)?).await,
        "list_events" => list_events(api, parse_args(arguments)?).await,
        "get_event" => get_event(api, parse_args(arguments)?).await,
        "create_event" => create_event(api, parse_args(arguments)?).await,
        "update_event" => update_event(api, parse_args(arguments)?).await,
        "delete_event" => delete_event(api, parse_args(arguments)?).await,
        "clear_primary_calendar" => clear_primary_calendar(api, parse_args(arguments)?).await,
        other => Err(invalid(format!("unknown calendar tool: {}", other))),
    }
}

fn one_of(value: Option<&str>, allowed: &[&str], field: &str) -> Result<(), ToolFailure> {
    match value {
        Some(v) if !allowed.contains(&v) => Err(invalid(format!(
            "Invalid {}: '{}'. Must be one of: {}.",
            field,
            v,
            allowed.join(", ")
        ))),
        _ => Ok(()),
    }
}

fn in_range(value: Option<u32>, max: u32, field: &str) -> Result<(), ToolFailure> {
    match value {
        Some(n) if n < 1 || n > max => Err(invalid(format!("{} must be between 1 and {}", field, max))),
        _ => Ok(()),
    }
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

fn check_timezone(tz: &str) -> Result<(), ToolFailure> {
    if is_valid_timezone(tz) {
        Ok(())
    } else {
        Err(invalid(format!(
            "Invalid time zone: '{}'. Please provide a valid IANA time zone (e.g. Asia/Kolkata)",
            tz
        )))
    }
}

/// A zone the host asked for that Google would reject, dropped from the request.
fn dropped_zone_warning(time_zone: Option<&str>) -> Option<String> {
    time_zone.filter(|tz| !is_valid_timezone(tz)).map(|tz| {
        format!(
            "Passed invalid time zone: '{}'. Defaulted to calendar's configured timezone.",
            tz
        )
    })
}

/// Whether `calendar_id` names the user's primary calendar
async fn is_primary(api: &CalendarApi, calendar_id: &str) -> Result<bool, ToolFailure> {
    if calendar_id == "primary" {
        return Ok(true);
    }
    let entry = api.get_calendar_list_entry(calendar_id).await?;
    Ok(entry.get("primary").and_then(Value::as_bool).unwrap_or(false))
}

#[derive(Debug, Deserialize)]
struct CalendarIdArgs {
    calendar_id: String,
}

#[derive(Debug, Deserialize)]
struct ListCalendarsArgs {
    max_results: u32,
    min_access_role: Option<String>,
    show_deleted: Option<bool>,
    show_hidden: Option<bool>,
}

async fn list_calendars(api: &CalendarApi, args: ListCalendarsArgs) -> ToolResult {
    in_range(Some(args.max_results), 250, "max_results")?;
    if let Some(role) = args.min_access_role.as_deref() {
        if !ACCESS_ROLES.contains(&role) {
            return Err(invalid(format!("Invalid calendar access role: {}", role)));
        }
    }

    let query = CalendarListQuery {
        limit: args.max_results as usize,
        min_access_role: args.min_access_role,
        show_deleted: args.show_deleted,
        show_hidden: args.show_hidden,
    };
    let items = api.list_calendars(&query).await?;
    if items.is_empty() {
        return Ok(not_found("No calendars found for this Google account"));
    }

    let calendars: Vec<Value> = items
        .iter()
        .map(|c| {
            let flag = |name: &str| c.get(name).and_then(Value::as_bool).unwrap_or(false);
            json!({
                "calendar_id": c.get("id").and_then(Value::as_str).unwrap_or_default(),
                "summary": c.get("summary").and_then(Value::as_str).unwrap_or_default(),
                "primary": flag("primary"),
                "hidden": flag("hidden"),
                "deleted": flag("deleted"),
            })
        })
        .collect();
    Ok(json!({"status": "success", "calendars": calendars}))
}

#[derive(Debug, Deserialize)]
struct CreateCalendarArgs {
    summary: String,
    description: Option<String>,
    time_zone: Option<String>,
    location: Option<String>,
}

async fn create_calendar(api: &CalendarApi, args: CreateCalendarArgs) -> ToolResult {
    require(&args.summary, "Calendar summary cannot be empty.")?;
    let time_zone = match non_blank(args.time_zone.as_deref()) {
        Some(tz) => {
            check_timezone(&tz)?;
            tz
        }
        None => "UTC".to_string(),
    };

    let mut body = json!({"summary": args.summary.trim(), "timeZone": time_zone});
    if let Some(description) = non_blank(args.description.as_deref()) {
        body["description"] = json!(description);
    }
    if let Some(location) = non_blank(args.location.as_deref()) {
        body["location"] = json!(location);
    }

    let calendar = api.insert_calendar(&body).await?;
    let field = |name: &str| calendar.get(name).and_then(Value::as_str).unwrap_or("unavailable").to_string();
    let id = field("id");
    Ok(json!({
        "status": "success",
        "calendar_url": format!("{}?cid={}", CALENDAR_WEB_URL, path_segment(&id)),
        "summary": field("summary"),
        "timeZone": field("timeZone"),
        "id": id,
    }))
}

async fn get_calendar(api: &CalendarApi, args: CalendarIdArgs) -> ToolResult {
    require(&args.calendar_id, "Calendar ID cannot be empty.")?;
    let metadata = api.get_calendar(args.calendar_id.trim()).await?;
    if metadata.as_object().map_or(true, Map::is_empty) {
        return Ok(not_found(format!(
            "No metadata found for calendar with id '{}'.",
            args.calendar_id
        )));
    }
    Ok(json!({"status": "success", "metadata": metadata}))
}

#[derive(Debug, Deserialize)]
struct UpdateCalendarArgs {
    calendar_id: String,
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    timezone: Option<String>,
}

async fn update_calendar(api: &CalendarApi, args: UpdateCalendarArgs) -> ToolResult {
    let supplied = [&args.summary, &args.description, &args.location, &args.timezone];
    if supplied.iter().all(|f| f.as_deref().map_or(true, str::is_empty)) {
        return Err(invalid("No fields provided to update the calendar."));
    }
    require(&args.calendar_id, "Calendar ID cannot be empty.")?;

    let mut body = Map::new();
    if let Some(summary) = args.summary {
        require(&summary, "Summary cannot be empty.")?;
        body.insert("summary".into(), json!(summary));
    }
    if let Some(description) = args.description {
        body.insert("description".into(), json!(description));
    }
    if let Some(location) = args.location {
        body.insert("location".into(), json!(location));
    }
    if let Some(tz) = non_blank(args.timezone.as_deref()) {
        check_timezone(&tz)?;
        body.insert("timeZone".into(), json!(tz));
    }

    let updated = api
        .patch_calendar(args.calendar_id.trim(), &Value::Object(body))
        .await?;
    let field = |name: &str| updated.get(name).and_then(Value::as_str).unwrap_or_default().to_string();
    Ok(json!({
        "status": "success",
        "metadata": {
            "calendar_id": field("id"),
            "summary": field("summary"),
            "description": field("description"),
            "location": field("location"),
            "time_zone": field("timeZone"),
        }
    }))
}

async fn delete_calendar(api: &CalendarApi, args: CalendarIdArgs) -> ToolResult {
    require(&args.calendar_id, "Calendar ID cannot be empty.")?;
    let calendar_id = args.calendar_id.trim();
    if is_primary(api, calendar_id).await? {
        return Err(invalid("Cannot delete the user's primary calendar."));
    }

    api.delete_calendar(calendar_id).await?;
    Ok(json!({
        "status": "success",
        "message": format!("Calendar with ID '{}' deleted successfully.", calendar_id),
    }))
}

#[derive(Debug, Deserialize)]
struct ListEventsArgs {
    calendar_id: String,
    query: Option<String>,
    max_results: Option<u32>,
    max_attendees: Option<u32>,
    show_hidden_invitations: Option<bool>,
    show_deleted: Option<bool>,
    time_min: Option<String>,
    time_max: Option<String>,
    time_zone: Option<String>,
    updated_min: Option<String>,
    single_events: Option<bool>,
    order_by: Option<String>,
}

async fn list_events(api: &CalendarApi, args: ListEventsArgs) -> ToolResult {
    require(&args.calendar_id, "Calendar ID cannot be empty.")?;
    in_range(args.max_results, 250, "max_results")?;
    in_range(args.max_attendees, 250, "max_attendees")?;
    check_timestamp(args.time_min.as_deref(), "time_min")?;
    check_timestamp(args.time_max.as_deref(), "time_max")?;
    check_timestamp(args.updated_min.as_deref(), "updated_min")?;
    one_of(args.order_by.as_deref(), EVENT_ORDER, "order_by")?;

    let time_zone = non_blank(args.time_zone.as_deref());
    let warning = dropped_zone_warning(time_zone.as_deref());
    let query = EventQuery {
        q: non_blank(args.query.as_deref()),
        limit: args.max_results.map_or(DEFAULT_EVENT_LIMIT, |n| n as usize),
        max_attendees: args.max_attendees,
        show_hidden_invitations: args.show_hidden_invitations,
        show_deleted: args.show_deleted,
        time_min: args.time_min,
        time_max: args.time_max,
        time_zone: time_zone.filter(|tz| is_valid_timezone(tz)),
        updated_min: args.updated_min,
        single_events: args.single_events,
        order_by: args.order_by,
    };

    let events = api.list_events(args.calendar_id.trim(), &query).await?;
    let mut result = json!({"status": "success", "events": events});
    if let Some(warning) = warning {
        result["warning"] = json!(warning);
    }
    Ok(result)
}

#[derive(Debug, Deserialize)]
struct GetEventArgs {
    calendar_id: String,
    event_id: String,
    max_attendees: Option<u32>,
    time_zone: Option<String>,
}

async fn get_event(api: &CalendarApi, args: GetEventArgs) -> ToolResult {
    require(&args.calendar_id, "Calendar ID cannot be empty.")?;
    require(&args.event_id, "Event ID cannot be empty.")?;
    in_range(args.max_attendees, 250, "max_attendees")?;

    let time_zone = non_blank(args.time_zone.as_deref());
    let warning = dropped_zone_warning(time_zone.as_deref());
    let event = api
        .get_event(
            args.calendar_id.trim(),
            args.event_id.trim(),
            args.max_attendees,
            time_zone.as_deref().filter(|tz| is_valid_timezone(tz)),
        )
        .await?;
    if event.as_object().map_or(true, Map::is_empty) {
        return Ok(not_found(format!(
            "No event found with ID {} in {}.",
            args.event_id, args.calendar_id
        )));
    }

    let mut result = json!({"status": "success", "event": event});
    if let Some(warning) = warning {
        result["warning"] = json!(warning);
    }
    Ok(result)
}

#[derive(Debug, Deserialize)]
struct CreateEventArgs {
    calendar_id: String,
    summary: String,
    start_time: String,
    end_time: String,
    time_zone: Option<String>,
    description: Option<String>,
    location: Option<String>,
    add_google_meet_link: Option<bool>,
    #[serde(default)]
    attendees: Vec<String>,
    #[serde(default)]
    recurrence: Vec<String>,
    visibility: Option<String>,
    guests_can_invite_others: Option<bool>,
    guests_can_see_other_guests: Option<bool>,
    transparency: Option<String>,
    send_updates: Option<String>,
}

async fn create_event(api: &CalendarApi, args: CreateEventArgs) -> ToolResult {
    require(&args.calendar_id, "Calendar ID cannot be empty.")?;
    require(&args.summary, "Event summary cannot be empty.")?;
    check_timestamp(Some(&args.start_time), "start_time")?;
    check_timestamp(Some(&args.end_time), "end_time")?;
    if !start_before_end(&args.start_time, &args.end_time) {
        return Err(invalid("start_time must be before end_time."));
    }
    one_of(args.visibility.as_deref(), VISIBILITY, "visibility")?;
    one_of(args.transparency.as_deref(), TRANSPARENCY, "transparency")?;
    one_of(args.send_updates.as_deref(), SEND_UPDATES, "send_updates")?;

    let time_zone = non_blank(args.time_zone.as_deref())
        .filter(|tz| is_valid_timezone(tz))
        .unwrap_or_else(|| "UTC".to_string());

    let mut body = json!({
        "summary": args.summary.trim(),
        "start": {"dateTime": args.start_time, "timeZone": time_zone},
        "end": {"dateTime": args.end_time, "timeZone": time_zone},
        "visibility": args.visibility.as_deref().unwrap_or("default"),
        "transparency": args.transparency.as_deref().unwrap_or("opaque"),
    });
    if let Some(location) = args.location {
        body["location"] = json!(location);
    }
    if let Some(description) = non_blank(args.description.as_deref()) {
        body["description"] = json!(description);
    }
    if let Some(flag) = args.guests_can_invite_others {
        body["guestsCanInviteOthers"] = json!(flag);
    }
    if let Some(flag) = args.guests_can_see_other_guests {
        body["guestsCanSeeOtherGuests"] = json!(flag);
    }
    if !args.recurrence.is_empty() {
        body["recurrence"] = json!(args.recurrence);
    }

    let (valid, rejected): (Vec<String>, Vec<String>) =
        args.attendees.into_iter().partition(|email| is_valid_email(email));
    if !valid.is_empty() {
        let attendees: Vec<Value> = valid.iter().map(|email| json!({"email": email})).collect();
        body["attendees"] = json!(attendees);
    }
    if args.add_google_meet_link.unwrap_or(false) {
        body["conferenceData"] = json!({
            "createRequest": {
                "requestId": uuid::Uuid::new_v4().to_string(),
                "conferenceSolutionKey": {"type": "hangoutsMeet"}
            }
        });
    }

    let send_updates = args.send_updates.as_deref().unwrap_or("none");
    let event = api
        .insert_event(args.calendar_id.trim(), &body, send_updates)
        .await?;

    let mut result = json!({"status": "success", "event": event});
    if !rejected.is_empty() {
        result["warning"] = json!(format!("Invalid attendee emails: {}", rejected.join(", ")));
    }
    Ok(result)
}

#[derive(Debug, Deserialize)]
struct UpdateEventArgs {
    calendar_id: String,
    event_id: String,
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    time_zone: Option<String>,
    #[serde(default)]
    recurrence: Vec<String>,
    visibility: Option<String>,
    transparency: Option<String>,
    guests_can_invite_others: Option<bool>,
    guests_can_see_other_guests: Option<bool>,
    send_updates: Option<String>,
}

async fn update_event(api: &CalendarApi, args: UpdateEventArgs) -> ToolResult {
    require(&args.calendar_id, "Calendar ID cannot be empty.")?;
    require(&args.event_id, "Event ID cannot be empty.")?;
    one_of(args.visibility.as_deref(), VISIBILITY, "visibility")?;
    one_of(args.transparency.as_deref(), TRANSPARENCY, "transparency")?;
    one_of(args.send_updates.as_deref(), SEND_UPDATES, "send_updates")?;

    let calendar_id = args.calendar_id.trim();
    let event_id = args.event_id.trim();

    let mut body = Map::new();
    if let Some(summary) = args.summary {
        require(&summary, "Summary cannot be empty.")?;
        body.insert("summary".into(), json!(summary));
    }
    if let Some(description) = args.description {
        body.insert("description".into(), json!(description));
    }
    if let Some(location) = args.location {
        body.insert("location".into(), json!(location));
    }
    if !args.recurrence.is_empty() {
        body.insert("recurrence".into(), json!(args.recurrence));
    }
    if let Some(visibility) = args.visibility {
        body.insert("visibility".into(), json!(visibility));
    }
    if let Some(transparency) = args.transparency {
        body.insert("transparency".into(), json!(transparency));
    }
    if let Some(flag) = args.guests_can_invite_others {
        body.insert("guestsCanInviteOthers".into(), json!(flag));
    }
    if let Some(flag) = args.guests_can_see_other_guests {
        body.insert("guestsCanSeeOtherGuests".into(), json!(flag));
    }

    let start = non_blank(args.start_time.as_deref());
    let end = non_blank(args.end_time.as_deref());
    let mut zone_fell_back = false;
    match (start, end) {
        (None, None) => {}
        (Some(start), Some(end)) => {
            check_timestamp(Some(&start), "start_time")?;
            check_timestamp(Some(&end), "end_time")?;

            let requested = non_blank(args.time_zone.as_deref()).filter(|tz| is_valid_timezone(tz));
            let (start_zone, end_zone) = match requested {
                Some(tz) => (tz.clone(), tz),
                None => {
                    let existing = api.get_event(calendar_id, event_id, None, None).await?;
                    zone_fell_back = true;
                    (
                        existing_zone(&existing, "start", args.time_zone.as_deref())?,
                        existing_zone(&existing, "end", args.time_zone.as_deref())?,
                    )
                }
            };
            body.insert("start".into(), json!({"dateTime": start, "timeZone": start_zone}));
            body.insert("end".into(), json!({"dateTime": end, "timeZone": end_zone}));
        }
        _ => return Err(invalid("Both start_time and end_time must be provided together.")),
    }

    if body.is_empty() {
        return Err(invalid("No fields provided to update the event."));
    }

    let send_updates = args.send_updates.as_deref().unwrap_or("none");
    let updated = api
        .patch_event(calendar_id, event_id, &Value::Object(body), send_updates)
        .await?;

    let mut result = json!({"status": "success", "event": updated});
    if zone_fell_back {
        result["warning"] = json!("Invalid time zone provided. Defaulted to the event's original time zone.");
    }
    Ok(result)
}

/// The zone recorded on an event's `start` or `end`.
fn existing_zone(event: &Value, edge: &str, requested: Option<&str>) -> Result<String, ToolFailure> {
    non_blank(event.get(edge).and_then(|e| e.get("timeZone")).and_then(Value::as_str)).ok_or_else(|| {
        invalid(format!(
            "Invalid time_zone provided: {}. Default timezone for {}_time could not be resolved.",
            requested.unwrap_or("None"),
            edge
        ))
    })
}

#[derive(Debug, Deserialize)]
struct DeleteEventArgs {
    calendar_id: String,
    event_id: String,
    send_updates: Option<String>,
}

async fn delete_event(api: &CalendarApi, args: DeleteEventArgs) -> ToolResult {
    require(&args.calendar_id, "Calendar ID cannot be empty.")?;
    require(&args.event_id, "Event ID cannot be empty.")?;
    one_of(args.send_updates.as_deref(), SEND_UPDATES, "send_updates")?;

    let send_updates = args.send_updates.as_deref().unwrap_or("none");
    api.delete_event(args.calendar_id.trim(), args.event_id.trim(), send_updates)
        .await?;
    Ok(json!({
        "status": "success",
        "message": format!(
            "Event '{}' deleted from calendar '{}'.",
            args.event_id.trim(),
            args.calendar_id.trim()
        ),
    }))
}

async fn clear_primary_calendar(api: &CalendarApi, args: CalendarIdArgs) -> ToolResult {
    require(&args.calendar_id, "Calendar ID cannot be empty.")?;
    let calendar_id = args.calendar_id.trim();
    if !is_primary(api, calendar_id).await? {
        return Err(invalid(
            "Cannot clear secondary calendar. Only the primary calendar can be cleared.",
        ));
    }

    api.clear_calendar(calendar_id).await?;
    Ok(json!({
        "status": "success",
        "message": format!("All events from calendar {} have been cleared.", calendar_id),
    }))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{client, result_json};
    use super::*;
    use crate::tools::ToolRegistry;
    use gworkspace_google::Service;
    use mockito::Matcher;

    fn registry(server: &mockito::Server) -> ToolRegistry {
        ToolRegistry::with_base_url(Service::Calendar, client(), &server.url())
    }

    #[test]
    fn test_dropped_zone_warning() {
        assert!(dropped_zone_warning(Some("Asia/Kolkata")).is_none());
        assert!(dropped_zone_warning(None).is_none());
        assert!(dropped_zone_warning(Some("Mars/Olympus"))
            .unwrap()
            .contains("Mars/Olympus"));
    }

    #[tokio::test]
    async fn test_list_calendars_flattens_entries() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/users/me/calendarList")
            .match_query(Matcher::UrlEncoded("minAccessRole".into(), "owner".into()))
            .with_status(200)
            .with_body(r#"{"items": [{"id": "me@x.com", "summary": "Me", "primary": true, "accessRole": "owner"}]}"#)
            .create_async()
            .await;

        let resp = registry(&server)
            .call_tool("list_calendars", json!({"max_results": 5, "min_access_role": "owner"}))
            .await
            .unwrap();
        assert_eq!(
            result_json(&resp)["calendars"],
            json!([{"calendar_id": "me@x.com", "summary": "Me", "primary": true, "hidden": false, "deleted": false}])
        );
    }

    #[tokio::test]
    async fn test_create_calendar_rejects_unknown_zone() {
        let server = mockito::Server::new_async().await;
        let resp = registry(&server)
            .call_tool("create_calendar", json!({"summary": "Team", "time_zone": "Nowhere/City"}))
            .await
            .unwrap();
        assert!(resp.is_error);
        assert!(result_json(&resp)["message"].as_str().unwrap().contains("Nowhere/City"));
    }

    #[tokio::test]
    async fn test_create_calendar_defaults_to_utc() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/calendars")
            .match_body(Matcher::Json(json!({"summary": "Team", "timeZone": "UTC"})))
            .with_status(200)
            .with_body(r#"{"id": "abc@group.calendar.google.com", "summary": "Team", "timeZone": "UTC"}"#)
            .create_async()
            .await;

        let resp = registry(&server)
            .call_tool("create_calendar", json!({"summary": " Team "}))
            .await
            .unwrap();
        let body = result_json(&resp);
        assert_eq!(
            body["calendar_url"],
            "https://calendar.google.com/calendar/u/0/r?cid=abc%40group.calendar.google.com"
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_calendar_refuses_primary() {
        let mut server = mockito::Server::new_async().await;
        let _entry = server
            .mock("GET", "/users/me/calendarList/cal1")
            .with_status(200)
            .with_body(r#"{"id": "cal1", "primary": true}"#)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let resp = registry(&server)
            .call_tool("delete_calendar", json!({"calendar_id": "cal1"}))
            .await
            .unwrap();
        assert!(resp.is_error);
        assert_eq!(result_json(&resp)["message"], "Cannot delete the user's primary calendar.");
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_clear_requires_primary() {
        let mut server = mockito::Server::new_async().await;
        let _entry = server
            .mock("GET", "/users/me/calendarList/team1")
            .with_status(200)
            .with_body(r#"{"id": "team1"}"#)
            .create_async()
            .await;

        let resp = registry(&server)
            .call_tool("clear_primary_calendar", json!({"calendar_id": "team1"}))
            .await
            .unwrap();
        assert!(resp.is_error);
    }

    #[tokio::test]
    async fn test_list_events_drops_invalid_zone_with_warning() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/calendars/primary/events")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("maxResults".into(), "250".into()),
                Matcher::UrlEncoded("orderBy".into(), "startTime".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"items": [{"id": "e1"}]}"#)
            .create_async()
            .await;

        let resp = registry(&server)
            .call_tool(
                "list_events",
                json!({"calendar_id": "primary", "time_zone": "Bad/Zone", "order_by": "startTime", "single_events": true}),
            )
            .await
            .unwrap();
        let body = result_json(&resp);
        assert_eq!(body["events"], json!([{"id": "e1"}]));
        assert!(body["warning"].as_str().unwrap().contains("Bad/Zone"));
    }

    #[tokio::test]
    async fn test_list_events_rejects_bad_timestamp() {
        let server = mockito::Server::new_async().await;
        let resp = registry(&server)
            .call_tool("list_events", json!({"calendar_id": "primary", "time_min": "yesterday"}))
            .await
            .unwrap();
        assert!(resp.is_error);
    }

    #[tokio::test]
    async fn test_create_event_with_meet_and_attendees() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/calendars/primary/events")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("sendUpdates".into(), "none".into()),
                Matcher::UrlEncoded("conferenceDataVersion".into(), "1".into()),
            ]))
            .match_body(Matcher::PartialJson(json!({
                "summary": "Standup",
                "start": {"dateTime": "2025-06-01T10:00:00Z", "timeZone": "UTC"},
                "attendees": [{"email": "ann@example.com"}],
                "conferenceData": {"createRequest": {"conferenceSolutionKey": {"type": "hangoutsMeet"}}}
            })))
            .with_status(200)
            .with_body(r#"{"id": "ev1"}"#)
            .create_async()
            .await;

        let resp = registry(&server)
            .call_tool(
                "create_event",
                json!({
                    "calendar_id": "primary",
                    "summary": "Standup",
                    "start_time": "2025-06-01T10:00:00Z",
                    "end_time": "2025-06-01T10:15:00Z",
                    "time_zone": "Not/AZone",
                    "attendees": ["ann@example.com", "bogus"],
                    "add_google_meet_link": true
                }),
            )
            .await
            .unwrap();
        let body = result_json(&resp);
        assert_eq!(body["event"]["id"], "ev1");
        assert_eq!(body["warning"], "Invalid attendee emails: bogus");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_event_requires_ordered_times() {
        let server = mockito::Server::new_async().await;
        let resp = registry(&server)
            .call_tool(
                "create_event",
                json!({
                    "calendar_id": "primary",
                    "summary": "Backwards",
                    "start_time": "2025-06-01T11:00:00Z",
                    "end_time": "2025-06-01T10:00:00Z"
                }),
            )
            .await
            .unwrap();
        assert_eq!(result_json(&resp)["message"], "start_time must be before end_time.");
    }

    #[tokio::test]
    async fn test_update_event_needs_both_times() {
        let server = mockito::Server::new_async().await;
        let resp = registry(&server)
            .call_tool(
                "update_event",
                json!({"calendar_id": "primary", "event_id": "e1", "start_time": "2025-06-01T10:00:00Z"}),
            )
            .await
            .unwrap();
        assert_eq!(
            result_json(&resp)["message"],
            "Both start_time and end_time must be provided together."
        );
    }

    #[tokio::test]
    async fn test_update_event_falls_back_to_existing_zone() {
        let mut server = mockito::Server::new_async().await;
        let _get = server
            .mock("GET", "/calendars/primary/events/e1")
            .with_status(200)
            .with_body(r#"{"id": "e1", "start": {"timeZone": "Europe/Dublin"}, "end": {"timeZone": "Europe/Dublin"}}"#)
            .create_async()
            .await;
        let patch = server
            .mock("PATCH", "/calendars/primary/events/e1")
            .match_query(Matcher::Any)
            .match_body(Matcher::Json(json!({
                "start": {"dateTime": "2025-06-01T10:00:00Z", "timeZone": "Europe/Dublin"},
                "end": {"dateTime": "2025-06-01T11:00:00Z", "timeZone": "Europe/Dublin"}
            })))
            .with_status(200)
            .with_body(r#"{"id": "e1"}"#)
            .create_async()
            .await;

        let resp = registry(&server)
            .call_tool(
                "update_event",
                json!({
                    "calendar_id": "primary",
                    "event_id": "e1",
                    "start_time": "2025-06-01T10:00:00Z",
                    "end_time": "2025-06-01T11:00:00Z",
                    "time_zone": "Invalid/Zone"
                }),
            )
            .await
            .unwrap();
        let body = result_json(&resp);
        assert_eq!(body["status"], "success");
        assert!(body["warning"].as_str().unwrap().contains("original time zone"));
        patch.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_event_with_nothing_to_change() {
        let server = mockito::Server::new_async().await;
        let resp = registry(&server)
            .call_tool("update_event", json!({"calendar_id": "primary", "event_id": "e1"}))
            .await
            .unwrap();
        assert_eq!(result_json(&resp)["message"], "No fields provided to update the event.");
    }

    #[tokio::test]
    async fn test_update_calendar_requires_a_field() {
        let mut server = mockito::Server::new_async().await;
        let patch = server
            .mock("PATCH", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let resp = registry(&server)
            .call_tool("update_calendar", json!({"calendar_id": "cal1", "summary": "", "location": ""}))
            .await
            .unwrap();
        assert!(resp.is_error);
        assert_eq!(result_json(&resp)["message"], "No fields provided to update the calendar.");
        patch.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_calendar_patches_given_fields() {
        let mut server = mockito::Server::new_async().await;
        let patch = server
            .mock("PATCH", "/calendars/cal1")
            .match_body(Matcher::Json(json!({"location": "Dublin", "timeZone": "Europe/Dublin"})))
            .with_status(200)
            .with_body(r#"{"id": "cal1", "summary": "Team", "location": "Dublin", "timeZone": "Europe/Dublin"}"#)
            .create_async()
            .await;

        let resp = registry(&server)
            .call_tool(
                "update_calendar",
                json!({"calendar_id": "cal1", "location": "Dublin", "timezone": "Europe/Dublin"}),
            )
            .await
            .unwrap();
        let body = result_json(&resp);
        assert_eq!(body["metadata"]["time_zone"], "Europe/Dublin");
        assert_eq!(body["metadata"]["description"], "");
        patch.assert_async().await;
    }
}
