//! The Workspace services a server process can expose.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::GoogleError;

const USERINFO_EMAIL_SCOPE: &str = "https://www.googleapis.com/auth/userinfo.email";

const DRIVE_SCOPES: &[&str] = &["https://www.googleapis.com/auth/drive"];

const GMAIL_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.labels",
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.compose",
    "https://www.googleapis.com/auth/gmail.insert",
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/gmail.settings.basic",
];

const CALENDAR_SCOPES: &[&str] = &["https://www.googleapis.com/auth/calendar"];

const TASKS_SCOPES: &[&str] = &["https://www.googleapis.com/auth/tasks"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Drive,
    Gmail,
    Calendar,
    Tasks,
}

#[derive(Debug, Error)]
#[error("unknown service '{0}' (expected one of: drive, gmail, calendar, tasks)")]
pub struct UnknownService(String);

impl Service {
    pub const ALL: [Service; 4] = [Service::Drive, Service::Gmail, Service::Calendar, Service::Tasks];

    /// Short name used on the command line and in token file names.
    pub fn name(&self) -> &'static str {
        match self {
            Service::Drive => "drive",
            Service::Gmail => "gmail",
            Service::Calendar => "calendar",
            Service::Tasks => "tasks",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Service::Drive => "Google Drive",
            Service::Gmail => "Gmail",
            Service::Calendar => "Google Calendar",
            Service::Tasks => "Google Tasks",
        }
    }

    fn api_name(&self) -> &'static str {
        match self {
            Service::Drive => "Drive API",
            Service::Gmail => "Gmail API",
            Service::Calendar => "Calendar API",
            Service::Tasks => "Tasks API",
        }
    }

    /// OAuth scopes the service's tools need, plus the userinfo scope used
    /// to label the stored token with the account email.
    pub fn scopes(&self) -> Vec<String> {
        let scopes = match self {
            Service::Drive => DRIVE_SCOPES,
            Service::Gmail => GMAIL_SCOPES,
            Service::Calendar => CALENDAR_SCOPES,
            Service::Tasks => TASKS_SCOPES,
        };
        scopes
            .iter()
            .copied()
            .chain(std::iter::once(USERINFO_EMAIL_SCOPE))
            .map(String::from)
            .collect()
    }

    /// Human-readable explanation of a failed API call, keyed on HTTP status.
    pub fn status_message(&self, status: u16, reason: &str) -> String {
        match status {
            400 => match self {
                Service::Gmail => "Bad request. Please check if required fields are valid.".to_string(),
                Service::Calendar => "Bad request. Please check if required fields like summary, time zone, \
                                      or event timing are valid."
                    .to_string(),
                Service::Drive | Service::Tasks => {
                    "Invalid request or file metadata might be incorrect.".to_string()
                }
            },
            401 => "Unauthorized access. Check if the credentials are valid or expired.".to_string(),
            403 => format!(
                "Permission denied. Ensure your OAuth scope includes {} access and that the \
                 authenticated user has permission to perform this action.",
                self.name()
            ),
            404 => {
                let what = match self {
                    Service::Drive => "The file, folder, or drive",
                    Service::Gmail => "The email or message",
                    Service::Calendar => "The calendar or event",
                    Service::Tasks => "The task or tasklist",
                };
                format!("Resource not found. {} may not exist or was deleted.", what)
            }
            409 => "Conflict error. This could be due to duplicate operations.".to_string(),
            410 => "The resource is no longer available.".to_string(),
            412 => "Precondition failed. Try syncing again or verify versioning headers.".to_string(),
            429 => "Quota exceeded. Too many requests. Try again later or use exponential backoff.".to_string(),
            500 | 503 => format!(
                "The {} service is temporarily unavailable. Please retry after some time.",
                self.display_name()
            ),
            _ => format!("Unexpected error with the {}: {}", self.api_name(), reason),
        }
    }

    /// Message returned to the host for any failure while serving a tool call.
    pub fn describe_error(&self, err: &GoogleError) -> String {
        match err {
            GoogleError::Api { status, message } => self.status_message(*status, message),
            other => format!("An unexpected error occurred: {}", other),
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Service {
    type Err = UnknownService;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drive" | "google_drive" => Ok(Service::Drive),
            "gmail" => Ok(Service::Gmail),
            "calendar" | "google_calendar" => Ok(Service::Calendar),
            "tasks" | "google_tasks" => Ok(Service::Tasks),
            other => Err(UnknownService(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_service_names() {
        assert_eq!("drive".parse::<Service>().unwrap(), Service::Drive);
        assert_eq!("Gmail".parse::<Service>().unwrap(), Service::Gmail);
        assert_eq!("google_calendar".parse::<Service>().unwrap(), Service::Calendar);
        assert!("photos".parse::<Service>().is_err());
    }

    #[test]
    fn test_scopes_include_userinfo_email() {
        for service in Service::ALL {
            assert!(service.scopes().iter().any(|s| s == USERINFO_EMAIL_SCOPE));
        }
        assert_eq!(Service::Gmail.scopes().len(), GMAIL_SCOPES.len() + 1);
    }

    #[test]
    fn test_status_messages_are_service_specific() {
        let msg = Service::Calendar.status_message(404, "Not Found");
        assert!(msg.contains("calendar or event"));

        let msg = Service::Drive.status_message(403, "Forbidden");
        assert!(msg.contains("drive access"));

        let msg = Service::Tasks.status_message(503, "Backend Error");
        assert!(msg.contains("Google Tasks service"));
    }

    #[test]
    fn test_unknown_status_includes_reason() {
        let msg = Service::Gmail.status_message(418, "I'm a teapot");
        assert_eq!(msg, "Unexpected error with the Gmail API: I'm a teapot");
    }

    #[test]
    fn test_describe_non_api_error() {
        let err = GoogleError::RefreshFailed("invalid_grant".to_string());
        let msg = Service::Drive.describe_error(&err);
        assert!(msg.starts_with("An unexpected error occurred"));
        assert!(msg.contains("invalid_grant"));
    }
}
