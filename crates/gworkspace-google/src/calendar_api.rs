//! Google Calendar API v3 wrapper
//!
//! Provides typed access to Calendar operations:
//! - Calendar list and calendar create/get/patch/delete/clear
//! - Event list/get/insert/patch/delete

use serde_json::Value;
use tracing::info;

use crate::client::{path_segment, GoogleClient};
use crate::GoogleError;

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Google Calendar API client
pub struct CalendarApi {
    client: GoogleClient,
    base_url: String,
}

crate::google_api_wrapper!(CalendarApi, CALENDAR_API_BASE);

/// Parameters for `calendarList.list`
#[derive(Debug, Default)]
pub struct CalendarListQuery {
    pub limit: usize,
    pub min_access_role: Option<String>,
    pub show_deleted: Option<bool>,
    pub show_hidden: Option<bool>,
}

/// Parameters for `events.list`
#[derive(Debug, Default)]
pub struct EventQuery {
    pub q: Option<String>,
    pub limit: usize,
    pub max_attendees: Option<u32>,
    pub show_hidden_invitations: Option<bool>,
    pub show_deleted: Option<bool>,
    pub time_min: Option<String>,
    pub time_max: Option<String>,
    pub time_zone: Option<String>,
    pub updated_min: Option<String>,
    pub single_events: Option<bool>,
    pub order_by: Option<String>,
}

fn push_opt<T: ToString>(params: &mut Vec<(&'static str, String)>, key: &'static str, value: &Option<T>) {
    if let Some(v) = value {
        params.push((key, v.to_string()));
    }
}

impl CalendarApi {
    fn calendar_url(&self, calendar_id: &str, rest: &str) -> String {
        let base = self.url(&format!("calendars/{}", path_segment(calendar_id)));
        if rest.is_empty() {
            base
        } else {
            format!("{}/{}", base, rest)
        }
    }

    fn event_url(&self, calendar_id: &str, event_id: &str) -> String {
        self.calendar_url(calendar_id, &format!("events/{}", path_segment(event_id)))
    }

    pub async fn list_calendars(&self, query: &CalendarListQuery) -> Result<Vec<Value>, GoogleError> {
        let mut params = Vec::new();
        push_opt(&mut params, "minAccessRole", &query.min_access_role);
        push_opt(&mut params, "showDeleted", &query.show_deleted);
        push_opt(&mut params, "showHidden", &query.show_hidden);

        info!("Listing calendars");
        self.client
            .get_paginated(&self.url("users/me/calendarList"), &params, "items", query.limit)
            .await
    }

    pub async fn insert_calendar(&self, body: &Value) -> Result<Value, GoogleError> {
        info!("Creating calendar");
        self.client.post(&self.url("calendars"), &[], body).await
    }

    pub async fn get_calendar(&self, calendar_id: &str) -> Result<Value, GoogleError> {
        self.client.get(&self.calendar_url(calendar_id, ""), &[]).await
    }

    /// The user's calendar list entry; carries the `primary` flag
    pub async fn get_calendar_list_entry(&self, calendar_id: &str) -> Result<Value, GoogleError> {
        let url = self.url(&format!("users/me/calendarList/{}", path_segment(calendar_id)));
        self.client.get(&url, &[]).await
    }

    pub async fn patch_calendar(&self, calendar_id: &str, body: &Value) -> Result<Value, GoogleError> {
        info!("Updating calendar {}", calendar_id);
        self.client.patch(&self.calendar_url(calendar_id, ""), &[], body).await
    }

    pub async fn delete_calendar(&self, calendar_id: &str) -> Result<(), GoogleError> {
        info!("Deleting calendar {}", calendar_id);
        self.client.delete(&self.calendar_url(calendar_id, ""), &[]).await?;
        Ok(())
    }

    /// Delete every event on a primary calendar
    pub async fn clear_calendar(&self, calendar_id: &str) -> Result<(), GoogleError> {
        info!("Clearing calendar {}", calendar_id);
        self.client
            .post(&self.calendar_url(calendar_id, "clear"), &[], &Value::Object(Default::default()))
            .await?;
        Ok(())
    }

    pub async fn list_events(&self, calendar_id: &str, query: &EventQuery) -> Result<Vec<Value>, GoogleError> {
        let mut params = Vec::new();
        push_opt(&mut params, "q", &query.q);
        push_opt(&mut params, "maxAttendees", &query.max_attendees);
        push_opt(&mut params, "showHiddenInvitations", &query.show_hidden_invitations);
        push_opt(&mut params, "showDeleted", &query.show_deleted);
        push_opt(&mut params, "timeMin", &query.time_min);
        push_opt(&mut params, "timeMax", &query.time_max);
        push_opt(&mut params, "timeZone", &query.time_zone);
        push_opt(&mut params, "updatedMin", &query.updated_min);
        push_opt(&mut params, "singleEvents", &query.single_events);
        push_opt(&mut params, "orderBy", &query.order_by);

        info!("Listing events for calendar {}", calendar_id);
        self.client
            .get_paginated(&self.calendar_url(calendar_id, "events"), &params, "items", query.limit)
            .await
    }

    pub async fn get_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        max_attendees: Option<u32>,
        time_zone: Option<&str>,
    ) -> Result<Value, GoogleError> {
        let mut params = Vec::new();
        push_opt(&mut params, "maxAttendees", &max_attendees);
        push_opt(&mut params, "timeZone", &time_zone);
        self.client.get(&self.event_url(calendar_id, event_id), &params).await
    }

    /// Insert an event; conference data is always accepted
    pub async fn insert_event(
        &self,
        calendar_id: &str,
        body: &Value,
        send_updates: &str,
    ) -> Result<Value, GoogleError> {
        info!("Creating event on calendar {}", calendar_id);
        let params = [
            ("sendUpdates", send_updates.to_string()),
            ("conferenceDataVersion", "1".to_string()),
        ];
        self.client
            .post(&self.calendar_url(calendar_id, "events"), &params, body)
            .await
    }

    pub async fn patch_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        body: &Value,
        send_updates: &str,
    ) -> Result<Value, GoogleError> {
        info!("Updating event {} on calendar {}", event_id, calendar_id);
        let params = [
            ("sendUpdates", send_updates.to_string()),
            ("conferenceDataVersion", "1".to_string()),
        ];
        self.client
            .patch(&self.event_url(calendar_id, event_id), &params, body)
            .await
    }

    pub async fn delete_event(&self, calendar_id: &str, event_id: &str, send_updates: &str) -> Result<(), GoogleError> {
        info!("Deleting event {} on calendar {}", event_id, calendar_id);
        self.client
            .delete(
                &self.event_url(calendar_id, event_id),
                &[("sendUpdates", send_updates.to_string())],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use mockito::Matcher;
    use serde_json::json;
    use std::sync::Arc;

    fn api(server: &mockito::Server) -> CalendarApi {
        let client = GoogleClient::new(Arc::new(StaticToken::new("t"))).unwrap();
        CalendarApi::with_base_url(client, server.url())
    }

    #[tokio::test]
    async fn test_list_calendars_params() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/users/me/calendarList")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("minAccessRole".into(), "owner".into()),
                Matcher::UrlEncoded("showHidden".into(), "true".into()),
                Matcher::UrlEncoded("maxResults".into(), "10".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"items": [{"id": "primary@example.com", "primary": true}]}"#)
            .create_async()
            .await;

        let items = api(&server)
            .list_calendars(&CalendarListQuery {
                limit: 10,
                min_access_role: Some("owner".to_string()),
                show_deleted: None,
                show_hidden: Some(true),
            })
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_events_encodes_calendar_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/calendars/team%40group.calendar.google.com/events")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("timeMin".into(), "2025-01-01T00:00:00Z".into()),
                Matcher::UrlEncoded("singleEvents".into(), "true".into()),
                Matcher::UrlEncoded("orderBy".into(), "startTime".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"items": [{"id": "e1"}, {"id": "e2"}]}"#)
            .create_async()
            .await;

        let events = api(&server)
            .list_events(
                "team@group.calendar.google.com",
                &EventQuery {
                    limit: 250,
                    time_min: Some("2025-01-01T00:00:00Z".to_string()),
                    single_events: Some(true),
                    order_by: Some("startTime".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(events.len(), 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_insert_event_requests_conference_data() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/calendars/primary/events")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("sendUpdates".into(), "all".into()),
                Matcher::UrlEncoded("conferenceDataVersion".into(), "1".into()),
            ]))
            .match_body(Matcher::PartialJson(json!({"summary": "Standup"})))
            .with_status(200)
            .with_body(r#"{"id": "e1", "htmlLink": "https://calendar.google.com/e1"}"#)
            .create_async()
            .await;

        let event = api(&server)
            .insert_event("primary", &json!({"summary": "Standup"}), "all")
            .await
            .unwrap();
        assert_eq!(event["id"], "e1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_clear_and_delete_event() {
        let mut server = mockito::Server::new_async().await;
        let clear = server
            .mock("POST", "/calendars/primary/clear")
            .with_status(204)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/calendars/primary/events/e1")
            .match_query(Matcher::UrlEncoded("sendUpdates".into(), "none".into()))
            .with_status(204)
            .create_async()
            .await;

        let api = api(&server);
        api.clear_calendar("primary").await.unwrap();
        api.delete_event("primary", "e1", "none").await.unwrap();
        clear.assert_async().await;
        delete.assert_async().await;
    }
}
