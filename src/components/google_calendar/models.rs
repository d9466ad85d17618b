use crate::components::models::{EventDraft, EventTime};
use chrono::Duration;
use serde::{Deserialize, Serialize};

pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Application identity from the Google Cloud console download
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientRegistration {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

/// Layout of `credentials.json`: one of the two app types
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RegistrationFile {
    pub installed: Option<ClientRegistration>,
    pub web: Option<ClientRegistration>,
}

/// Contents of the token cache, in Google's `authorized_user` format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    #[serde(rename = "type")]
    pub kind: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

/// Successful response from the OAuth token endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Error body from the OAuth token endpoint
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OAuthErrorBody {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// `start`/`end` object of the Calendar API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl EventDateTime {
    fn start_of(time: &EventTime) -> Self {
        match time {
            EventTime::DateTime(dt) => Self {
                date_time: Some(dt.to_rfc3339()),
                date: None,
            },
            EventTime::Date(date) => Self {
                date_time: None,
                date: Some(date.format("%Y-%m-%d").to_string()),
            },
        }
    }

    /// All-day end dates are exclusive in the Calendar API
    fn end_of(time: &EventTime) -> Self {
        match time {
            EventTime::Date(date) => Self {
                date_time: None,
                date: Some((*date + Duration::days(1)).format("%Y-%m-%d").to_string()),
            },
            other => Self::start_of(other),
        }
    }
}

/// Request body for `events.insert`
#[derive(Debug, Clone, Serialize)]
pub struct EventResource {
    /// Client-chosen id, which makes a repeated insert fail with 409
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub summary: String,
    pub description: String,
    pub start: EventDateTime,
    pub end: EventDateTime,
}

impl From<&EventDraft> for EventResource {
    fn from(draft: &EventDraft) -> Self {
        Self {
            id: None,
            summary: draft.summary.clone(),
            description: draft.description.clone(),
            start: EventDateTime::start_of(&draft.start),
            end: EventDateTime::end_of(&draft.end),
        }
    }
}

/// Simplified calendar event representation
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub html_link: Option<String>,
    #[serde(default)]
    pub start: Option<EventDateTime>,
    #[serde(default)]
    pub end: Option<EventDateTime>,
}

impl CalendarEvent {
    /// Start as sent by the API, timed or all-day
    pub fn start_display(&self) -> &str {
        self.start
            .as_ref()
            .and_then(|s| s.date_time.as_deref().or(s.date.as_deref()))
            .unwrap_or("?")
    }
}

/// Response body of `events.list`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct EventList {
    #[serde(default)]
    pub items: Vec<CalendarEvent>,
}
