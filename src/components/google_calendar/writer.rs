use super::auth::AuthenticatedClient;
use super::models::{CalendarEvent, EventList, EventResource};
use crate::components::models::{CreatedEvent, EventDraft};
use crate::components::EventSink;
use crate::config::Config;
use crate::error::{config_error, http_error, other_error, Error, SyncResult};
use crate::utils::retry::RetryPolicy;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertedEvent {
    id: String,
    #[serde(default)]
    html_link: Option<String>,
}

/// Creates events in one Google Calendar
#[derive(Clone)]
pub struct CalendarWriter {
    client: Client,
    api_base: String,
    calendar_id: String,
    retry: RetryPolicy,
}

impl CalendarWriter {
    pub fn new(config: &Config, client: Client) -> Self {
        Self {
            client,
            api_base: config.calendar_api_base.clone(),
            calendar_id: config.calendar_id.clone(),
            retry: config.retry_policy(),
        }
    }

    pub fn calendar_id(&self) -> &str {
        &self.calendar_id
    }

    /// `{api_base}/calendars/{calendar_id}/events`, with the id escaped
    fn events_url(&self) -> SyncResult<Url> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| config_error(&format!("Invalid calendar API base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| config_error("Calendar API base URL cannot have a path"))?
            .pop_if_empty()
            .extend(["calendars", self.calendar_id.as_str(), "events"]);
        Ok(url)
    }

    /// Insert one event. Transient failures are retried; others return at once.
    ///
    /// The event id is chosen here and reused by every attempt, so a retry
    /// after a request that did reach Google gets a 409 instead of creating a
    /// second copy.
    pub async fn create_event(
        &self,
        auth: &AuthenticatedClient,
        draft: &EventDraft,
    ) -> SyncResult<CreatedEvent> {
        let url = self.events_url()?;
        let event_id = new_event_id();
        let body = EventResource {
            id: Some(event_id.clone()),
            ..EventResource::from(draft)
        };

        self.retry
            .run("create event", || async {
                let token = auth.access_token().await?;
                debug!(summary = %draft.summary, calendar_id = %self.calendar_id, "creating calendar event");

                let response = self
                    .client
                    .post(url.clone())
                    .bearer_auth(token)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| http_error("Failed to create event", e))?;

                let status = response.status();
                if status == StatusCode::CONFLICT {
                    // Only an earlier attempt of this call can own the id
                    warn!(summary = %draft.summary, event_id = %event_id, "event already exists, an earlier attempt went through");
                    return Ok(CreatedEvent {
                        id: event_id.clone(),
                        html_link: None,
                    });
                }
                if !status.is_success() {
                    if status == StatusCode::UNAUTHORIZED {
                        auth.invalidate().await;
                    }
                    let error_body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Could not read error response".to_string());
                    return Err(classify_failure(status, "Failed to create event", &error_body));
                }

                let inserted: InsertedEvent = response
                    .json()
                    .await
                    .map_err(|e| other_error(&format!("Failed to parse created event: {}", e)))?;

                Ok(CreatedEvent {
                    id: inserted.id,
                    html_link: inserted.html_link,
                })
            })
            .await
    }

    /// Next `max_results` events from now, in start order
    pub async fn list_upcoming(
        &self,
        auth: &AuthenticatedClient,
        max_results: u32,
    ) -> SyncResult<Vec<CalendarEvent>> {
        let mut url = self.events_url()?;
        url.query_pairs_mut()
            .append_pair("timeMin", &Utc::now().to_rfc3339())
            .append_pair("maxResults", &max_results.to_string())
            .append_pair("singleEvents", "true")
            .append_pair("orderBy", "startTime");

        let token = auth.access_token().await?;
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| http_error("Failed to fetch events", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(classify_failure(status, "Failed to fetch events", &error_body));
        }

        let list: EventList = response
            .json()
            .await
            .map_err(|e| other_error(&format!("Failed to parse events response: {}", e)))?;

        Ok(list.items)
    }
}

#[async_trait]
impl EventSink for CalendarWriter {
    async fn create_event(
        &self,
        client: &AuthenticatedClient,
        draft: &EventDraft,
    ) -> SyncResult<CreatedEvent> {
        CalendarWriter::create_event(self, client, draft).await
    }
}

/// Fresh Calendar event id: 32 lowercase hex digits fit the API's base32hex alphabet
fn new_event_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Reasons Google attaches to a 403 that only means "slow down"
const RATE_LIMIT_REASONS: [&str; 2] = ["rateLimitExceeded", "userRateLimitExceeded"];

/// Whether an error body carries one of the rate-limit reasons.
///
/// Google nests them under `error.errors[].reason`; older responses put
/// `errors` at the top level.
fn is_rate_limited(body: &str) -> bool {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return false;
    };

    let limited = [&value["error"]["errors"], &value["errors"]]
        .into_iter()
        .filter_map(|errors| errors.as_array())
        .flatten()
        .filter_map(|e| e["reason"].as_str())
        .any(|reason| RATE_LIMIT_REASONS.contains(&reason));
    limited
}

/// Map a Calendar API error status onto the crate's error taxonomy
pub fn classify_failure(status: StatusCode, context: &str, body: &str) -> Error {
    let message = format!("{}: HTTP {} - {}", context, status, body);
    match status {
        StatusCode::FORBIDDEN if is_rate_limited(body) => Error::Transient(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Authorization(message),
        StatusCode::TOO_MANY_REQUESTS => Error::Transient(message),
        s if s.is_server_error() => Error::Transient(message),
        _ => Error::EventRejected(message),
    }
}
