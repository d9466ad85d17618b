use super::models::{ApiError, DateProperty, Page, QueryResponse, TitleProperty};
use crate::components::models::{EventDraft, EventTime, RejectedRecord, SourceBatch};
use crate::components::EntrySource;
use crate::config::{Config, NotionQuerySettings};
use crate::error::{invalid_record, notion_error, SyncResult};
use crate::utils::time::parse_event_time;
use async_trait::async_trait;
use chrono_tz::Tz;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// Notion API version the request and response shapes follow
pub const NOTION_VERSION: &str = "2022-06-28";

/// Reads active entries from a Notion database and turns them into drafts
#[derive(Clone)]
pub struct SourceReader {
    client: Client,
    api_base: String,
    api_key: String,
    database_id: String,
    settings: NotionQuerySettings,
    timezone: Tz,
}

impl SourceReader {
    pub fn new(config: &Config, client: Client) -> Self {
        Self {
            client,
            api_base: config.notion_api_base.trim_end_matches('/').to_string(),
            api_key: config.notion_key.clone(),
            database_id: config.notion_database_id.clone(),
            settings: config.notion_query.clone(),
            timezone: config.timezone,
        }
    }

    /// Filter and sort sent with the query
    pub fn query_body(&self) -> Value {
        let status_clause = json!({
            "property": self.settings.status_property,
            (self.settings.status_kind.as_str()): { "equals": self.settings.status_value },
        });

        let mut clauses = vec![status_clause];
        if let Some(window) = &self.settings.date_window {
            if let Some(after) = window.on_or_after {
                clauses.push(json!({
                    "property": self.settings.date_property,
                    "date": { "on_or_after": after.format("%Y-%m-%d").to_string() },
                }));
            }
            if let Some(before) = window.on_or_before {
                clauses.push(json!({
                    "property": self.settings.date_property,
                    "date": { "on_or_before": before.format("%Y-%m-%d").to_string() },
                }));
            }
        }

        let filter = if clauses.len() == 1 {
            clauses.remove(0)
        } else {
            json!({ "and": clauses })
        };

        json!({
            "filter": filter,
            "sorts": [
                { "property": self.settings.sort_property, "direction": "ascending" }
            ],
        })
    }

    /// Issue the single database query and validate every returned page
    pub async fn fetch_entries(&self) -> SyncResult<SourceBatch> {
        let url = format!("{}/databases/{}/query", self.api_base, self.database_id);
        debug!(database_id = %self.database_id, "querying Notion database");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .json(&self.query_body())
            .send()
            .await
            .map_err(|e| notion_error(&format!("Failed to query database: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiError>(&body)
                .ok()
                .and_then(|e| match (e.code, e.message) {
                    (Some(code), Some(message)) => Some(format!("{} - {}", code, message)),
                    (_, message) => message,
                })
                .unwrap_or(body);
            return Err(notion_error(&format!(
                "Failed to query database: HTTP {} - {}",
                status, detail
            )));
        }

        let data: QueryResponse = response
            .json()
            .await
            .map_err(|e| notion_error(&format!("Failed to parse query response: {}", e)))?;

        if data.has_more {
            warn!(
                returned = data.results.len(),
                next_cursor = data.next_cursor.as_deref().unwrap_or("none"),
                "Notion query has more results; only the first page is synced"
            );
        }

        let mut batch = SourceBatch::default();
        for page in &data.results {
            if !status_matches(page, &self.settings) {
                debug!(record_id = %page.id, "skipping entry outside the active status");
                continue;
            }

            match page_to_draft(page, &self.settings, self.timezone) {
                Ok(draft) => batch.drafts.push(draft),
                Err(error) => {
                    warn!(record_id = %page.id, %error, "skipping malformed Notion entry");
                    batch.rejected.push(RejectedRecord {
                        record_id: page.id.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            drafts = batch.drafts.len(),
            rejected = batch.rejected.len(),
            "Fetched Notion entries"
        );

        Ok(batch)
    }
}

#[async_trait]
impl EntrySource for SourceReader {
    async fn fetch_entries(&self) -> SyncResult<SourceBatch> {
        SourceReader::fetch_entries(self).await
    }
}

/// False only when the page carries a status that differs from the wanted one
fn status_matches(page: &Page, settings: &NotionQuerySettings) -> bool {
    let Some(property) = page.properties.get(&settings.status_property) else {
        return true;
    };

    let name = ["select", "status"]
        .iter()
        .find_map(|kind| property.get(kind))
        .and_then(|option| option.get("name"))
        .and_then(|name| name.as_str());

    match name {
        Some(name) => name == settings.status_value,
        None => true,
    }
}

/// Validate one page into an event draft
pub fn page_to_draft(
    page: &Page,
    settings: &NotionQuerySettings,
    default_tz: Tz,
) -> SyncResult<EventDraft> {
    let id = page.id.as_str();

    let title_value = page
        .properties
        .get(&settings.title_property)
        .ok_or_else(|| invalid_record(id, &format!("missing '{}' property", settings.title_property)))?;
    let title: TitleProperty = serde_json::from_value(title_value.clone())
        .map_err(|_| invalid_record(id, &format!("'{}' is not a title property", settings.title_property)))?;
    let summary = title
        .title
        .iter()
        .map(|t| t.plain_text.as_str())
        .collect::<String>()
        .trim()
        .to_string();
    if summary.is_empty() {
        return Err(invalid_record(id, "title is empty"));
    }

    let description = page
        .url
        .clone()
        .ok_or_else(|| invalid_record(id, "missing page url"))?;

    let date_value = page
        .properties
        .get(&settings.date_property)
        .ok_or_else(|| invalid_record(id, &format!("missing '{}' property", settings.date_property)))?;
    let date: DateProperty = serde_json::from_value(date_value.clone())
        .map_err(|_| invalid_record(id, &format!("'{}' is not a date property", settings.date_property)))?;
    let date = date
        .date
        .ok_or_else(|| invalid_record(id, &format!("'{}' is empty", settings.date_property)))?;
    let end = date
        .end
        .as_deref()
        .ok_or_else(|| invalid_record(id, &format!("'{}' has no end", settings.date_property)))?;

    let zone = date.time_zone.as_deref();
    let start = parse_event_time(&date.start, zone, default_tz).map_err(|e| invalid_record(id, &e))?;
    let end = parse_event_time(end, zone, default_tz).map_err(|e| invalid_record(id, &e))?;

    match (&start, &end) {
        (EventTime::DateTime(s), EventTime::DateTime(e)) if e < s => {
            return Err(invalid_record(id, "end is before start"));
        }
        (EventTime::Date(s), EventTime::Date(e)) if e < s => {
            return Err(invalid_record(id, "end is before start"));
        }
        (s, e) if s.is_all_day() != e.is_all_day() => {
            return Err(invalid_record(id, "start and end mix all-day and timed values"));
        }
        _ => {}
    }

    Ok(EventDraft {
        source_id: page.id.clone(),
        summary,
        description,
        start,
        end,
    })
}
