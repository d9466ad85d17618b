use crate::error::{config_error, env_error, SyncResult};
use crate::utils::retry::RetryPolicy;
use chrono::NaiveDate;
use chrono_tz::Tz;
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default workflow state that marks a Notion entry for syncing
pub const DEFAULT_STATUS_VALUE: &str = "Active Queue";
pub const DEFAULT_NOTION_API_BASE: &str = "https://api.notion.com/v1";
pub const DEFAULT_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// How the status property is typed in the Notion database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Select,
    Status,
}

impl StatusKind {
    /// Key used by the Notion filter and property payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Select => "select",
            StatusKind::Status => "status",
        }
    }
}

/// Optional bounds on the date property. Both ends are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub on_or_after: Option<NaiveDate>,
    pub on_or_before: Option<NaiveDate>,
}

/// Which Notion properties to read and how to filter them
#[derive(Debug, Clone)]
pub struct NotionQuerySettings {
    pub status_property: String,
    pub status_value: String,
    pub status_kind: StatusKind,
    pub title_property: String,
    pub date_property: String,
    pub sort_property: String,
    pub date_window: Option<DateWindow>,
}

impl Default for NotionQuerySettings {
    fn default() -> Self {
        Self {
            status_property: "Status".to_string(),
            status_value: DEFAULT_STATUS_VALUE.to_string(),
            status_kind: StatusKind::Select,
            title_property: "Name".to_string(),
            date_property: "Start Date".to_string(),
            sort_property: "Created time".to_string(),
            date_window: None,
        }
    }
}

/// Main configuration structure, built once at startup
#[derive(Debug, Clone)]
pub struct Config {
    /// Notion integration secret
    pub notion_key: String,
    /// Notion database to read entries from
    pub notion_database_id: String,
    /// Google Calendar to create events in
    pub calendar_id: String,
    pub notion_query: NotionQuerySettings,
    /// Time zone for Notion date-times that carry no offset
    pub timezone: Tz,
    /// Google client registration, provided out of band
    pub credentials_path: PathBuf,
    /// Token cache written after a successful authorization
    pub token_path: PathBuf,
    pub notion_api_base: String,
    pub calendar_api_base: String,
    /// Token endpoint override for refreshing a cached credential. When
    /// unset, the registration's `token_uri` is used.
    pub oauth_token_uri: Option<String>,
    pub request_timeout: Duration,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    /// Upper bound on concurrent event creation calls
    pub concurrency: usize,
}

impl Config {
    /// Load configuration from the process environment and `.env`
    pub fn load() -> SyncResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> SyncResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| get(key).ok_or_else(|| env_error(key));

        let notion_key = required("NOTION_KEY")?;
        let notion_database_id = required("NOTION_DATABASE_ID")?;
        let calendar_id = get("CALENDARID")
            .or_else(|| get("GOOGLE_CALENDAR_ID"))
            .ok_or_else(|| env_error("CALENDARID"))?;

        let defaults = NotionQuerySettings::default();
        let status_kind = match get("NOTION_STATUS_KIND").as_deref() {
            None | Some("select") => StatusKind::Select,
            Some("status") => StatusKind::Status,
            Some(other) => {
                return Err(config_error(&format!(
                    "NOTION_STATUS_KIND must be 'select' or 'status', got '{}'",
                    other
                )))
            }
        };

        let on_or_after = get("NOTION_DATE_AFTER")
            .map(|v| parse_date("NOTION_DATE_AFTER", &v))
            .transpose()?;
        let on_or_before = get("NOTION_DATE_BEFORE")
            .map(|v| parse_date("NOTION_DATE_BEFORE", &v))
            .transpose()?;
        let date_window = if on_or_after.is_some() || on_or_before.is_some() {
            Some(DateWindow {
                on_or_after,
                on_or_before,
            })
        } else {
            None
        };

        let notion_query = NotionQuerySettings {
            status_property: get("NOTION_STATUS_PROPERTY").unwrap_or(defaults.status_property),
            status_value: get("NOTION_STATUS_VALUE").unwrap_or(defaults.status_value),
            status_kind,
            title_property: get("NOTION_TITLE_PROPERTY").unwrap_or(defaults.title_property),
            date_property: get("NOTION_DATE_PROPERTY").unwrap_or(defaults.date_property),
            sort_property: get("NOTION_SORT_PROPERTY").unwrap_or(defaults.sort_property),
            date_window,
        };

        // Default timezone
        let timezone_name = get("TIMEZONE").unwrap_or_else(|| String::from("UTC"));
        let timezone = timezone_name
            .parse::<Tz>()
            .map_err(|_| config_error(&format!("Unknown TIMEZONE '{}'", timezone_name)))?;

        let timeout_secs = parse_number("SYNC_HTTP_TIMEOUT_SECS", get("SYNC_HTTP_TIMEOUT_SECS"), 30)?;
        let max_attempts: u32 = parse_number("SYNC_MAX_ATTEMPTS", get("SYNC_MAX_ATTEMPTS"), 3)?;
        let backoff_ms = parse_number("SYNC_RETRY_BACKOFF_MS", get("SYNC_RETRY_BACKOFF_MS"), 500)?;
        let concurrency: usize = parse_number("SYNC_CONCURRENCY", get("SYNC_CONCURRENCY"), 1)?;

        Ok(Config {
            notion_key,
            notion_database_id,
            calendar_id,
            notion_query,
            timezone,
            credentials_path: get("GOOGLE_CREDENTIALS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("credentials.json")),
            token_path: get("GOOGLE_TOKEN_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("token.json")),
            notion_api_base: get("NOTION_API_BASE")
                .unwrap_or_else(|| DEFAULT_NOTION_API_BASE.to_string()),
            calendar_api_base: get("GOOGLE_CALENDAR_API_BASE")
                .unwrap_or_else(|| DEFAULT_CALENDAR_API_BASE.to_string()),
            oauth_token_uri: get("GOOGLE_TOKEN_URI"),
            request_timeout: Duration::from_secs(timeout_secs),
            max_attempts: max_attempts.max(1),
            retry_backoff: Duration::from_millis(backoff_ms),
            concurrency: concurrency.max(1),
        })
    }

    /// Retry policy for token refreshes and event creation
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.retry_backoff)
    }
}

fn parse_date(key: &str, value: &str) -> SyncResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| config_error(&format!("{} must be a YYYY-MM-DD date, got '{}'", key, value)))
}

/// Parse an unsigned setting; out-of-range values are errors, not truncated
fn parse_number<T: FromStr>(key: &str, value: Option<String>, default: T) -> SyncResult<T> {
    match value {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse::<T>()
            .map_err(|_| config_error(&format!("Invalid {} format: '{}'", key, v))),
    }
}
