#![allow(dead_code)]

use async_trait::async_trait;
use notion_calendar_sync::components::google_calendar::{ClientRegistration, ConsentFlow, TokenGrant};
use notion_calendar_sync::config::Config;
use notion_calendar_sync::error::SyncResult;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

/// Config pointing every remote endpoint at `server_uri` and every file into `dir`
pub fn test_config(dir: &Path, server_uri: &str) -> Config {
    test_config_without(dir, server_uri, &[])
}

/// Like [`test_config`], with the `omit` variables left unset
pub fn test_config_without(dir: &Path, server_uri: &str, omit: &[&str]) -> Config {
    let omit: Vec<String> = omit.iter().map(|k| k.to_string()).collect();
    let token_path = dir.join("token.json").display().to_string();
    let credentials_path = dir.join("credentials.json").display().to_string();
    let server_uri = server_uri.to_string();

    Config::from_lookup(move |key| {
        if omit.iter().any(|k| k == key) {
            return None;
        }
        let value = match key {
            "NOTION_KEY" => "secret_test".to_string(),
            "NOTION_DATABASE_ID" => "db-1".to_string(),
            "CALENDARID" => "primary".to_string(),
            "NOTION_API_BASE" => format!("{}/v1", server_uri),
            "GOOGLE_CALENDAR_API_BASE" => format!("{}/calendar/v3", server_uri),
            "GOOGLE_TOKEN_URI" => format!("{}/token", server_uri),
            "GOOGLE_TOKEN_PATH" => token_path.clone(),
            "GOOGLE_CREDENTIALS_PATH" => credentials_path.clone(),
            "SYNC_MAX_ATTEMPTS" => "2".to_string(),
            "SYNC_RETRY_BACKOFF_MS" => "0".to_string(),
            _ => return None,
        };
        Some(value)
    })
    .expect("test config")
}

/// Write an installed-app `credentials.json`
pub fn write_registration(dir: &Path, token_uri: &str) {
    let content = json!({
        "installed": {
            "client_id": "client-123.apps.googleusercontent.com",
            "client_secret": "client-secret",
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": token_uri,
            "redirect_uris": ["http://localhost"],
        }
    });
    fs::write(dir.join("credentials.json"), content.to_string()).expect("write credentials.json");
}

/// Write a token cache as a previous successful run would have
pub fn write_token_cache(dir: &Path, refresh_token: &str) {
    let content = json!({
        "type": "authorized_user",
        "client_id": "client-123.apps.googleusercontent.com",
        "client_secret": "client-secret",
        "refresh_token": refresh_token,
    });
    fs::write(dir.join("token.json"), content.to_string()).expect("write token.json");
}

/// Consent flow stand-in that counts how often the user would be prompted
pub struct CountingConsent {
    calls: AtomicUsize,
    refresh_token: Option<String>,
}

impl CountingConsent {
    pub fn granting(refresh_token: Option<&str>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            refresh_token: refresh_token.map(str::to_string),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConsentFlow for CountingConsent {
    async fn obtain_grant(
        &self,
        _registration: &ClientRegistration,
        _scopes: &[&str],
    ) -> SyncResult<TokenGrant> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(TokenGrant {
            access_token: "fresh-access-token".to_string(),
            refresh_token: self.refresh_token.clone(),
            expires_in: Some(3600),
        })
    }
}

/// A Notion page as returned by `databases/{id}/query`
pub fn notion_page(id: &str, title: Option<&str>, status: &str, start: Option<&str>, end: Option<&str>) -> Value {
    let mut properties = json!({
        "Status": { "id": "st", "type": "select", "select": { "name": status } },
        "Created time": { "id": "ct", "type": "created_time", "created_time": "2024-09-01T00:00:00.000Z" },
    });

    if let Some(title) = title {
        properties["Name"] = json!({
            "id": "title",
            "type": "title",
            "title": [{ "type": "text", "plain_text": title }],
        });
    }

    properties["Start Date"] = match start {
        Some(start) => json!({
            "id": "sd",
            "type": "date",
            "date": { "start": start, "end": end, "time_zone": null },
        }),
        None => json!({ "id": "sd", "type": "date", "date": null }),
    };

    json!({
        "object": "page",
        "id": id,
        "url": format!("https://x/{}", id),
        "created_time": "2024-09-01T00:00:00.000Z",
        "properties": properties,
    })
}

/// Wrap pages in a query response body
pub fn query_response(pages: Vec<Value>, has_more: bool) -> Value {
    json!({
        "object": "list",
        "results": pages,
        "has_more": has_more,
        "next_cursor": if has_more { Value::from("cursor-2") } else { Value::Null },
    })
}

/// In-memory log sink for a test-local subscriber
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Route this thread's logs into a buffer until the guard drops
pub fn capture_logs() -> (LogBuffer, DefaultGuard) {
    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}
