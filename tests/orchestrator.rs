mod common;

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{
    capture_logs, notion_page, query_response, test_config, write_token_cache, CountingConsent,
    LogBuffer,
};
use notion_calendar_sync::components::{
    AuthenticatedClient, Authorizer, CalendarWriter, CreatedEvent, EntrySource, EventDraft,
    EventSink, EventTime, RejectedRecord, SourceBatch, SourceReader,
};
use notion_calendar_sync::config::Config;
use notion_calendar_sync::error::{invalid_record, Error, SyncResult};
use notion_calendar_sync::sync::Orchestrator;
use reqwest::Client;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn draft(summary: &str) -> EventDraft {
    let day = NaiveDate::from_ymd_opt(2024, 9, 6).unwrap();
    EventDraft {
        source_id: format!("id-{}", summary),
        summary: summary.to_string(),
        description: format!("https://x/{}", summary),
        start: EventTime::Date(day),
        end: EventTime::Date(day),
    }
}

/// Source returning the same drafts on every call
struct FixedSource {
    summaries: Vec<&'static str>,
    rejected: Vec<&'static str>,
    calls: AtomicUsize,
}

impl FixedSource {
    fn new(summaries: Vec<&'static str>) -> Self {
        Self {
            summaries,
            rejected: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EntrySource for FixedSource {
    async fn fetch_entries(&self) -> SyncResult<SourceBatch> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(SourceBatch {
            drafts: self.summaries.iter().map(|s| draft(s)).collect(),
            rejected: self
                .rejected
                .iter()
                .map(|id| RejectedRecord {
                    record_id: id.to_string(),
                    error: invalid_record(id, "title is empty"),
                })
                .collect(),
        })
    }
}

/// Sink recording every creation attempt
#[derive(Default)]
struct RecordingSink {
    attempts: Mutex<Vec<String>>,
    fail_on: Vec<&'static str>,
    /// Make earlier drafts finish last
    stagger: bool,
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn create_event(
        &self,
        _client: &AuthenticatedClient,
        draft: &EventDraft,
    ) -> SyncResult<CreatedEvent> {
        let index = {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push(draft.summary.clone());
            attempts.len()
        };

        if self.stagger {
            tokio::time::sleep(Duration::from_millis(60u64.saturating_sub(index as u64 * 20))).await;
        }

        if self.fail_on.contains(&draft.summary.as_str()) {
            return Err(Error::EventRejected(format!("{} refused", draft.summary)));
        }

        Ok(CreatedEvent {
            id: format!("evt-{}", draft.summary),
            html_link: None,
        })
    }
}

fn cached_config(dir: &TempDir) -> Config {
    write_token_cache(dir.path(), "cached-refresh");
    test_config(dir.path(), "http://127.0.0.1:9")
}

fn authorizer(config: &Config) -> Authorizer<CountingConsent> {
    Authorizer::new(config, Client::new(), CountingConsent::granting(None))
}

fn created_summaries(report: &notion_calendar_sync::sync::SyncReport) -> Vec<&str> {
    report.created.iter().map(|c| c.draft.summary.as_str()).collect()
}

#[tokio::test]
async fn test_every_draft_is_written_in_order() {
    let dir = TempDir::new().unwrap();
    let config = cached_config(&dir);
    let orchestrator = Orchestrator::new(
        authorizer(&config),
        FixedSource::new(vec!["one", "two", "three"]),
        RecordingSink::default(),
    );

    let report = orchestrator.run().await.unwrap();

    assert!(report.is_clean());
    assert_eq!(created_summaries(&report), ["one", "two", "three"]);
    assert_eq!(report.created[0].event.id, "evt-one");
}

#[tokio::test]
async fn test_one_failure_does_not_stop_the_rest() {
    let dir = TempDir::new().unwrap();
    let config = cached_config(&dir);
    let mut source = FixedSource::new(vec!["one", "two", "three"]);
    source.rejected = vec!["bad-page"];
    let sink = RecordingSink {
        fail_on: vec!["two"],
        ..Default::default()
    };

    let report = Orchestrator::new(authorizer(&config), source, sink)
        .run()
        .await
        .unwrap();

    assert_eq!(created_summaries(&report), ["one", "three"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].draft.summary, "two");
    assert!(matches!(report.failed[0].error, Error::EventRejected(_)));
    assert_eq!(report.rejected[0].record_id, "bad-page");

    match report.into_result() {
        Err(Error::Incomplete { failed, rejected }) => {
            assert_eq!(failed, 1);
            assert_eq!(rejected, 1);
        }
        other => panic!("expected Incomplete, got {:?}", other.map(|r| r.created.len())),
    }
}

#[tokio::test]
async fn test_concurrent_writes_keep_source_order() {
    let dir = TempDir::new().unwrap();
    let config = cached_config(&dir);
    let sink = RecordingSink {
        stagger: true,
        ..Default::default()
    };

    let report = Orchestrator::new(
        authorizer(&config),
        FixedSource::new(vec!["first", "second", "third"]),
        sink,
    )
    .with_concurrency(3)
    .run()
    .await
    .unwrap();

    assert_eq!(created_summaries(&report), ["first", "second", "third"]);
}

#[tokio::test]
async fn test_repeated_runs_create_duplicates() {
    let dir = TempDir::new().unwrap();
    let config = cached_config(&dir);
    let orchestrator = Orchestrator::new(
        authorizer(&config),
        FixedSource::new(vec!["Write report"]),
        RecordingSink::default(),
    );

    orchestrator.run().await.unwrap();
    orchestrator.run().await.unwrap();

    // Nothing remembers what a previous run created
    let attempts = orchestrator.writer().attempts.lock().unwrap().clone();
    assert_eq!(attempts, ["Write report", "Write report"]);
}

#[tokio::test]
async fn test_authorization_failure_aborts_before_reading() {
    let dir = TempDir::new().unwrap();
    // Neither a token cache nor a client registration
    let config = test_config(dir.path(), "http://127.0.0.1:9");
    let orchestrator = Orchestrator::new(
        authorizer(&config),
        FixedSource::new(vec!["one"]),
        RecordingSink::default(),
    );

    let err = orchestrator.run().await.err().expect("run should fail");

    assert!(err.is_authorization());
    assert_eq!(orchestrator.source().calls.load(Ordering::SeqCst), 0);
    assert!(orchestrator.writer().attempts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_end_to_end_sync() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/databases/db-1/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(query_response(
            vec![
                notion_page(
                    "1",
                    Some("Write report"),
                    "Active Queue",
                    Some("2024-09-06T10:00:00+08:00"),
                    Some("2024-09-06T11:00:00+08:00"),
                ),
                notion_page(
                    "2",
                    Some("Review PR"),
                    "inactive",
                    Some("2024-09-07T10:00:00+08:00"),
                    Some("2024-09-07T11:00:00+08:00"),
                ),
            ],
            false,
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.e2e",
            "expires_in": 3600,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/calendar/v3/calendars/primary/events"))
        .and(body_partial_json(json!({
            "summary": "Write report",
            "description": "https://x/1",
            "start": { "dateTime": "2024-09-06T10:00:00+08:00" },
            "end": { "dateTime": "2024-09-06T11:00:00+08:00" },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "evt-1",
            "htmlLink": "https://calendar.example/evt-1",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    write_token_cache(dir.path(), "cached-refresh");
    let config = test_config(dir.path(), &server.uri());
    let client = Client::new();

    let orchestrator = Orchestrator::new(
        Authorizer::new(&config, client.clone(), CountingConsent::granting(None)),
        SourceReader::new(&config, client.clone()),
        CalendarWriter::new(&config, client),
    );
    let report = orchestrator.run().await.unwrap();

    assert!(report.is_clean());
    assert_eq!(created_summaries(&report), ["Write report"]);
    assert_eq!(report.created[0].event.reference(), "https://calendar.example/evt-1");
    assert_eq!(orchestrator.authorizer().consent_flow().calls(), 0);
}

/// Sink that snapshots the log each time it is called
struct LogSnapshotSink {
    logs: LogBuffer,
    snapshots: Mutex<Vec<String>>,
}

#[async_trait]
impl EventSink for LogSnapshotSink {
    async fn create_event(
        &self,
        _client: &AuthenticatedClient,
        draft: &EventDraft,
    ) -> SyncResult<CreatedEvent> {
        self.snapshots.lock().unwrap().push(self.logs.contents());
        Ok(CreatedEvent {
            id: format!("evt-{}", draft.summary),
            html_link: None,
        })
    }
}

#[tokio::test]
async fn test_each_outcome_is_logged_as_it_completes() {
    let (logs, _guard) = capture_logs();

    let dir = TempDir::new().unwrap();
    let config = cached_config(&dir);
    let sink = LogSnapshotSink {
        logs: logs.clone(),
        snapshots: Mutex::new(Vec::new()),
    };
    let orchestrator = Orchestrator::new(
        authorizer(&config),
        FixedSource::new(vec!["first", "second"]),
        sink,
    );

    orchestrator.run().await.unwrap();

    let snapshots = orchestrator.writer().snapshots.lock().unwrap().clone();
    assert_eq!(snapshots.len(), 2);
    assert!(!snapshots[0].contains("Event created"));
    // The first event is reported before the second is attempted
    assert!(snapshots[1].contains("Event created"));
    assert!(snapshots[1].contains("first"));
    assert!(!snapshots[1].contains("Sync finished"));
}
