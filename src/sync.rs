use crate::components::google_calendar::{Authorizer, ConsentFlow};
use crate::components::models::{CreatedEvent, EventDraft, RejectedRecord};
use crate::components::{EntrySource, EventSink};
use crate::error::{Error, SyncResult};
use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

/// A draft the calendar accepted
#[derive(Debug)]
pub struct SyncedEvent {
    pub draft: EventDraft,
    pub event: CreatedEvent,
}

/// A draft the calendar refused or could not be reached for
#[derive(Debug)]
pub struct FailedEvent {
    pub draft: EventDraft,
    pub error: Error,
}

/// Outcome of one run, every entry accounted for in source order
#[derive(Debug, Default)]
pub struct SyncReport {
    pub created: Vec<SyncedEvent>,
    pub failed: Vec<FailedEvent>,
    pub rejected: Vec<RejectedRecord>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.rejected.is_empty()
    }

    /// Turn a report with failures into an error for the process exit
    pub fn into_result(self) -> SyncResult<Self> {
        if self.is_clean() {
            Ok(self)
        } else {
            Err(Error::Incomplete {
                failed: self.failed.len(),
                rejected: self.rejected.len(),
            })
        }
    }

    fn log_summary(&self) {
        for rejected in &self.rejected {
            warn!(record_id = %rejected.record_id, error = %rejected.error, "Rejected Notion entry");
        }
        for failed in &self.failed {
            warn!(summary = %failed.draft.summary, error = %failed.error, "Event was not created");
        }
        info!(
            created = self.created.len(),
            failed = self.failed.len(),
            rejected = self.rejected.len(),
            "Sync finished"
        );
    }
}

/// Authorize, read the source once, and write every draft
pub struct Orchestrator<F, S, W> {
    authorizer: Authorizer<F>,
    source: S,
    writer: W,
    concurrency: usize,
}

impl<F, S, W> Orchestrator<F, S, W>
where
    F: ConsentFlow,
    S: EntrySource,
    W: EventSink,
{
    pub fn new(authorizer: Authorizer<F>, source: S, writer: W) -> Self {
        Self {
            authorizer,
            source,
            writer,
            concurrency: 1,
        }
    }

    /// Allow up to `limit` event creations in flight at once
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    pub fn authorizer(&self) -> &Authorizer<F> {
        &self.authorizer
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Run the pipeline. Only authorization and the source query abort it.
    pub async fn run(&self) -> SyncResult<SyncReport> {
        let client = self.authorizer.authorize().await?;
        let batch = self.source.fetch_entries().await?;

        info!(
            drafts = batch.drafts.len(),
            concurrency = self.concurrency,
            "Creating calendar events"
        );

        let client = &client;
        let writer = &self.writer;
        let outcomes: Vec<(EventDraft, SyncResult<CreatedEvent>)> = stream::iter(batch.drafts)
            .map(|draft| async move {
                let result = writer.create_event(client, &draft).await;
                match &result {
                    Ok(event) => {
                        info!(summary = %draft.summary, link = %event.reference(), "Event created");
                    }
                    Err(e) => {
                        error!(summary = %draft.summary, record_id = %draft.source_id, error = %e, "Failed to create event");
                    }
                }
                (draft, result)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = SyncReport {
            rejected: batch.rejected,
            ..Default::default()
        };

        for (draft, result) in outcomes {
            match result {
                Ok(event) => report.created.push(SyncedEvent { draft, event }),
                Err(error) => report.failed.push(FailedEvent { draft, error }),
            }
        }

        report.log_summary();
        Ok(report)
    }
}
