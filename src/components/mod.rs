use crate::error::SyncResult;
use async_trait::async_trait;

// Export components
pub mod google_calendar;
pub mod models;
pub mod notion;

pub use google_calendar::{AuthenticatedClient, Authorizer, CalendarWriter, CredentialStore};
pub use models::{CreatedEvent, EventDraft, EventTime, RejectedRecord, SourceBatch};
pub use notion::SourceReader;

/// Where event drafts come from
#[async_trait]
pub trait EntrySource: Send + Sync {
    /// Fetch the current batch of drafts, in source order
    async fn fetch_entries(&self) -> SyncResult<SourceBatch>;
}

/// Where event drafts are written to
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Create one calendar event for `draft`
    async fn create_event(
        &self,
        client: &AuthenticatedClient,
        draft: &EventDraft,
    ) -> SyncResult<CreatedEvent>;
}
