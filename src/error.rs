use miette::Diagnostic;
use thiserror::Error;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Environment error: {0}")]
    #[diagnostic(code(notion_calendar_sync::environment))]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(notion_calendar_sync::config))]
    Config(String),

    #[error("Authorization error: {0}")]
    #[diagnostic(
        code(notion_calendar_sync::authorization),
        help("Delete the token cache and run get_calendar_token to authorize again")
    )]
    Authorization(String),

    #[error("Notion query error: {0}")]
    #[diagnostic(code(notion_calendar_sync::notion_query))]
    NotionQuery(String),

    #[error("Invalid Notion record {record_id}: {reason}")]
    #[diagnostic(code(notion_calendar_sync::invalid_record))]
    InvalidRecord { record_id: String, reason: String },

    #[error("Calendar rejected the event: {0}")]
    #[diagnostic(code(notion_calendar_sync::event_rejected))]
    EventRejected(String),

    #[error("Transient failure: {0}")]
    #[diagnostic(code(notion_calendar_sync::transient))]
    Transient(String),

    #[error("Sync finished with {failed} failed event(s) and {rejected} rejected record(s)")]
    #[diagnostic(code(notion_calendar_sync::incomplete))]
    Incomplete { failed: usize, rejected: usize },

    #[error("Interrupted before the sync finished")]
    #[diagnostic(code(notion_calendar_sync::interrupted))]
    Interrupted,

    #[error(transparent)]
    #[diagnostic(code(notion_calendar_sync::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(notion_calendar_sync::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(notion_calendar_sync::other))]
    Other(String),
}

impl Error {
    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient(_))
    }

    /// Whether the failure came from an invalid, expired or revoked credential
    pub fn is_authorization(&self) -> bool {
        matches!(self, Error::Authorization(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type SyncResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Missing environment variable: {}", var))
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create authorization errors
pub fn authorization_error(message: &str) -> Error {
    Error::Authorization(message.to_string())
}

/// Helper to create Notion query errors
pub fn notion_error(message: &str) -> Error {
    Error::NotionQuery(message.to_string())
}

/// Helper to create per-record validation errors
pub fn invalid_record(record_id: &str, reason: &str) -> Error {
    Error::InvalidRecord {
        record_id: record_id.to_string(),
        reason: reason.to_string(),
    }
}

/// Helper to create other errors
pub fn other_error(message: &str) -> Error {
    Error::Other(message.to_string())
}

/// Classify a transport-level reqwest failure.
///
/// Timeouts and connection problems are transient; anything else (a bad URL,
/// a body that failed to decode) is not worth retrying.
pub fn http_error(context: &str, err: reqwest::Error) -> Error {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        Error::Transient(format!("{}: {}", context, err))
    } else {
        Error::Other(format!("{}: {}", context, err))
    }
}
