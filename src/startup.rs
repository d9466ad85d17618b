use crate::components::{Authorizer, CalendarWriter, SourceReader};
use crate::config::Config;
use crate::error::{other_error, Error, SyncResult};
use crate::shutdown;
use crate::sync::Orchestrator;
use reqwest::Client;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load the application config, logging why it failed
pub fn load_config() -> miette::Result<Config> {
    match Config::load() {
        Ok(config) => Ok(config),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Shared HTTP client; every request gets the configured timeout
pub fn build_http_client(config: &Config) -> SyncResult<Client> {
    Client::builder()
        .timeout(config.request_timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| other_error(&format!("Failed to build HTTP client: {}", e)))
}

/// Build the components and run one sync, stopping early on a signal
pub async fn run_sync(config: Config) -> miette::Result<()> {
    let client = build_http_client(&config)?;

    let orchestrator = Orchestrator::new(
        Authorizer::browser(&config, client.clone()),
        SourceReader::new(&config, client.clone()),
        CalendarWriter::new(&config, client),
    )
    .with_concurrency(config.concurrency);

    info!(calendar_id = %config.calendar_id, "Starting Notion to Google Calendar sync");

    tokio::select! {
        result = orchestrator.run() => {
            let report = result?;
            report.into_result()?;
            Ok(())
        }
        _ = shutdown::wait_for_signal() => {
            Err(Error::Interrupted.into())
        }
    }
}
