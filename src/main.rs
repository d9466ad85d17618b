use notion_calendar_sync::startup;
use tracing::info;

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize logging
    startup::init_logging()?;

    info!("Starting notion-calendar-sync");

    // Load configuration
    let config = startup::load_config()?;

    // Run one sync
    startup::run_sync(config).await
}
