use notion_calendar_sync::components::{Authorizer, CalendarWriter};
use notion_calendar_sync::startup;

const MAX_RESULTS: u32 = 10;

/// List the next events on the destination calendar
#[tokio::main]
async fn main() -> miette::Result<()> {
    startup::init_logging()?;

    let config = startup::load_config()?;
    let client = startup::build_http_client(&config)?;

    let auth = Authorizer::browser(&config, client.clone()).authorize().await?;
    let writer = CalendarWriter::new(&config, client);
    let events = writer.list_upcoming(&auth, MAX_RESULTS).await?;

    if events.is_empty() {
        println!("No upcoming events found.");
        return Ok(());
    }

    println!("Upcoming {} events on {}:", events.len(), writer.calendar_id());
    for event in &events {
        println!(
            "{} - {}",
            event.start_display(),
            event.summary.as_deref().unwrap_or("(no title)")
        );
    }

    Ok(())
}
