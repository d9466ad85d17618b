use notion_calendar_sync::components::Authorizer;
use notion_calendar_sync::config::Config;
use notion_calendar_sync::error::{other_error, SyncResult};
use notion_calendar_sync::startup;

/// Run the browser consent flow and rewrite the token cache, even if one exists
#[tokio::main]
async fn main() -> miette::Result<()> {
    startup::init_logging()?;

    // Load configuration
    let config = Config::load()?;
    let client = startup::build_http_client(&config)?;
    let authorizer = Authorizer::browser(&config, client);

    println!("Opening browser for Google Calendar authorization...");
    let auth = authorizer.reauthorize().await?;

    check_saved(&auth, &config)?;
    println!(
        "Token successfully saved to {}!",
        authorizer.store().token_path().display()
    );

    Ok(())
}

fn check_saved(
    auth: &notion_calendar_sync::components::AuthenticatedClient,
    config: &Config,
) -> SyncResult<()> {
    if auth.refresh_token().is_none() {
        return Err(other_error(&format!(
            "Google returned no refresh token, so {} was not written. Revoke the app's access in your Google account and try again.",
            config.token_path.display()
        )));
    }
    Ok(())
}
