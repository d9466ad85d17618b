use super::models::{
    ClientRegistration, Credential, OAuthErrorBody, TokenResponse, DEFAULT_TOKEN_URI,
};
use super::token::CredentialStore;
use crate::config::Config;
use crate::error::{authorization_error, http_error, Error, SyncResult};
use crate::utils::retry::RetryPolicy;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

/// Read/write access to the user's calendars
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

/// How long the browser consent may take before giving up
const CONSENT_TIMEOUT: Duration = Duration::from_secs(300);

/// Refresh access tokens this long before they actually expire
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Tokens handed back by a completed consent flow
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

impl From<TokenResponse> for TokenGrant {
    fn from(response: TokenResponse) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_in: response.expires_in,
        }
    }
}

/// Interactive step that turns a client registration into tokens
#[async_trait]
pub trait ConsentFlow: Send + Sync {
    async fn obtain_grant(
        &self,
        registration: &ClientRegistration,
        scopes: &[&str],
    ) -> SyncResult<TokenGrant>;
}

/// Loopback consent: open the browser and catch the redirect on localhost
#[derive(Clone)]
pub struct BrowserConsent {
    client: Client,
    timeout: Duration,
}

impl BrowserConsent {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            timeout: CONSENT_TIMEOUT,
        }
    }
}

#[async_trait]
impl ConsentFlow for BrowserConsent {
    async fn obtain_grant(
        &self,
        registration: &ClientRegistration,
        scopes: &[&str],
    ) -> SyncResult<TokenGrant> {
        // Port 0 lets the OS pick a free port for the redirect
        let server = tiny_http::Server::http("127.0.0.1:0").map_err(|e| {
            authorization_error(&format!("Failed to start callback listener: {}", e))
        })?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .ok_or_else(|| authorization_error("Callback listener has no TCP address"))?;
        let redirect_uri = format!("http://127.0.0.1:{}", port);

        // Generate random state for security
        let state = uuid::Uuid::new_v4().to_string();
        let auth_url = consent_url(registration, scopes, &redirect_uri, &state)?;

        info!("Opening browser for Google Calendar authorization...");
        if let Err(e) = webbrowser::open(auth_url.as_str()) {
            warn!(error = %e, "Could not open a browser");
        }
        info!(url = %auth_url, "Waiting for authorization callback");

        let timeout = self.timeout;
        let code = tokio::task::spawn_blocking(move || wait_for_code(&server, &state, timeout))
            .await
            .map_err(|e| authorization_error(&format!("Callback listener task failed: {}", e)))??;

        let form = [
            ("client_id", registration.client_id.as_str()),
            ("client_secret", registration.client_secret.as_str()),
            ("code", code.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];
        let response = request_token(&self.client, &registration.token_uri, &form).await?;

        info!("Google Calendar authorization completed");
        Ok(response.into())
    }
}

/// Build the Google consent URL for an offline (refreshable) grant
pub fn consent_url(
    registration: &ClientRegistration,
    scopes: &[&str],
    redirect_uri: &str,
    state: &str,
) -> SyncResult<Url> {
    let scope = scopes.join(" ");
    Url::parse_with_params(
        &registration.auth_uri,
        &[
            ("client_id", registration.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
        ],
    )
    .map_err(|e| authorization_error(&format!("Invalid auth_uri in client registration: {}", e)))
}

/// Inspect a request that hit the callback listener.
///
/// `Ok(None)` means the request was not the OAuth redirect (a favicon fetch,
/// say) and the listener should keep waiting.
pub fn parse_callback(request_path: &str, expected_state: &str) -> SyncResult<Option<String>> {
    let url = Url::parse("http://127.0.0.1")
        .and_then(|base| base.join(request_path))
        .map_err(|e| authorization_error(&format!("Malformed callback request: {}", e)))?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(authorization_error(&format!("Consent was not granted: {}", error)));
    }

    let Some(code) = code else {
        return Ok(None);
    };

    if state.as_deref() != Some(expected_state) {
        return Err(authorization_error("Callback state does not match the request"));
    }

    Ok(Some(code))
}

fn wait_for_code(server: &tiny_http::Server, state: &str, timeout: Duration) -> SyncResult<String> {
    let deadline = Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(authorization_error("Timed out waiting for the authorization callback"));
        }

        let Some(request) = server.recv_timeout(remaining).map_err(listener_error)? else {
            continue;
        };

        let outcome = parse_callback(request.url(), state);
        let message = match &outcome {
            Ok(Some(_)) => "Authorization successful! You can close this window.",
            Ok(None) => {
                let _ = request.respond(tiny_http::Response::empty(tiny_http::StatusCode(404)));
                continue;
            }
            Err(_) => "Authorization failed. Check the terminal for details.",
        };

        if let Err(e) = request.respond(tiny_http::Response::from_string(message)) {
            debug!(error = %e, "failed to answer the callback request");
        }

        return outcome.and_then(|code| {
            code.ok_or_else(|| authorization_error("No authorization code found in callback"))
        });
    }
}

fn listener_error(e: std::io::Error) -> Error {
    authorization_error(&format!("Callback listener failed: {}", e))
}

/// POST a form to the OAuth token endpoint
async fn request_token(
    client: &Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> SyncResult<TokenResponse> {
    let response = client
        .post(token_uri)
        .form(form)
        .send()
        .await
        .map_err(|e| http_error("Failed to reach the token endpoint", e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<OAuthErrorBody>(&body)
            .map(|e| match e.error_description {
                Some(description) => format!("{} ({})", e.error, description),
                None => e.error,
            })
            .unwrap_or(body);

        let message = format!("Token request failed: HTTP {} - {}", status, detail);
        return Err(if status.is_server_error() || status.as_u16() == 429 {
            Error::Transient(message)
        } else {
            Error::Authorization(message)
        });
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| authorization_error(&format!("Failed to parse token response: {}", e)))
}

#[derive(Debug, Clone)]
struct AccessToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn new(token: String, expires_in: Option<i64>) -> Self {
        let expires_in = expires_in.unwrap_or(3600);
        Self {
            token,
            expires_at: Utc::now() + ChronoDuration::seconds(expires_in),
        }
    }

    fn is_fresh(&self) -> bool {
        self.expires_at > Utc::now() + ChronoDuration::seconds(EXPIRY_MARGIN_SECS)
    }
}

/// Google credential able to hand out bearer tokens
pub struct AuthenticatedClient {
    client: Client,
    token_uri: String,
    client_id: String,
    client_secret: String,
    refresh_token: Option<String>,
    access: Mutex<Option<AccessToken>>,
    retry: RetryPolicy,
}

impl AuthenticatedClient {
    /// Wrap a cached credential; no network call happens here
    pub fn from_credential(
        credential: Credential,
        token_uri: impl Into<String>,
        client: Client,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            token_uri: token_uri.into(),
            client_id: credential.client_id,
            client_secret: credential.client_secret,
            refresh_token: Some(credential.refresh_token),
            access: Mutex::new(None),
            retry,
        }
    }

    /// Wrap the tokens of a consent flow that just finished
    pub fn from_grant(
        registration: &ClientRegistration,
        grant: TokenGrant,
        client: Client,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            token_uri: registration.token_uri.clone(),
            client_id: registration.client_id.clone(),
            client_secret: registration.client_secret.clone(),
            refresh_token: grant.refresh_token,
            access: Mutex::new(Some(AccessToken::new(grant.access_token, grant.expires_in))),
            retry,
        }
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Current bearer token, refreshed when missing or about to expire
    pub async fn access_token(&self) -> SyncResult<String> {
        let mut access = self.access.lock().await;
        if let Some(token) = access.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.token.clone());
        }

        let refresh_token = self.refresh_token.as_deref().ok_or_else(|| {
            authorization_error("Access token expired and no refresh token is available")
        })?;

        debug!("refreshing Google access token");
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        let response = self
            .retry
            .run("token refresh", || request_token(&self.client, &self.token_uri, &form))
            .await?;

        let token = AccessToken::new(response.access_token, response.expires_in);
        let bearer = token.token.clone();
        *access = Some(token);
        Ok(bearer)
    }

    /// Drop the cached access token after the API refused it
    pub async fn invalidate(&self) {
        *self.access.lock().await = None;
    }
}

/// Produces an [`AuthenticatedClient`] from the cache or a fresh consent
pub struct Authorizer<F = BrowserConsent> {
    store: CredentialStore,
    flow: F,
    client: Client,
    token_uri: Option<String>,
    retry: RetryPolicy,
}

impl Authorizer<BrowserConsent> {
    /// Authorizer using the interactive browser flow
    pub fn browser(config: &Config, client: Client) -> Self {
        let flow = BrowserConsent::new(client.clone());
        Self::new(config, client, flow)
    }
}

impl<F: ConsentFlow> Authorizer<F> {
    pub fn new(config: &Config, client: Client, flow: F) -> Self {
        Self {
            store: CredentialStore::from_config(config),
            flow,
            client,
            token_uri: config.oauth_token_uri.clone(),
            retry: config.retry_policy(),
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn consent_flow(&self) -> &F {
        &self.flow
    }

    /// Token endpoint for a cached credential: the configured override, else
    /// the registration's `token_uri`, else Google's default
    fn refresh_uri(&self) -> String {
        if let Some(uri) = &self.token_uri {
            return uri.clone();
        }

        match self.store.registration() {
            Ok(registration) => registration.token_uri,
            Err(e) => {
                debug!(error = %e, "no readable client registration, using the default token endpoint");
                DEFAULT_TOKEN_URI.to_string()
            }
        }
    }

    /// Use the cached credential if there is one, otherwise ask the user
    pub async fn authorize(&self) -> SyncResult<AuthenticatedClient> {
        if let Some(credential) = self.store.load() {
            debug!(path = %self.store.token_path().display(), "using cached Google credential");
            return Ok(AuthenticatedClient::from_credential(
                credential,
                self.refresh_uri(),
                self.client.clone(),
                self.retry,
            ));
        }

        info!("No cached Google credential, starting authorization");
        self.reauthorize().await
    }

    /// Always run the consent flow and persist a refreshable result
    pub async fn reauthorize(&self) -> SyncResult<AuthenticatedClient> {
        let registration = self.store.registration()?;
        let grant = self.flow.obtain_grant(&registration, &[CALENDAR_SCOPE]).await?;

        match grant.refresh_token.as_deref() {
            Some(refresh_token) => {
                self.store.save(refresh_token)?;
            }
            None => warn!("Authorization returned no refresh token; it will not be cached"),
        }

        Ok(AuthenticatedClient::from_grant(
            &registration,
            grant,
            self.client.clone(),
            self.retry,
        ))
    }
}
