mod auth;
pub mod models;
pub mod token;
mod writer;

pub use auth::{
    consent_url, parse_callback, AuthenticatedClient, Authorizer, BrowserConsent, ConsentFlow,
    TokenGrant, CALENDAR_SCOPE,
};
pub use models::{CalendarEvent, ClientRegistration, Credential};
pub use token::CredentialStore;
pub use writer::{classify_failure, CalendarWriter};
