use super::models::{ClientRegistration, Credential, RegistrationFile};
use crate::config::Config;
use crate::error::{authorization_error, SyncResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File-backed cache of the Google authorization
#[derive(Debug, Clone)]
pub struct CredentialStore {
    token_path: PathBuf,
    credentials_path: PathBuf,
}

impl CredentialStore {
    pub fn new(token_path: impl Into<PathBuf>, credentials_path: impl Into<PathBuf>) -> Self {
        Self {
            token_path: token_path.into(),
            credentials_path: credentials_path.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.token_path.clone(), config.credentials_path.clone())
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    /// Read the cached credential. A missing or unreadable cache is `None`.
    pub fn load(&self) -> Option<Credential> {
        let content = match fs::read_to_string(&self.token_path) {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %self.token_path.display(), error = %e, "no cached credential");
                return None;
            }
        };

        match serde_json::from_str::<Credential>(&content) {
            Ok(credential) => Some(credential),
            Err(e) => {
                warn!(path = %self.token_path.display(), error = %e, "ignoring unparsable token cache");
                None
            }
        }
    }

    /// Merge the client registration with `refresh_token` and overwrite the cache
    pub fn save(&self, refresh_token: &str) -> SyncResult<Credential> {
        let registration = self.registration()?;
        let credential = Credential {
            kind: "authorized_user".to_string(),
            client_id: registration.client_id,
            client_secret: registration.client_secret,
            refresh_token: refresh_token.to_string(),
        };

        let payload = serde_json::to_string(&credential)?;
        fs::write(&self.token_path, payload)?;
        info!(path = %self.token_path.display(), "Saved Google credential");

        Ok(credential)
    }

    /// Read the client registration file (`installed` or `web` section)
    pub fn registration(&self) -> SyncResult<ClientRegistration> {
        let content = fs::read_to_string(&self.credentials_path).map_err(|e| {
            authorization_error(&format!(
                "Failed to read client registration {}: {}",
                self.credentials_path.display(),
                e
            ))
        })?;

        let file: RegistrationFile = serde_json::from_str(&content).map_err(|e| {
            authorization_error(&format!(
                "Malformed client registration {}: {}",
                self.credentials_path.display(),
                e
            ))
        })?;

        file.installed.or(file.web).ok_or_else(|| {
            authorization_error(&format!(
                "Client registration {} has neither an 'installed' nor a 'web' section",
                self.credentials_path.display()
            ))
        })
    }
}
