//! Session lifecycle controller.
//!
//! The collaborator-facing surface: restore on start, login, signup, logout,
//! expiry validation, and read-only observers. The controller owns all
//! session mutation except the refresh step, which [`AuthenticatedFetch`]
//! drives through the same shared core.

use crate::auth_fsm::SessionStatus;
use crate::credential_client::CredentialClient;
use crate::fetch::AuthenticatedFetch;
use crate::session_core::{EndReason, SessionCore};
use crate::session_state::{AuthStateCallback, SessionSnapshot};
use crate::transport::{HttpTransport, ReqwestTransport};
use crate::types::{Navigation, SignupData, User};
use crate::AuthResult;
use chrono::{DateTime, Utc};
use session_config_and_utils::{Config, Paths};
use std::sync::Arc;
use token_storage::{create_token_store, TokenStore};
use tracing::{debug, info};

/// Whether an access token with the given expiry is still usable at `now`.
///
/// Valid only when the expiry is present and strictly in the future.
pub fn token_valid_at(expiry: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expiry.is_some_and(|expiry| expiry > now)
}

/// Orchestrates the session lifecycle.
#[derive(Clone)]
pub struct SessionLifecycleController {
    core: Arc<SessionCore>,
}

impl SessionLifecycleController {
    /// Create a controller over an injected store and client.
    pub fn new(store: TokenStore, client: CredentialClient) -> Self {
        Self {
            core: Arc::new(SessionCore::new(store, client)),
        }
    }

    /// Create a controller with file-backed storage and the reqwest transport.
    pub fn from_config(config: &Config, paths: &Paths) -> AuthResult<Self> {
        let transport = ReqwestTransport::new()?;
        Self::from_config_with_transport(config, paths, Arc::new(transport))
    }

    /// Create a controller with file-backed storage and a custom transport.
    pub fn from_config_with_transport(
        config: &Config,
        paths: &Paths,
        transport: Arc<dyn HttpTransport>,
    ) -> AuthResult<Self> {
        let origin = config.origin()?;
        let store = create_token_store(paths, &origin);
        let client = CredentialClient::from_config(config, transport)?;
        debug!(origin = %origin, base_url = %client.base_url(), "Session controller configured");
        Ok(Self::new(store, client))
    }

    /// Restore the persisted session. Runs once; later calls return the
    /// current status.
    pub async fn initialize(&self) -> SessionStatus {
        self.core.initialize().await
    }

    /// Sign in with a username and password.
    ///
    /// On failure the store and the session are left untouched.
    pub async fn login(&self, username: &str, password: &str) -> AuthResult<Navigation> {
        self.core.login(username, password).await
    }

    /// Create an account, then sign in with the submitted credentials.
    pub async fn signup(&self, data: &SignupData) -> AuthResult<Navigation> {
        self.core.client.create_account(data).await?;
        self.login(&data.username, &data.password).await
    }

    /// Clear the store and the session. Always succeeds, idempotent.
    pub fn logout(&self) -> Navigation {
        self.core.end_session(EndReason::Logout);
        info!("Logged out");
        Navigation::EntryPage
    }

    /// Whether the persisted access token expiry is still in the future.
    pub fn is_token_valid(&self) -> bool {
        token_valid_at(self.core.store.expiry(), Utc::now())
    }

    pub fn status(&self) -> SessionStatus {
        self.core.state.status()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.status().is_loading()
    }

    pub fn user(&self) -> Option<User> {
        self.core.state.snapshot().user
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.core.state.snapshot()
    }

    /// Set a callback to be notified of session status changes.
    pub fn set_state_callback(&self, callback: AuthStateCallback) {
        self.core.state.set_state_callback(callback);
    }

    /// Where a page should redirect, if anywhere.
    ///
    /// Protected pages go to the entry page once the session is known to be
    /// unauthenticated. Nothing redirects while loading.
    pub fn route_guard(&self, requires_auth: bool) -> Option<Navigation> {
        (requires_auth && self.status() == SessionStatus::Unauthenticated)
            .then_some(Navigation::EntryPage)
    }

    /// Handle for issuing protected requests against this session.
    pub fn fetcher(&self) -> AuthenticatedFetch {
        AuthenticatedFetch::new(Arc::clone(&self.core))
    }

    /// Number of token refreshes started by this session.
    pub fn refresh_count(&self) -> u64 {
        self.core.refresh.started()
    }

    /// Whether a token refresh is currently running.
    pub fn is_refreshing(&self) -> bool {
        self.core.refresh.is_in_flight()
    }

    #[cfg(test)]
    pub(crate) fn core(&self) -> &Arc<SessionCore> {
        &self.core
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuthError;
    use chrono::Duration;

    #[test]
    fn test_token_valid_at_boundary() {
        let now = Utc::now();
        assert!(token_valid_at(Some(now + Duration::milliseconds(1)), now));
        assert!(!token_valid_at(Some(now), now));
        assert!(!token_valid_at(Some(now - Duration::seconds(1)), now));
        assert!(!token_valid_at(None, now));
    }

    #[test]
    fn test_from_config_starts_loading() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let config = Config {
            identity_base_url: "http://127.0.0.1:8000/".to_string(),
            ..Config::default()
        };

        let controller = SessionLifecycleController::from_config(&config, &paths).unwrap();
        assert!(controller.is_loading());
        assert!(!controller.is_token_valid());
        assert_eq!(controller.route_guard(true), None);
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let config = Config {
            identity_base_url: "not a url".to_string(),
            ..Config::default()
        };

        assert!(matches!(
            SessionLifecycleController::from_config(&config, &paths),
            Err(AuthError::Config(_)) | Err(AuthError::InvalidUrl(_))
        ));
    }
}
