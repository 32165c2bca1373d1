//! Shared internals behind the controller and the fetch wrapper.

use crate::auth_fsm::{AuthMachineInput, SessionStatus};
use crate::credential_client::CredentialClient;
use crate::refresh::RefreshCoordinator;
use crate::session_state::{Session, SessionState};
use crate::types::{Navigation, User};
use crate::{AuthError, AuthResult};
use chrono::Utc;
use std::sync::Arc;
use token_storage::TokenStore;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Why a session is being ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EndReason {
    /// The user asked to log out.
    Logout,
    /// Refresh was rejected or no credentials remain.
    Revoked,
}

pub(crate) struct SessionCore {
    pub(crate) state: SessionState,
    pub(crate) store: TokenStore,
    pub(crate) client: CredentialClient,
    pub(crate) refresh: RefreshCoordinator,
    initialized: OnceCell<()>,
}

impl SessionCore {
    pub(crate) fn new(store: TokenStore, client: CredentialClient) -> Self {
        Self {
            state: SessionState::new(),
            store,
            client,
            refresh: RefreshCoordinator::default(),
            initialized: OnceCell::new(),
        }
    }

    /// Run the restore flow once. Concurrent callers wait for the first.
    pub(crate) async fn initialize(self: &Arc<Self>) -> SessionStatus {
        self.initialized
            .get_or_init(|| async {
                self.restore().await;
            })
            .await;
        self.state.status()
    }

    async fn restore(self: &Arc<Self>) {
        let persisted = self.store.snapshot();
        let now = Utc::now();

        let refresh_token = persisted.refresh_token;
        let (access_token, expiry) = match (persisted.access_token, persisted.expiry) {
            (Some(token), Some(expiry)) if expiry > now => (token, expiry),
            (token, expiry) => {
                debug!(
                    has_token = token.is_some(),
                    has_expiry = expiry.is_some(),
                    "No valid stored session"
                );
                self.fail_restore();
                return;
            }
        };

        let hydrated = self.state.transition_with(
            AuthMachineInput::Start,
            |_| None,
            |session| {
                session.refresh_token = refresh_token;
                session.set_access_token(access_token.clone(), expiry);
            },
        );
        if let Err(e) = hydrated {
            debug!(error = %e, "Session already settled, skipping restore");
            return;
        }

        match self.restore_profile(&access_token).await {
            Ok(user) => {
                let user_id = user.id.clone();
                match self.state.transition_with(
                    AuthMachineInput::Restored,
                    |_| None,
                    |session| session.user = Some(user),
                ) {
                    Ok(_) => info!(user_id = %user_id, "Session restored"),
                    Err(e) => debug!(error = %e, "Restore outcome superseded"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Session restore failed");
                self.fail_restore();
            }
        }
    }

    /// Profile for the stored token, refreshing once on 401.
    async fn restore_profile(self: &Arc<Self>, access_token: &str) -> AuthResult<User> {
        match self.client.fetch_profile(access_token).await {
            Err(AuthError::Unauthorized) => {
                debug!("Stored access token rejected, refreshing");
                let token = self.refresh_access_token(Some(access_token)).await?;
                self.client.fetch_profile(&token).await
            }
            other => other,
        }
    }

    /// Leave the restore flow unauthenticated with an empty store.
    fn fail_restore(&self) {
        // From Uninitialized, pass through Restoring so the machine records
        // the attempt.
        let _ = self
            .state
            .transition_with(AuthMachineInput::Start, |_| None, |_| {});

        let store = &self.store;
        if let Err(e) = self.state.transition_with(
            AuthMachineInput::RestoreFailed,
            |_| None,
            |session| {
                store.clear();
                session.clear();
            },
        ) {
            debug!(error = %e, "Restore outcome superseded");
        }
    }

    pub(crate) async fn login(&self, username: &str, password: &str) -> AuthResult<Navigation> {
        let grant = self.client.login(username, password).await?;

        let store = &self.store;
        self.state.transition_with(
            AuthMachineInput::LoginSucceeded,
            |_| Some(Navigation::Dashboard),
            |session| {
                if let Err(e) =
                    store.persist_login(&grant.access_token, &grant.refresh_token, grant.expires_at)
                {
                    warn!(error = %e, "Failed to persist tokens, session will not survive a restart");
                }
                session.user = Some(grant.user.clone());
                session.refresh_token = Some(grant.refresh_token.clone());
                session.set_access_token(grant.access_token.clone(), grant.expires_at);
            },
        )?;

        Ok(Navigation::Dashboard)
    }

    /// Clear the store and the session. Never fails.
    pub(crate) fn end_session(&self, reason: EndReason) {
        self.end_session_when(reason, |_| true);
    }

    /// End the session only if it still holds `refresh_token`.
    pub(crate) fn end_session_if_refresh_token(&self, refresh_token: &str) -> bool {
        self.end_session_when(EndReason::Revoked, |session| {
            session.refresh_token.as_deref() == Some(refresh_token)
        })
    }

    fn end_session_when(&self, reason: EndReason, guard: impl FnOnce(&Session) -> bool) -> bool {
        let input = match reason {
            EndReason::Logout => AuthMachineInput::LogoutRequested,
            EndReason::Revoked => AuthMachineInput::SessionRevoked,
        };
        let store = &self.store;

        match self.state.transition_when(
            input,
            guard,
            |old| match reason {
                EndReason::Logout => Some(Navigation::EntryPage),
                EndReason::Revoked => {
                    (old == SessionStatus::Authenticated).then_some(Navigation::EntryPage)
                }
            },
            |session| {
                store.clear();
                session.clear();
            },
        ) {
            Ok(Some(_)) => {
                info!(reason = ?reason, "Session ended");
                true
            }
            Ok(None) => false,
            Err(e) => {
                // Every state accepts both end inputs.
                warn!(error = %e, "Failed to end session");
                false
            }
        }
    }
}
