//! Single-flight access token refresh.
//!
//! At most one refresh runs per session. It runs as a spawned task so its
//! outcome is applied to the store and the session even if every caller
//! waiting on it is dropped. Waiters share the result through a
//! [`Shared`] future.

use crate::session_core::{EndReason, SessionCore};
use crate::{AuthError, AuthResult};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cloneable refresh outcome shared by every waiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RefreshFailure {
    /// Refresh token rejected; the session has been ended.
    Rejected(String),
    /// Transient failure; the session is intact.
    Network(String),
    /// The identity service answered with something unusable.
    Malformed(String),
    /// The session ended while the refresh was in flight.
    SessionEnded,
}

impl From<AuthError> for RefreshFailure {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::RefreshRejected(message) => RefreshFailure::Rejected(message),
            AuthError::SessionExpired => RefreshFailure::SessionEnded,
            AuthError::NetworkError(message) => RefreshFailure::Network(message),
            AuthError::MalformedResponse(message) => RefreshFailure::Malformed(message),
            err => RefreshFailure::Malformed(err.to_string()),
        }
    }
}

impl From<RefreshFailure> for AuthError {
    fn from(failure: RefreshFailure) -> Self {
        match failure {
            RefreshFailure::Rejected(message) => AuthError::RefreshRejected(message),
            RefreshFailure::Network(message) => AuthError::NetworkError(message),
            RefreshFailure::Malformed(message) => AuthError::MalformedResponse(message),
            RefreshFailure::SessionEnded => AuthError::SessionExpired,
        }
    }
}

type RefreshOutcome = Result<String, RefreshFailure>;
type InFlight = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Holds the in-flight refresh, if any.
#[derive(Default)]
pub(crate) struct RefreshCoordinator {
    in_flight: Mutex<Option<InFlight>>,
    started: AtomicU64,
}

impl RefreshCoordinator {
    /// Number of refreshes started since construction.
    pub(crate) fn started(&self) -> u64 {
        self.started.load(Ordering::SeqCst)
    }

    pub(crate) fn is_in_flight(&self) -> bool {
        running(&self.in_flight.lock()).is_some()
    }
}

/// The slot's refresh, unless it already settled. A task cancelled before
/// its first poll never runs its guard and leaves a settled entry behind.
fn running(slot: &Option<InFlight>) -> Option<&InFlight> {
    slot.as_ref().filter(|refresh| refresh.peek().is_none())
}

/// Clears the in-flight slot when the refresh task finishes, even by panic.
struct InFlightGuard<'a>(&'a RefreshCoordinator);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.lock().take();
    }
}

impl SessionCore {
    /// Get a fresh access token, joining the in-flight refresh if there is one.
    ///
    /// `stale_token` is the access token the caller saw rejected. When no
    /// refresh is running and the session already holds a different token,
    /// that token is returned without a new refresh.
    pub(crate) async fn refresh_access_token(
        self: &Arc<Self>,
        stale_token: Option<&str>,
    ) -> AuthResult<String> {
        let in_flight = {
            let mut slot = self.refresh.in_flight.lock();
            match running(&slot) {
                Some(existing) => {
                    debug!("Joining in-flight token refresh");
                    existing.clone()
                }
                None => {
                    match (self.state.access_token(), stale_token) {
                        (Some(current), Some(stale)) if stale != current => {
                            debug!("Access token already replaced, skipping refresh");
                            return Ok(current);
                        }
                        (None, Some(_)) => {
                            debug!("Session ended before refresh, skipping refresh");
                            return Err(AuthError::SessionExpired);
                        }
                        _ => {}
                    }

                    self.refresh.started.fetch_add(1, Ordering::SeqCst);
                    let core = Arc::clone(self);
                    let task = tokio::spawn(async move { core.run_refresh().await });
                    let shared = async move {
                        match task.await {
                            Ok(outcome) => outcome,
                            Err(e) => Err(RefreshFailure::Network(format!(
                                "refresh task failed: {}",
                                e
                            ))),
                        }
                    }
                    .boxed()
                    .shared();

                    *slot = Some(shared.clone());
                    shared
                }
            }
        };

        in_flight.await.map_err(AuthError::from)
    }

    async fn run_refresh(self: Arc<Self>) -> RefreshOutcome {
        let _guard = InFlightGuard(&self.refresh);
        self.perform_refresh().await
    }

    /// One refresh exchange, with its outcome applied before returning.
    async fn perform_refresh(&self) -> RefreshOutcome {
        let Some(refresh_token) = self.state.refresh_token() else {
            warn!("No refresh token available, ending session");
            self.end_session(EndReason::Revoked);
            return Err(RefreshFailure::Rejected(
                "no refresh token available".to_string(),
            ));
        };

        match self.client.refresh(&refresh_token).await {
            Ok(grant) => {
                let store = &self.store;
                let applied = self.state.update_when(
                    |session| session.refresh_token.as_deref() == Some(refresh_token.as_str()),
                    |session| {
                        if let Err(e) = store.persist_refresh(&grant.access_token, grant.expires_at) {
                            warn!(error = %e, "Failed to persist refreshed access token");
                        }
                        session.set_access_token(grant.access_token.clone(), grant.expires_at);
                    },
                );

                if applied {
                    info!(expires_at = %grant.expires_at, "Access token refreshed");
                    Ok(grant.access_token)
                } else {
                    debug!("Session changed during refresh, discarding result");
                    self.state
                        .access_token()
                        .ok_or(RefreshFailure::SessionEnded)
                }
            }
            Err(AuthError::RefreshRejected(message)) => {
                if self.end_session_if_refresh_token(&refresh_token) {
                    warn!(reason = %message, "Refresh token rejected, session ended");
                    Err(RefreshFailure::Rejected(message))
                } else {
                    debug!("Refresh rejected for a superseded session, ignoring");
                    self.state
                        .access_token()
                        .ok_or(RefreshFailure::SessionEnded)
                }
            }
            Err(e) => {
                warn!(error = %e, transient = e.is_transient(), "Token refresh failed, session kept");
                Err(RefreshFailure::from(e))
            }
        }
    }
}
