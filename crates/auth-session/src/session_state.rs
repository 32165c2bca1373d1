//! In-memory session state.
//!
//! The lifecycle FSM and the session fields live behind one lock, so every
//! observer sees a status together with the fields that belong to it.

use crate::auth_fsm::{
    AuthMachine, AuthMachineInput, AuthStateChangedPayload, SessionStatus,
};
use crate::types::{Navigation, User};
use crate::{AuthError, AuthResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Callback type for session status notifications.
pub type AuthStateCallback = Box<dyn Fn(AuthStateChangedPayload) + Send + Sync>;

/// The tokens and identity of the current session.
///
/// `access_token` and `access_token_expiry` are always set and cleared together.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user: Option<User>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub access_token_expiry: Option<DateTime<Utc>>,
}

impl Session {
    pub(crate) fn set_access_token(&mut self, token: String, expiry: DateTime<Utc>) {
        self.access_token = Some(token);
        self.access_token_expiry = Some(expiry);
    }

    pub(crate) fn clear(&mut self) {
        *self = Session::default();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("has_access_token", &self.access_token.is_some())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("access_token_expiry", &self.access_token_expiry)
            .finish()
    }
}

/// Read-only view handed to the rest of the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub user: Option<User>,
    pub access_token_expiry: Option<DateTime<Utc>>,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.status.is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.status.is_loading()
    }
}

struct Inner {
    machine: AuthMachine,
    session: Session,
}

pub(crate) struct SessionState {
    inner: Mutex<Inner>,
    callback: Mutex<Option<Arc<dyn Fn(AuthStateChangedPayload) + Send + Sync>>>,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                machine: AuthMachine::new(),
                session: Session::default(),
            }),
            callback: Mutex::new(None),
        }
    }

    pub(crate) fn set_state_callback(&self, callback: AuthStateCallback) {
        *self.callback.lock() = Some(Arc::from(callback));
    }

    pub(crate) fn status(&self) -> SessionStatus {
        SessionStatus::from(self.inner.lock().machine.state())
    }

    #[cfg(test)]
    pub(crate) fn session(&self) -> Session {
        self.inner.lock().session.clone()
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock();
        SessionSnapshot {
            status: SessionStatus::from(inner.machine.state()),
            user: inner.session.user.clone(),
            access_token_expiry: inner.session.access_token_expiry,
        }
    }

    pub(crate) fn access_token(&self) -> Option<String> {
        self.inner.lock().session.access_token.clone()
    }

    pub(crate) fn refresh_token(&self) -> Option<String> {
        self.inner.lock().session.refresh_token.clone()
    }

    /// Apply `input` and, if the machine accepts it, `mutate` the session
    /// under the same lock.
    ///
    /// `navigate` receives the previous status and decides whether the
    /// notification carries a navigation target. Subscribers are notified
    /// outside the lock when the status changed or a target was chosen.
    pub(crate) fn transition_with(
        &self,
        input: AuthMachineInput,
        navigate: impl FnOnce(SessionStatus) -> Option<Navigation>,
        mutate: impl FnOnce(&mut Session),
    ) -> AuthResult<SessionStatus> {
        self.transition_when(input, |_| true, navigate, mutate)?
            .ok_or_else(|| AuthError::InvalidStateTransition("guard rejected".to_string()))
    }

    /// Like [`transition_with`](Self::transition_with), but only when `guard`
    /// holds for the current session. Returns `Ok(None)` when it does not.
    pub(crate) fn transition_when(
        &self,
        input: AuthMachineInput,
        guard: impl FnOnce(&Session) -> bool,
        navigate: impl FnOnce(SessionStatus) -> Option<Navigation>,
        mutate: impl FnOnce(&mut Session),
    ) -> AuthResult<Option<SessionStatus>> {
        let mut inner = self.inner.lock();
        if !guard(&inner.session) {
            return Ok(None);
        }

        let old_status = SessionStatus::from(inner.machine.state());

        inner.machine.consume(&input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                inner.machine.state()
            ))
        })?;
        mutate(&mut inner.session);

        let new_status = SessionStatus::from(inner.machine.state());
        let navigate_to = navigate(old_status);
        let payload = AuthStateChangedPayload {
            status: new_status,
            user_id: inner.session.user.as_ref().map(|u| u.id.clone()),
            username: inner.session.user.as_ref().map(|u| u.username.clone()),
            navigate_to,
        };
        drop(inner);

        if old_status != new_status {
            debug!(
                old_state = ?old_status,
                new_state = ?new_status,
                input = ?input,
                "Session state transition"
            );
        }
        if old_status != new_status || navigate_to.is_some() {
            self.notify(payload);
        }

        Ok(Some(new_status))
    }

    /// Mutate the session without a lifecycle transition, only when `guard`
    /// holds. Returns whether the mutation ran.
    pub(crate) fn update_when(
        &self,
        guard: impl FnOnce(&Session) -> bool,
        mutate: impl FnOnce(&mut Session),
    ) -> bool {
        let mut inner = self.inner.lock();
        if !guard(&inner.session) {
            return false;
        }
        mutate(&mut inner.session);
        true
    }

    fn notify(&self, payload: AuthStateChangedPayload) {
        let callback = self.callback.lock().clone();
        if let Some(callback) = callback {
            callback(payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user() -> User {
        User {
            id: "42".to_string(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            first_name: String::new(),
            last_name: String::new(),
        }
    }

    #[test]
    fn test_new_state_is_loading_and_empty() {
        let state = SessionState::new();
        let snapshot = state.snapshot();
        assert!(snapshot.is_loading());
        assert_eq!(snapshot.user, None);
        assert_eq!(state.session(), Session::default());
    }

    #[test]
    fn test_rejected_transition_does_not_mutate() {
        let state = SessionState::new();
        let result = state.transition_with(
            AuthMachineInput::Restored,
            |_| None,
            |session| session.user = Some(user()),
        );

        assert!(matches!(result, Err(AuthError::InvalidStateTransition(_))));
        assert_eq!(state.session().user, None);
    }

    #[test]
    fn test_callback_receives_changes() {
        let state = SessionState::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        state.set_state_callback(Box::new(move |payload| sink.lock().push(payload)));

        state
            .transition_with(
                AuthMachineInput::LoginSucceeded,
                |_| Some(Navigation::Dashboard),
                |session| {
                    session.user = Some(user());
                    session.set_access_token("a".into(), Utc::now() + Duration::minutes(30));
                },
            )
            .unwrap();
        state
            .transition_with(AuthMachineInput::LogoutRequested, |_| None, Session::clear)
            .unwrap();
        // No status change and no navigation: silent.
        state
            .transition_with(AuthMachineInput::SessionRevoked, |_| None, Session::clear)
            .unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].status, SessionStatus::Authenticated);
        assert_eq!(seen[0].user_id.as_deref(), Some("42"));
        assert_eq!(seen[0].navigate_to, Some(Navigation::Dashboard));
        assert_eq!(seen[1].status, SessionStatus::Unauthenticated);
        assert_eq!(seen[1].user_id, None);
    }

    #[test]
    fn test_guarded_update() {
        let state = SessionState::new();
        state.update_when(|_| true, |s| s.refresh_token = Some("r1".into()));

        assert!(!state.update_when(
            |s| s.refresh_token.as_deref() == Some("other"),
            |s| s.set_access_token("x".into(), Utc::now()),
        ));
        assert_eq!(state.access_token(), None);

        assert!(state.update_when(
            |s| s.refresh_token.as_deref() == Some("r1"),
            |s| s.set_access_token("x".into(), Utc::now()),
        ));
        assert_eq!(state.access_token().as_deref(), Some("x"));
    }

    #[test]
    fn test_session_debug_hides_tokens() {
        let mut session = Session::default();
        session.set_access_token("super-secret".into(), Utc::now());
        assert!(!format!("{:?}", session).contains("super-secret"));
    }
}
