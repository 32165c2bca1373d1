//! Session lifecycle state machine using rust-fsm.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │  Uninitialized  │ (initial)
//! └────────┬────────┘
//!          │ Start
//!          ▼
//! ┌─────────────────┐  RestoreFailed   ┌─────────────────┐
//! │    Restoring    │ ───────────────► │ Unauthenticated │ ◄──┐
//! └────────┬────────┘                  └────────┬────────┘    │
//!          │ Restored                           │             │ LogoutRequested
//!          │                                    │ LoginSucceeded   / SessionRevoked
//!          ▼                                    ▼             │
//!     Authenticated ◄──────────────────── Authenticated ──────┘
//! ```
//!
//! `LoginSucceeded`, `LogoutRequested`, and `SessionRevoked` are accepted from
//! every state: a login may land before the restore completes, and logout
//! always succeeds.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

use crate::types::Navigation;

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub auth_machine(Uninitialized)

    Uninitialized => {
        Start => Restoring,
        LoginSucceeded => Authenticated,
        LogoutRequested => Unauthenticated,
        SessionRevoked => Unauthenticated
    },
    Restoring => {
        // Stored token present, unexpired, and accepted by the profile endpoint
        Restored => Authenticated,
        // No token, expired token, or profile/refresh failure
        RestoreFailed => Unauthenticated,
        LoginSucceeded => Authenticated,
        LogoutRequested => Unauthenticated,
        SessionRevoked => Unauthenticated
    },
    Unauthenticated => {
        LoginSucceeded => Authenticated,
        LogoutRequested => Unauthenticated,
        SessionRevoked => Unauthenticated
    },
    Authenticated => {
        // Re-login replaces the token pair
        LoginSucceeded => Authenticated,
        LogoutRequested => Unauthenticated,
        // Refresh rejected
        SessionRevoked => Unauthenticated
    }
}

pub use auth_machine::Input as AuthMachineInput;
pub use auth_machine::State as AuthMachineState;
pub use auth_machine::StateMachine as AuthMachine;

/// Externally visible session status.
///
/// The restore states collapse into `Loading`; refreshing is never visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Loading,
    Unauthenticated,
    Authenticated,
}

impl SessionStatus {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionStatus::Authenticated)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SessionStatus::Loading)
    }
}

impl From<&AuthMachineState> for SessionStatus {
    fn from(state: &AuthMachineState) -> Self {
        match state {
            AuthMachineState::Uninitialized | AuthMachineState::Restoring => SessionStatus::Loading,
            AuthMachineState::Unauthenticated => SessionStatus::Unauthenticated,
            AuthMachineState::Authenticated => SessionStatus::Authenticated,
        }
    }
}

/// Payload for session status change events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStateChangedPayload {
    /// Current status.
    pub status: SessionStatus,
    /// User ID if authenticated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Username if authenticated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Where the UI should navigate, if anywhere.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigate_to: Option<Navigation>,
}
