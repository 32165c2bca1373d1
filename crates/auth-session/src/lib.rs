//! Client-side session lifecycle for the IAM identity service.
//!
//! This crate obtains, persists, validates, and refreshes bearer credentials,
//! and attaches them to outgoing requests:
//!
//! - [`CredentialClient`] talks to the identity service (login, signup,
//!   refresh, profile)
//! - [`SessionLifecycleController`] restores the session on start and drives
//!   login, signup, and logout through an explicit state machine
//! - [`AuthenticatedFetch`] retries a protected request once after a
//!   single-flight token refresh
//!
//! Persistence lives in the `token-storage` crate; every network call goes
//! through the [`HttpTransport`] seam.

mod auth_fsm;
mod claims;
mod controller;
mod credential_client;
mod error;
mod fetch;
mod refresh;
mod session_core;
mod session_state;
mod transport;
mod types;

#[cfg(test)]
mod tests;

pub use auth_fsm::{
    AuthMachine, AuthMachineInput, AuthMachineState, AuthStateChangedPayload, SessionStatus,
};
pub use claims::decode_unverified_claims;
pub use controller::{token_valid_at, SessionLifecycleController};
pub use credential_client::CredentialClient;
pub use error::{AuthError, AuthResult};
pub use fetch::AuthenticatedFetch;
pub use session_state::{AuthStateCallback, Session, SessionSnapshot};
pub use transport::{
    HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport, TransportError,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use types::{LoginGrant, Navigation, RefreshGrant, SignupData, User};
