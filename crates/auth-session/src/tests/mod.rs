//! Scenario tests for the session lifecycle.
//!
//! - `harness.rs`    - Fake identity service and controller wiring
//! - `lifecycle.rs`  - Restore, login, signup, logout, observers
//! - `fetch.rs`      - Protected requests, refresh-and-retry-once
//! - `coalescing.rs` - Concurrent callers share one refresh
//! - `invariants.rs` - Expiry boundary, token pair consistency, cancellation,
//!                     sessions changing while a refresh is in flight

mod coalescing;

#[allow(unused_imports)]
pub use harness::{FakeIdentityService, TestHarness};
