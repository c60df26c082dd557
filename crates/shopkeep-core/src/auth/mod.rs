//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `SessionManager`: acquires, persists, restores and expires the session
//! - `SessionData`: the active identity (user id, token, expiry)
//! - `PersistedSession`: the record kept in the key-value store
//! - `ExpiryTimer`: the single pending auto-logout
//!
//! Sessions expire when the provider-reported lifetime runs out; the manager
//! logs out on its own when that happens.

pub mod manager;
pub mod session;
pub mod timer;

pub use manager::SessionManager;
pub use session::{
    AuthState, PersistedSession, RestoreRejection, SessionData, SessionSnapshot, STORAGE_KEY,
};
pub use timer::{ExpiryTimer, MAX_TIMER_DELAY};
