//! Shopkeep core library.
//!
//! The session layer of the shop app: signup and login against the identity
//! provider, persistence of the session in a key-value store, auto-login on
//! start and auto-logout when the token expires.
//!
//! # Modules
//!
//! - [`api`]: Identity provider client and error taxonomy
//! - [`auth`]: Session manager, session data, expiry timer
//! - [`store`]: Key-value stores (file, keychain, memory)
//! - [`navigation`]: Route selection from session state
//! - [`config`]: Application configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod navigation;
pub mod store;

pub use api::{AuthError, AuthGrant, IdentityClient, IdentityProvider};
pub use auth::{AuthState, SessionData, SessionManager, SessionSnapshot};
pub use config::{Config, StorageBackend};
pub use navigation::Route;
pub use store::{FileStore, KeyValueStore, KeyringStore, MemoryStore};
