//! Identity provider API module.
//!
//! This module provides the `IdentityClient` for exchanging an email and
//! password for an id token, and the `AuthError` taxonomy callers branch on.

pub mod client;
pub mod error;

pub use client::{AuthGrant, IdentityClient, IdentityProvider, DEFAULT_IDENTITY_BASE_URL};
pub use error::{AuthError, AuthMode};
