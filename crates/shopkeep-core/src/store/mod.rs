//! Persistent key-value storage for session data.
//!
//! This module provides:
//! - `KeyValueStore`: the string-keyed store the session manager persists to
//! - `FileStore`: one JSON file per key in a data directory
//! - `KeyringStore`: values kept in the OS keychain via keyring
//! - `MemoryStore`: in-process map, nothing survives a restart

pub mod file;
pub mod keychain;
pub mod memory;

use anyhow::Result;

pub use self::file::FileStore;
pub use self::keychain::KeyringStore;
pub use self::memory::MemoryStore;

/// A durable string-to-string store.
///
/// Removing a key that is not present succeeds.
///
/// Calls are synchronous and may block on disk or on the OS keychain (which
/// can wait on an unlock prompt). `SessionManager` makes them while holding its
/// state lock so the record on disk always matches the session in memory;
/// implementations must not call back into the manager.
pub trait KeyValueStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}
