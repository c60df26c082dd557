//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the identity API key, an optional identity endpoint
//! override, the storage backend and the last email used to sign in.
//!
//! Configuration is stored at `~/.config/shopkeep/config.json`. Environment
//! variables override the file.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::IdentityClient;
use crate::store::{FileStore, KeyValueStore, KeyringStore, MemoryStore};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "shopkeep";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const API_KEY_ENV: &str = "SHOPKEEP_API_KEY";
pub const IDENTITY_URL_ENV: &str = "SHOPKEEP_IDENTITY_URL";
pub const STORAGE_ENV: &str = "SHOPKEEP_STORAGE";

/// Where the session record is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    /// Nothing is persisted; every start is logged out
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StorageBackend::File),
            "keyring" | "keychain" => Ok(StorageBackend::Keyring),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(anyhow::anyhow!(
                "Unknown storage backend {:?} (expected file, keyring or memory)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub identity_base_url: Option<String>,
    #[serde(default)]
    pub storage: StorageBackend,
    #[serde(default)]
    pub last_email: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the file-backed session store
    pub fn data_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Apply `SHOPKEEP_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(API_KEY_ENV) {
            self.api_key = Some(key);
        }
        if let Some(url) = non_empty(IDENTITY_URL_ENV) {
            self.identity_base_url = Some(url);
        }
        if let Some(storage) = non_empty(STORAGE_ENV) {
            self.storage = storage
                .parse()
                .with_context(|| format!("Invalid {}", STORAGE_ENV))?;
        }
        Ok(())
    }

    /// The identity API key. Required; there is no built-in default.
    pub fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No identity API key configured. Set {} or add \"api_key\" to the config file.",
                    API_KEY_ENV
                )
            })
    }

    /// Record `email` as the last used sign-in email in the config file.
    ///
    /// Only `last_email` is written; the file is re-read first so environment
    /// overrides applied to `self` never end up on disk.
    pub fn remember_last_email(&mut self, email: &str) -> Result<()> {
        self.remember_last_email_at(&Self::config_path()?, email)
    }

    pub fn remember_last_email_at(&mut self, path: &Path, email: &str) -> Result<()> {
        let mut on_disk = Self::load_from(path)?;
        on_disk.last_email = Some(email.to_string());
        on_disk.save_to(path)?;
        self.last_email = on_disk.last_email;
        Ok(())
    }

    /// Build the identity client. A missing API key is not an error here;
    /// requests made without one fail with `AuthError::MissingApiKey`.
    pub fn identity_client(&self) -> Result<IdentityClient> {
        let client = match self.api_key() {
            Ok(key) => IdentityClient::new(key),
            Err(_) => IdentityClient::without_key(),
        }
        .context("Failed to build identity client")?;
        Ok(match self.identity_base_url {
            Some(ref url) => client.with_base_url(url.as_str()),
            None => client,
        })
    }

    pub fn open_store(&self) -> Result<Box<dyn KeyValueStore>> {
        Ok(match self.storage {
            StorageBackend::File => Box::new(FileStore::new(self.data_dir()?)),
            StorageBackend::Keyring => Box::new(KeyringStore::default()),
            StorageBackend::Memory => Box::new(MemoryStore::new()),
        })
    }
}
