//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the authentication API location, the token storage
//! backend, and the last email used to sign in.
//!
//! Configuration is stored at `~/.config/portico/config.json`. The
//! `PORTICO_API_URL` environment variable overrides the stored API URL.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::{CredentialStore, FileStorage, KeyringStorage, MemoryStorage, Origin};

/// Application name used for config/data directory paths
const APP_NAME: &str = "portico";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// API used when neither the config file nor the environment names one
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";

/// Environment variable overriding `api_base_url`
pub const API_URL_ENV: &str = "PORTICO_API_URL";

/// Where the bearer token is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// JSON file under the user's data directory
    #[default]
    File,
    /// OS keychain
    Keyring,
    /// Keep the token for this process only
    Memory,
    /// Do not persist anything
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub storage: StorageBackend,
    pub last_email: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
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

    /// Base directory for per-origin token storage
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// API base URL: environment, then config file, then the default
    pub fn api_base_url(&self) -> String {
        Self::resolve_api_base_url(std::env::var(API_URL_ENV).ok(), self.api_base_url.as_deref())
    }

    fn resolve_api_base_url(env: Option<String>, configured: Option<&str>) -> String {
        env.filter(|v| !v.trim().is_empty())
            .or_else(|| configured.map(str::to_string))
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
    }

    /// Build the credential store for `origin` using the configured backend.
    ///
    /// Falls back to an unavailable (inert) store when the file backend has
    /// no data directory to write to.
    pub fn credential_store(&self, origin: &Origin) -> CredentialStore {
        match self.storage {
            StorageBackend::File => match self.data_dir() {
                Ok(dir) => CredentialStore::new(Arc::new(FileStorage::new(dir, origin))),
                Err(e) => {
                    warn!(error = %e, "No durable storage available");
                    CredentialStore::unavailable()
                }
            },
            StorageBackend::Keyring => {
                CredentialStore::new(Arc::new(KeyringStorage::new(origin.clone())))
            }
            StorageBackend::Memory => CredentialStore::new(Arc::new(MemoryStorage::new())),
            StorageBackend::None => CredentialStore::unavailable(),
        }
    }
}
