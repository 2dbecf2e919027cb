use std::sync::Arc;

use reqwest::header::{self, HeaderMap, HeaderValue};
use tracing::{debug, warn};

use super::storage::{KeyValueStorage, MemoryStorage};

/// Storage key holding the raw bearer token
pub const AUTH_TOKEN_KEY: &str = "auth_token";

/// Holds the single bearer token for an origin.
///
/// When no durable storage is available the store is inert: `get` returns
/// `None` and `set`/`clear` do nothing. Backend failures are logged and
/// treated the same way, so callers never see a storage error.
/// Cloning shares the underlying backend.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Option<Arc<dyn KeyValueStorage>>,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// A store for environments without durable storage
    pub fn unavailable() -> Self {
        Self { backend: None }
    }

    /// An in-memory store, mostly for tests and one-shot runs
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// Replace the stored token
    pub fn set(&self, token: &str) {
        let Some(backend) = &self.backend else {
            debug!("No durable storage, token not persisted");
            return;
        };
        if let Err(e) = backend.set(AUTH_TOKEN_KEY, token) {
            warn!(error = %e, "Failed to store auth token");
        }
    }

    pub fn get(&self) -> Option<String> {
        let backend = self.backend.as_ref()?;
        match backend.get(AUTH_TOKEN_KEY) {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to read auth token, treating as absent");
                None
            }
        }
    }

    pub fn clear(&self) {
        let Some(backend) = &self.backend else {
            return;
        };
        if let Err(e) = backend.remove(AUTH_TOKEN_KEY) {
            warn!(error = %e, "Failed to remove auth token");
        }
    }

    /// `Authorization: Bearer <token>` when a token is stored, otherwise empty.
    pub fn auth_header(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(token) = self.get() {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(header::AUTHORIZATION, value);
                }
                Err(_) => warn!("Stored auth token is not a valid header value"),
            }
        }
        headers
    }
}
