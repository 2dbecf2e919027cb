//! Client for the remote authentication API.
//!
//! Login and registration return a bearer token; storing it and refreshing
//! the session is the caller's job (see `SessionContext::accept_token`).

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::{CredentialStore, Origin};
use crate::forms::{LoginForm, RegistrationForm};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

const LOGIN_PATH: &str = "/api/auth/login";
const REGISTER_PATH: &str = "/api/auth/register";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) reads.
/// Login and registration are never retried.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    base_url: String,
    origin: Origin,
    backoff: Duration,
}

impl AuthClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let origin = Origin::parse(base_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            origin,
            backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Override the initial rate-limit backoff
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Sign in and return the issued bearer token
    pub async fn login(&self, form: &LoginForm) -> Result<String> {
        let body = LoginRequest {
            email: &form.email,
            password: &form.password,
        };
        let token = self
            .request_token(LOGIN_PATH, &body, "Login failed")
            .await?;
        info!("Login successful");
        Ok(token)
    }

    /// Create an account and return the issued bearer token
    pub async fn register(&self, form: &RegistrationForm) -> Result<String> {
        let token = self
            .request_token(REGISTER_PATH, form, "Registration failed")
            .await?;
        info!("Registration successful");
        Ok(token)
    }

    async fn request_token<B: Serialize>(&self, path: &str, body: &B, fallback: &str) -> Result<String> {
        let url = self.url(path);
        debug!(url = %url, "Requesting token");

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to send request to {}", url))?;

        let response = Self::check_response(response, fallback).await?;

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Missing token in response: {}", e)))?;

        if parsed.token.is_empty() {
            return Err(ApiError::InvalidResponse("Empty token in response".to_string()).into());
        }
        Ok(parsed.token)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response, fallback: &str) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body, fallback).into())
        }
    }

    /// Authenticated GET using the bearer header derived from `credentials`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, credentials: &CredentialStore) -> Result<T> {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff = self.backoff;

        loop {
            let response = self
                .client
                .get(&url)
                .headers(credentials.auth_header())
                .send()
                .await
                .map_err(ApiError::from)
                .with_context(|| format!("Failed to send GET request to {}", url))?;

            if response.status().as_u16() == 429 {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited.into());
                }
                warn!(url = %url, retry = retries, backoff_ms = backoff.as_millis() as u64, "Rate limited, backing off");
                tokio::time::sleep(backoff).await;
                backoff *= 2; // Exponential backoff
                continue;
            }

            let response = Self::check_response(response, "Request failed").await?;
            return response
                .json()
                .await
                .map_err(|e| ApiError::InvalidResponse(e.to_string()))
                .with_context(|| format!("Failed to parse JSON response from {}", url));
        }
    }
}
