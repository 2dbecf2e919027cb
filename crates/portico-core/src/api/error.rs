use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// The server refused the request and said why (bad credentials, email taken)
    #[error("{0}")]
    Rejected(String),

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Failure payload returned by the authentication API
#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// The `error` message of a JSON failure payload, if there is one
    fn server_message(body: &str) -> Option<String> {
        serde_json::from_str::<ErrorPayload>(body)
            .ok()
            .and_then(|p| p.error)
            .filter(|m| !m.trim().is_empty())
    }

    /// Map a failed response. `fallback` is shown when a 4xx carries no message.
    pub fn from_status(status: reqwest::StatusCode, body: &str, fallback: &str) -> Self {
        match status.as_u16() {
            429 => ApiError::RateLimited,
            400..=499 => match Self::server_message(body) {
                Some(message) => ApiError::Rejected(message),
                None if status.as_u16() == 401 => ApiError::Unauthorized,
                None => ApiError::Rejected(fallback.to_string()),
            },
            500..=599 => ApiError::ServerError(
                Self::server_message(body).unwrap_or_else(|| Self::truncate_body(body)),
            ),
            _ => ApiError::InvalidResponse(format!(
                "Status {}: {}",
                status,
                Self::truncate_body(body)
            )),
        }
    }

    /// Message suitable for showing to the person at the keyboard
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Rejected(message) => message.clone(),
            ApiError::Unauthorized => "Invalid email or password".to_string(),
            ApiError::RateLimited => "Too many attempts. Please wait and try again.".to_string(),
            ApiError::ServerError(_) => "The server had a problem. Please try again later.".to_string(),
            ApiError::NetworkError(e) if e.is_timeout() => {
                "Connection timed out. Please try again.".to_string()
            }
            ApiError::NetworkError(_) => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            ApiError::InvalidResponse(_) => "Unexpected response from server".to_string(),
        }
    }
}
