//! HTTP client module for the authentication API.
//!
//! The API issues JWT bearer tokens from `/api/auth/login` and
//! `/api/auth/register`; failures carry an `{"error": "..."}` payload.

pub mod client;
pub mod error;

pub use client::AuthClient;
pub use error::ApiError;
