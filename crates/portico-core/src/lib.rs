//! Core library for portico.
//!
//! This crate holds everything a portico front-end needs that is not
//! presentation:
//!
//! - `auth`: bearer token storage, claim decoding, session evaluation and the
//!   `SessionContext` that surfaces read to branch on authentication state
//! - `api`: HTTP client for the remote authentication API
//! - `config`: persisted application configuration
//! - `forms`: sign-in and sign-up form validation

pub mod api;
pub mod auth;
pub mod config;
pub mod forms;

pub use api::{ApiError, AuthClient};
pub use auth::{
    Claims, Clock, CredentialStore, DecodeError, EpochSeconds, Evaluation, SessionContext,
    SessionError, SessionEvaluator, SessionPhase, SessionProvider, SessionState, SystemClock,
    UserIdentity,
};
pub use config::Config;
