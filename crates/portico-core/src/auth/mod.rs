//! Client-side session and bearer token lifecycle.
//!
//! This module provides:
//! - `CredentialStore`: origin-scoped persistence of the single bearer token
//! - `decoder`: reads token claims (no signature verification)
//! - `SessionEvaluator`: derives validity and identity from store + clock
//! - `SessionContext` / `SessionProvider`: the published session state
//!
//! The session is never persisted on its own; it is always re-derived from
//! the stored token.

pub mod claims;
pub mod clock;
pub mod credentials;
pub mod decoder;
pub mod evaluator;
pub mod session;
pub mod storage;

pub use claims::{Claims, EpochSeconds, UserIdentity};
pub use clock::{Clock, FixedClock, SystemClock};
pub use credentials::{CredentialStore, AUTH_TOKEN_KEY};
pub use decoder::{decode, DecodeError};
pub use evaluator::{Evaluation, SessionEvaluator};
pub use session::{SessionContext, SessionError, SessionPhase, SessionProvider, SessionState};
pub use storage::{FileStorage, KeyValueStorage, KeyringStorage, MemoryStorage, Origin};
