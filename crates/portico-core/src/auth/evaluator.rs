use std::sync::Arc;

use tracing::{debug, warn};

use super::claims::{EpochSeconds, UserIdentity};
use super::clock::Clock;
use super::credentials::CredentialStore;
use super::decoder::{self, DecodeError};

/// Result of evaluating the stored token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// A decodable, unexpired token describing `identity`
    Valid {
        identity: UserIdentity,
        expires_at: EpochSeconds,
    },
    /// No token is stored
    Missing,
    /// A token is stored but cannot be decoded
    Corrupt(DecodeError),
    /// A well-formed token whose expiry has passed
    Expired { expires_at: EpochSeconds },
}

impl Evaluation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Evaluation::Valid { .. })
    }

    pub fn identity(&self) -> Option<&UserIdentity> {
        match self {
            Evaluation::Valid { identity, .. } => Some(identity),
            _ => None,
        }
    }

    pub fn into_identity(self) -> Option<UserIdentity> {
        match self {
            Evaluation::Valid { identity, .. } => Some(identity),
            _ => None,
        }
    }
}

/// Derives session facts from the credential store and the clock.
///
/// Evaluation only reads: it never writes the store and never touches the
/// network, so it can run any number of times.
#[derive(Clone)]
pub struct SessionEvaluator {
    store: CredentialStore,
    clock: Arc<dyn Clock>,
}

impl SessionEvaluator {
    pub fn new(store: CredentialStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn evaluate(&self) -> Evaluation {
        let Some(token) = self.store.get() else {
            return Evaluation::Missing;
        };

        let claims = match decoder::decode(&token) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(error = %e, "Stored auth token could not be decoded");
                return Evaluation::Corrupt(e);
            }
        };

        let now = self.clock.now_epoch_seconds();
        if claims.is_expired_at(now) {
            debug!(expires_at = %claims.expires_at, now = %now, "Stored auth token has expired");
            return Evaluation::Expired {
                expires_at: claims.expires_at,
            };
        }

        Evaluation::Valid {
            identity: claims.to_identity(),
            expires_at: claims.expires_at,
        }
    }

    /// Minutes remaining on a valid token (for display)
    pub fn minutes_until_expiry(&self) -> Option<i64> {
        match self.evaluate() {
            Evaluation::Valid { expires_at, .. } => {
                let now = self.clock.now_epoch_seconds();
                Some((expires_at.as_i64() - now.as_i64()).max(0) / 60)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::FixedClock;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;

    fn mint(claims: serde_json::Value) -> String {
        encode(&Header::default(), &claims, &EncodingKey::from_secret(b"server-secret"))
            .expect("Failed to encode test token")
    }

    fn evaluator_with(token: Option<&str>) -> SessionEvaluator {
        let store = CredentialStore::in_memory();
        if let Some(token) = token {
            store.set(token);
        }
        SessionEvaluator::new(store, Arc::new(FixedClock::at_epoch_seconds(NOW)))
    }

    #[test]
    fn test_missing_token() {
        let evaluation = evaluator_with(None).evaluate();
        assert_eq!(evaluation, Evaluation::Missing);
        assert!(!evaluation.is_valid());
        assert_eq!(evaluation.identity(), None);
    }

    #[test]
    fn test_corrupt_token() {
        let evaluation = evaluator_with(Some("definitely-not-a-jwt")).evaluate();
        assert!(matches!(evaluation, Evaluation::Corrupt(DecodeError::Malformed(_))));
        assert!(!evaluation.is_valid());
        assert_eq!(evaluation.identity(), None);
    }

    #[test]
    fn test_valid_token_projects_identity() {
        let token = mint(json!({
            "sub": "u1",
            "email": "a@b.com",
            "name": "Ada",
            "role": "admin",
            "exp": NOW + 3600
        }));
        let evaluation = evaluator_with(Some(&token)).evaluate();
        assert!(evaluation.is_valid());
        assert_eq!(
            evaluation.into_identity(),
            Some(UserIdentity {
                id: "u1".to_string(),
                email: "a@b.com".to_string(),
                name: Some("Ada".to_string()),
                role: Some("admin".to_string()),
            })
        );
    }

    #[test]
    fn test_expiry_boundaries() {
        for (exp, valid) in [(NOW - 10, false), (NOW - 1, false), (NOW, false), (NOW + 1, true)] {
            let token = mint(json!({"sub": "u1", "email": "a@b.com", "exp": exp}));
            let evaluation = evaluator_with(Some(&token)).evaluate();
            assert_eq!(evaluation.is_valid(), valid, "exp offset {}", exp - NOW);
        }
    }

    #[test]
    fn test_expired_regardless_of_other_claims() {
        let token = mint(json!({
            "sub": "root",
            "email": "root@b.com",
            "role": "admin",
            "iat": NOW + 100,
            "exp": NOW - 1
        }));
        assert_eq!(
            evaluator_with(Some(&token)).evaluate(),
            Evaluation::Expired {
                expires_at: EpochSeconds::new(NOW - 1)
            }
        );
    }

    #[test]
    fn test_evaluate_has_no_side_effects() {
        let token = mint(json!({"sub": "u1", "email": "a@b.com", "exp": NOW + 60}));
        let evaluator = evaluator_with(Some(&token));
        let first = evaluator.evaluate();
        for _ in 0..5 {
            assert_eq!(evaluator.evaluate(), first);
        }
        assert_eq!(evaluator.store.get().as_deref(), Some(token.as_str()));
    }

    #[test]
    fn test_corrupt_token_is_not_removed() {
        let evaluator = evaluator_with(Some("junk"));
        evaluator.evaluate();
        assert_eq!(evaluator.store.get().as_deref(), Some("junk"));
    }

    #[test]
    fn test_minutes_until_expiry() {
        let token = mint(json!({"sub": "u1", "email": "a@b.com", "exp": NOW + 3599}));
        assert_eq!(evaluator_with(Some(&token)).minutes_until_expiry(), Some(59));
        assert_eq!(evaluator_with(None).minutes_until_expiry(), None);
    }
}
