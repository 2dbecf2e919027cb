use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whole seconds since the Unix epoch.
///
/// Both token claims (`iat`, `exp`) and the evaluator's clock are expressed
/// in this unit. Keeping them behind one type means a millisecond value can
/// only enter through `EpochSeconds::new`, where the decoder range-checks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpochSeconds(i64);

impl EpochSeconds {
    /// 9999-12-31T23:59:59Z. Anything later is not a seconds timestamp
    /// (a current time in milliseconds lands around year 57000).
    pub const MAX_PLAUSIBLE: EpochSeconds = EpochSeconds(253_402_300_799);

    pub const fn new(secs: i64) -> Self {
        Self(secs)
    }

    pub const fn as_i64(self) -> i64 {
        self.0
    }

    pub fn is_plausible(self) -> bool {
        self.0 >= 0 && self <= Self::MAX_PLAUSIBLE
    }

    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.0, 0)
    }
}

impl From<DateTime<Utc>> for EpochSeconds {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp())
    }
}

impl fmt::Display for EpochSeconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Claims carried by a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
    pub role: Option<String>,
    pub issued_at: Option<EpochSeconds>,
    pub expires_at: EpochSeconds,
}

impl Claims {
    /// A token is expired once `now` reaches its expiry; `exp == now` is expired.
    pub fn is_expired_at(&self, now: EpochSeconds) -> bool {
        self.expires_at <= now
    }

    /// Seconds left before expiry, clamped at zero
    pub fn seconds_until_expiry(&self, now: EpochSeconds) -> i64 {
        (self.expires_at.as_i64() - now.as_i64()).max(0)
    }

    pub fn to_identity(&self) -> UserIdentity {
        UserIdentity {
            id: self.subject.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role.clone(),
        }
    }
}

/// The part of the claims the rest of the application sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct UserIdentity {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl UserIdentity {
    /// Name for greetings, falling back to the email address
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(exp: i64) -> Claims {
        Claims {
            subject: "u1".to_string(),
            email: "a@b.com".to_string(),
            name: Some("Ada".to_string()),
            role: None,
            issued_at: Some(EpochSeconds::new(exp - 3600)),
            expires_at: EpochSeconds::new(exp),
        }
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let c = claims(1_000);
        assert!(!c.is_expired_at(EpochSeconds::new(999)));
        assert!(c.is_expired_at(EpochSeconds::new(1_000)));
        assert!(c.is_expired_at(EpochSeconds::new(1_001)));
    }

    #[test]
    fn test_seconds_until_expiry_clamps() {
        let c = claims(1_000);
        assert_eq!(c.seconds_until_expiry(EpochSeconds::new(400)), 600);
        assert_eq!(c.seconds_until_expiry(EpochSeconds::new(5_000)), 0);
    }

    #[test]
    fn test_identity_projection() {
        let identity = claims(1_000).to_identity();
        assert_eq!(identity.id, "u1");
        assert_eq!(identity.email, "a@b.com");
        assert_eq!(identity.name.as_deref(), Some("Ada"));
        assert_eq!(identity.role, None);
    }

    #[test]
    fn test_plausible_seconds() {
        assert!(EpochSeconds::new(1_760_000_000).is_plausible());
        assert!(EpochSeconds::MAX_PLAUSIBLE.is_plausible());
        // Same instant in milliseconds
        assert!(!EpochSeconds::new(1_760_000_000_000).is_plausible());
        assert!(!EpochSeconds::new(-1).is_plausible());
    }

    #[test]
    fn test_display_name_fallback() {
        let mut identity = claims(1_000).to_identity();
        assert_eq!(identity.display_name(), "Ada");
        identity.name = Some("  ".to_string());
        assert_eq!(identity.display_name(), "a@b.com");
        identity.name = None;
        assert_eq!(identity.display_name(), "a@b.com");
    }

    #[test]
    fn test_identity_serialization_omits_absent_fields() {
        let identity = UserIdentity {
            id: "u1".to_string(),
            email: "a@b.com".to_string(),
            name: None,
            role: None,
        };
        let json = serde_json::to_value(&identity).expect("serialize identity");
        assert_eq!(json, serde_json::json!({"id": "u1", "email": "a@b.com"}));
    }
}
