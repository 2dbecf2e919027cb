//! Bearer token claim decoding.
//!
//! Tokens are JWTs issued by the authentication server. The client only
//! reads their claims: the signature is NOT verified here. The server is the
//! trust anchor and token integrity relies on transport security, so a
//! decoded identity must never be used to authorize anything locally that the
//! server would not also check.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;

use super::claims::{Claims, EpochSeconds};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Token claims are not readable: {0}")]
    InvalidClaims(String),

    #[error("Token is missing required claim: {0}")]
    MissingClaim(&'static str),

    #[error("Token expiry {0} is not a seconds timestamp")]
    ImplausibleExpiry(i64),
}

/// Claims as they appear on the wire. Required fields are optional here so
/// that a missing claim reports which one, instead of a serde message.
#[derive(Debug, Deserialize)]
struct RawClaims {
    sub: Option<String>,
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    iat: Option<serde_json::Number>,
    exp: Option<serde_json::Number>,
}

/// Decode a bearer token into its claims.
///
/// Expired tokens decode successfully; expiry is checked by the evaluator.
pub fn decode(token: &str) -> Result<Claims, DecodeError> {
    let raw = read_claims(token)?;

    let subject = raw
        .sub
        .filter(|s| !s.is_empty())
        .ok_or(DecodeError::MissingClaim("sub"))?;
    let email = raw
        .email
        .filter(|s| !s.is_empty())
        .ok_or(DecodeError::MissingClaim("email"))?;

    let exp = raw.exp.ok_or(DecodeError::MissingClaim("exp"))?;
    let expires_at = numeric_date(&exp).ok_or_else(|| {
        DecodeError::InvalidClaims(format!("exp is not a numeric date: {}", exp))
    })?;
    if !expires_at.is_plausible() {
        return Err(DecodeError::ImplausibleExpiry(expires_at.as_i64()));
    }

    // iat is informational; an unreadable value is dropped rather than rejected
    let issued_at = raw.iat.as_ref().and_then(numeric_date);

    Ok(Claims {
        subject,
        email,
        name: raw.name,
        role: raw.role,
        issued_at,
        expires_at,
    })
}

fn read_claims(token: &str) -> Result<RawClaims, DecodeError> {
    if token.is_empty() {
        return Err(DecodeError::Malformed("empty token".to_string()));
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    // The key is never consulted with signature validation disabled
    let key = DecodingKey::from_secret(&[]);

    jsonwebtoken::decode::<RawClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::Json(inner) => DecodeError::InvalidClaims(inner.to_string()),
            _ => DecodeError::Malformed(e.to_string()),
        })
}

/// RFC 7519 NumericDate: seconds, possibly fractional. Fractions are floored.
fn numeric_date(value: &serde_json::Number) -> Option<EpochSeconds> {
    if let Some(secs) = value.as_i64() {
        return Some(EpochSeconds::new(secs));
    }
    value
        .as_f64()
        .filter(|f| f.is_finite() && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
        .map(|f| EpochSeconds::new(f.floor() as i64))
}
