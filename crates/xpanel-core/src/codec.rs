//! Stateless signing and verification of subscription and session tokens.
//!
//! Both token kinds are HS256 JWTs signed with the secret shared with the auth
//! subsystem. The `type` claim keeps them apart: a session token never decodes
//! as a subscription token and vice versa.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::TokenError;

pub const SUBSCRIPTION_TOKEN_TYPE: &str = "subscription";
pub const SESSION_TOKEN_TYPE: &str = "access";

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Claims carried inside a subscription access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionClaims {
    pub user_id: i64,
    pub subscription_id: i64,
    /// Expiration time (Unix seconds)
    pub exp: i64,
    /// Issued at (Unix seconds)
    pub iat: i64,
    #[serde(rename = "type")]
    pub token_type: String,
}

impl SubscriptionClaims {
    pub fn new(user_id: i64, subscription_id: i64, iat: i64, exp: i64) -> Self {
        Self {
            user_id,
            subscription_id,
            exp,
            iat,
            token_type: SUBSCRIPTION_TOKEN_TYPE.to_string(),
        }
    }

    pub fn remaining_seconds(&self, now: i64) -> i64 {
        (self.exp - now).max(0)
    }

    pub fn is_expiring_soon(&self, now: i64, warning_days: i64) -> bool {
        let remaining = self.remaining_seconds(now);
        remaining <= 0 || remaining <= warning_days * SECONDS_PER_DAY
    }
}

/// Session token claims minted by the auth subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user ID)
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(rename = "type")]
    pub token_type: String,
}

pub fn encode(claims: &SubscriptionClaims, secret: &str) -> Result<String, TokenError> {
    sign(claims, secret)
}

pub fn decode(token: &str, secret: &str) -> Result<SubscriptionClaims, TokenError> {
    decode_at(token, secret, Utc::now().timestamp())
}

/// Verify `token` against `secret` as of `now` (Unix seconds).
pub fn decode_at(token: &str, secret: &str, now: i64) -> Result<SubscriptionClaims, TokenError> {
    let claims: SubscriptionClaims = verify(token, secret)?;

    if claims.token_type != SUBSCRIPTION_TOKEN_TYPE {
        log::warn!(
            "Rejected token with type '{}' where a subscription token was expected",
            claims.token_type
        );
        return Err(TokenError::Malformed);
    }

    if claims.exp < now {
        return Err(TokenError::Expired);
    }

    Ok(claims)
}

pub fn encode_session_token(
    user_id: i64,
    secret: &str,
    lifetime_secs: i64,
    now: i64,
) -> Result<String, TokenError> {
    let claims = SessionClaims {
        sub: user_id.to_string(),
        exp: now + lifetime_secs,
        iat: now,
        token_type: SESSION_TOKEN_TYPE.to_string(),
    };
    sign(&claims, secret)
}

/// Verify a session token and return the user id it was issued for.
pub fn verify_session_token(token: &str, secret: &str, now: i64) -> Result<i64, TokenError> {
    let claims: SessionClaims = verify(token, secret)?;

    if claims.token_type != SESSION_TOKEN_TYPE {
        return Err(TokenError::Malformed);
    }
    if claims.exp < now {
        return Err(TokenError::Expired);
    }

    claims.sub.parse::<i64>().map_err(|_| TokenError::Malformed)
}

/// Lowercase hex SHA-256 digest. The store only ever sees this, never the token.
pub fn token_hash(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token);
    format!("{:x}", hasher.finalize())
}

fn sign<T: Serialize>(claims: &T, secret: &str) -> Result<String, TokenError> {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| TokenError::Signing(e.to_string()))
}

fn verify<T: DeserializeOwned>(token: &str, secret: &str) -> Result<T, TokenError> {
    // Expiry is checked by the callers against an injectable clock.
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<T>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        _ => TokenError::Malformed,
    })
}
