use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config;
use crate::types::Credential;

/// Signed session claims. Each login issues a fresh pair of these; the
/// gate only ever sees the token, never stored session state.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(credential: &Credential, expiry_hours: u64) -> Self {
        let now = Utc::now();
        Self {
            sub: credential.id,
            email: credential.email.clone(),
            role: credential.role.clone(),
            exp: (now + Duration::hours(expiry_hours as i64)).timestamp(),
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token generation error: {0}")]
    TokenGeneration(String),

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("JWT secret not configured")]
    InvalidSecret,

    #[error("password hash error: {0}")]
    Hash(String),
}

/// Access token for the configured expiry window.
pub fn issue_token(credential: &Credential) -> Result<String, AuthError> {
    sign(Claims::new(credential, config::config().security.token_expiry_hours))
}

/// Longer-lived refresh token, returned by login alongside the access token.
pub fn issue_refresh_token(credential: &Credential) -> Result<String, AuthError> {
    sign(Claims::new(credential, config::config().security.refresh_expiry_hours))
}

fn sign(claims: Claims) -> Result<String, AuthError> {
    let secret = &config::config().security.jwt_secret;
    if secret.is_empty() {
        return Err(AuthError::InvalidSecret);
    }

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AuthError::TokenGeneration(e.to_string()))
}

pub fn verify_token(token: &str) -> Result<Claims, AuthError> {
    let secret = &config::config().security.jwt_secret;
    if secret.is_empty() {
        return Err(AuthError::InvalidSecret);
    }

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AuthError::InvalidToken(e.to_string()))
}

/// Hash a raw password into a PHC string.
pub fn hash_password(raw: &str) -> Result<String, AuthError> {
    Pbkdf2
        .hash_password(raw.as_bytes(), &SaltString::generate(&mut OsRng))
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

pub fn verify_password(raw: &str, phc_hash: &str) -> bool {
    match PasswordHash::new(phc_hash) {
        Ok(parsed) => Pbkdf2.verify_password(raw.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}
