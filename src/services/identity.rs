use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AuthSettings;
use crate::models::CallerIdentity;

/// Claims carried by a bearer token. The numeric user id is
/// string-encoded in both `sub` and `user_id`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub user_id: String,
    pub iss: String,
    pub aud: String,
    pub exp: usize,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("malformed claims: {0}")]
    MalformedClaims(String),
}

/// Validates HS256 bearer tokens against the configured secret, issuer
/// and audience, and resolves the caller's user id.
#[derive(Clone)]
pub struct IdentityVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    token_expiry_hours: i64,
}

impl IdentityVerifier {
    pub fn new(settings: &AuthSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&settings.issuer]);
        validation.set_audience(&[&settings.audience]);

        Self {
            encoding: EncodingKey::from_secret(settings.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(settings.jwt_secret.as_bytes()),
            validation,
            issuer: settings.issuer.clone(),
            audience: settings.audience.clone(),
            token_expiry_hours: settings.token_expiry_hours.unwrap_or(24 * 90),
        }
    }

    pub fn verify(&self, token: &str) -> Result<CallerIdentity, IdentityError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        let user_id = data.claims.user_id.parse::<i64>().map_err(|_| {
            IdentityError::MalformedClaims(format!(
                "user_id claim is not a numeric id: {:?}",
                data.claims.user_id
            ))
        })?;

        Ok(CallerIdentity::new(user_id))
    }

    /// Mint a token for local tooling and tests. Production tokens come
    /// from the identity service, not from this process.
    pub fn issue_token(&self, user_id: i64) -> Result<String, IdentityError> {
        let exp = Utc::now() + Duration::hours(self.token_expiry_hours);
        let claims = Claims {
            sub: user_id.to_string(),
            user_id: user_id.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: exp.timestamp() as usize,
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding,
        )?)
    }
}
