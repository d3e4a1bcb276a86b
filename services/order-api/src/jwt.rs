//! JWT service for session token generation and validation
//!
//! Tokens are HS256-signed with the secret injected through [`JwtConfig`]
//! and carry the user id as the subject.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::models::UserId;

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Shared secret for signing and verifying tokens
    pub secret: String,
    /// Token lifetime in seconds (default: 1 hour)
    pub token_ttl: u64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID, as a decimal string
    pub sub: String,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
}

/// Errors produced while signing or checking tokens
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("token rejected: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("token subject is not a user id: {0}")]
    Subject(String),

    #[error("system clock is before the unix epoch")]
    Clock,
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_ttl: u64,
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        JwtService {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            token_ttl: config.token_ttl,
        }
    }

    /// Generate a session token for a user
    pub fn generate_token(&self, user_id: UserId) -> Result<String, JwtError> {
        let now = now_secs()?;
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now + self.token_ttl,
        };
        self.sign(&claims)
    }

    /// Validate a token and return the user id it was issued for
    pub fn validate_token(&self, token: &str) -> Result<UserId, JwtError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        token_data
            .claims
            .sub
            .parse()
            .map_err(|_| JwtError::Subject(token_data.claims.sub))
    }

    fn sign(&self, claims: &Claims) -> Result<String, JwtError> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)?)
    }
}

fn now_secs() -> Result<u64, JwtError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| JwtError::Clock)?
        .as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(secret: &str) -> JwtService {
        JwtService::new(&JwtConfig {
            secret: secret.to_string(),
            token_ttl: 3600,
        })
    }

    #[test]
    fn test_generate_and_validate_token() {
        let jwt = service("test-secret");
        let token = jwt.generate_token(42).unwrap();
        assert_eq!(jwt.validate_token(&token).unwrap(), 42);
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let token = service("secret-a").generate_token(1).unwrap();
        assert!(matches!(
            service("secret-b").validate_token(&token),
            Err(JwtError::Invalid(_))
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let jwt = service("test-secret");
        let now = now_secs().unwrap();
        let token = jwt
            .sign(&Claims {
                sub: "1".to_string(),
                iat: now - 7200,
                exp: now - 3600,
            })
            .unwrap();
        assert!(matches!(jwt.validate_token(&token), Err(JwtError::Invalid(_))));
    }

    #[test]
    fn test_non_numeric_subject_is_rejected() {
        let jwt = service("test-secret");
        let now = now_secs().unwrap();
        let token = jwt
            .sign(&Claims {
                sub: "not-a-number".to_string(),
                iat: now,
                exp: now + 60,
            })
            .unwrap();
        assert!(matches!(jwt.validate_token(&token), Err(JwtError::Subject(_))));
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        assert!(service("test-secret").validate_token("not.a.jwt").is_err());
        assert!(service("test-secret").validate_token("").is_err());
    }
}
