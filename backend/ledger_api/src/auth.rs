//! Caller identity from bearer JWTs.
//!
//! Every authenticated request carries `Authorization: Bearer <jwt>`, an
//! HS256 token signed with the shared `SECRET`. The `sub` claim is the user
//! id; `is_superuser` grants administrator rights.
//!
//! Handlers pick the extractor matching the access they need: [`User`] or
//! [`Admin`].

use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::api::ApiState;
use crate::errors::LedgerError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(default)]
    pub is_superuser: bool,
}

/// Checks bearer tokens against the configured secret.
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        // Issuers may stamp their own audience; it carries no rights here.
        validation.validate_aud = false;
        TokenVerifier {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<User, LedgerError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| LedgerError::Unauthorized(format!("Invalid token: {e}")))?;
        let user_id = data
            .claims
            .sub
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| LedgerError::Unauthorized("Token subject is not a user id".into()))?;
        Ok(User {
            user_id,
            is_superuser: data.claims.is_superuser,
        })
    }
}

/// An authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct User {
    pub user_id: i64,
    pub is_superuser: bool,
}

/// An authenticated superuser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admin;

#[async_trait]
impl FromRequestParts<Arc<ApiState>> for User {
    type Rejection = LedgerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ApiState>,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| LedgerError::Unauthorized("Missing bearer token".into()))?;
        let token = raw
            .to_str()
            .ok()
            .and_then(|s| s.strip_prefix("Bearer "))
            .ok_or_else(|| LedgerError::Unauthorized("Malformed Authorization header".into()))?;
        state.tokens.verify(token.trim())
    }
}

#[async_trait]
impl FromRequestParts<Arc<ApiState>> for Admin {
    type Rejection = LedgerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ApiState>,
    ) -> Result<Self, Self::Rejection> {
        let user = User::from_request_parts(parts, state).await?;
        if !user.is_superuser {
            return Err(LedgerError::Forbidden(
                "Administrator rights required".into(),
            ));
        }
        Ok(Admin)
    }
}

/// Sign a token the way the session issuer does.
#[cfg(test)]
pub fn issue_token(secret: &str, sub: &str, is_superuser: bool, ttl: chrono::Duration) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = Claims {
        sub: sub.to_string(),
        exp: (chrono::Utc::now() + ttl).timestamp().max(0) as usize,
        is_superuser,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const SECRET: &str = "shared-secret";

    #[test]
    fn valid_token_names_the_user() {
        let verifier = TokenVerifier::new(SECRET);
        let token = issue_token(SECRET, "42", false, Duration::hours(1));
        assert_eq!(
            verifier.verify(&token).unwrap(),
            User {
                user_id: 42,
                is_superuser: false
            }
        );

        let admin = issue_token(SECRET, "1", true, Duration::hours(1));
        assert!(verifier.verify(&admin).unwrap().is_superuser);
    }

    #[test]
    fn token_signed_with_other_secret_is_refused() {
        let verifier = TokenVerifier::new(SECRET);
        let forged = issue_token("guessed", "42", true, Duration::hours(1));
        assert!(matches!(
            verifier.verify(&forged),
            Err(LedgerError::Unauthorized(_))
        ));
    }

    #[test]
    fn expired_token_is_refused() {
        let verifier = TokenVerifier::new(SECRET);
        let stale = issue_token(SECRET, "42", false, Duration::hours(-2));
        assert!(matches!(
            verifier.verify(&stale),
            Err(LedgerError::Unauthorized(_))
        ));
    }

    #[test]
    fn subject_must_be_a_positive_id() {
        let verifier = TokenVerifier::new(SECRET);
        for sub in ["alice", "0", "-3"] {
            let token = issue_token(SECRET, sub, false, Duration::hours(1));
            assert!(matches!(
                verifier.verify(&token),
                Err(LedgerError::Unauthorized(_))
            ));
        }
        assert!(verifier.verify("not-a-jwt").is_err());
    }
}
