//! Bearer token authentication for reviewers.
//!
//! Tokens are HS256 JWTs minted by the identity provider with a shared
//! secret. The reviewer identity written into lock and skip columns is the
//! `email` claim, falling back to `sub`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// Decoded reviewer token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewerClaims {
    pub sub: String,
    pub email: Option<String>,
    pub exp: i64,
    pub iss: Option<String>,
}

impl ReviewerClaims {
    pub fn identity(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .or_else(|| Some(self.sub.trim()).filter(|s| !s.is_empty()))
    }
}

/// Authenticated reviewer extracted from request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// Name stamped on locks and skips
    pub identity: String,
    pub is_admin: bool,
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(ApiError::forbidden("Admin access required"))
        }
    }
}

/// Verifies HS256 reviewer tokens.
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<ReviewerClaims, ApiError> {
        let data = decode::<ReviewerClaims>(token, &self.key, &self.validation)
            .map_err(|e| ApiError::unauthorized(format!("Token validation failed: {}", e)))?;
        Ok(data.claims)
    }
}

/// Axum extractor for authenticated reviewer.
#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header format"))?;

        let claims = state.tokens.verify(token.trim())?;
        let identity = claims
            .identity()
            .ok_or_else(|| ApiError::unauthorized("Token carries no reviewer identity"))?
            .to_string();

        Ok(AuthUser {
            is_admin: state.config.is_admin(&identity),
            identity,
        })
    }
}
