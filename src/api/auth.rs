//! Bearer-token authentication. Tokens are issued elsewhere; this service
//! only verifies them.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use http::{header::AUTHORIZATION, request::Parts};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::api::AppState;
use crate::error::{AppError, AuthError};
use crate::ledger::{Requester, Role};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: i64,
}

/// HS256 verifier for caller tokens
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Requester, AuthError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| Requester::new(data.claims.sub, data.claims.role))
            .map_err(|e| {
                debug!("Token rejected: {}", e);
                AuthError::InvalidToken
            })
    }
}

fn bearer_token(parts: &Parts) -> Result<Option<&str>, AuthError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = header.to_str().map_err(|_| AuthError::InvalidToken)?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(Some)
        .ok_or(AuthError::InvalidToken)
}

/// Authenticated caller; rejects the request with 401 otherwise
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Requester);

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?.ok_or(AuthError::MissingToken)?;
        Ok(Caller(state.auth.verify(token)?))
    }
}

/// Caller when a valid token is present. Guests and stale tokens both
/// resolve to `None`, so donating never requires signing in.
#[derive(Debug, Clone, Copy)]
pub struct OptionalCaller(pub Option<Requester>);

#[async_trait]
impl FromRequestParts<AppState> for OptionalCaller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let requester = match bearer_token(parts) {
            Ok(Some(token)) => state.auth.verify(token).ok(),
            Ok(None) | Err(_) => None,
        };
        Ok(OptionalCaller(requester))
    }
}
