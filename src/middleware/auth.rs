use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc};
use thiserror::Error;
use tracing::{debug, warn};

/// Rejects requests that do not carry a valid bearer token for `state.role`. The verified
/// claims are stored in the request extensions.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| {
            debug!(uri = %req.uri(), "missing bearer token");
            StatusCode::UNAUTHORIZED
        })?;

    let claims = validate_token(&state.secret, token, state.role).map_err(|err| {
        warn!(uri = %req.uri(), error = %err, "rejected bearer token");
        StatusCode::UNAUTHORIZED
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Admin,
    Customer,
}

impl FromStr for Role {
    type Err = AuthMiddlewareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "customer" => Ok(Role::Customer),
            _ => Err(AuthMiddlewareError::InvalidRole),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Customer => write!(f, "customer"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthState {
    pub secret: Arc<String>,
    pub role: Role,
}

/// Signs a token for `sub`. Tokens are normally minted by the identity service; this is
/// used by tooling and tests that share the secret.
pub fn generate_token(
    secret: &str,
    sub: &str,
    role: Role,
    ttl: Duration,
) -> Result<String, AuthMiddlewareError> {
    let exp = Utc::now()
        .checked_add_signed(ttl)
        .ok_or(AuthMiddlewareError::GenerationFail)?
        .timestamp();

    let claims = Claims {
        sub: sub.to_string(),
        role: role.to_string(),
        exp: usize::try_from(exp).map_err(|_| AuthMiddlewareError::GenerationFail)?,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthMiddlewareError::GenerationFail)
}

pub fn validate_token(
    secret: &str,
    token: &str,
    required: Role,
) -> Result<Claims, AuthMiddlewareError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|err| match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthMiddlewareError::TokenExpired,
        _ => AuthMiddlewareError::ValidationFail,
    })?
    .claims;

    if Role::from_str(&claims.role)? != required {
        return Err(AuthMiddlewareError::InvalidRole);
    }
    Ok(claims)
}

#[derive(Error, Debug)]
pub enum AuthMiddlewareError {
    #[error("Invalid role")]
    InvalidRole,
    #[error("Token expired")]
    TokenExpired,
    #[error("Failed to validate token")]
    ValidationFail,
    #[error("Failed to generate token")]
    GenerationFail,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn admin_token_round_trips() {
        let token = generate_token(SECRET, "ops", Role::Admin, Duration::hours(1)).unwrap();
        let claims = validate_token(SECRET, &token, Role::Admin).unwrap();
        assert_eq!(claims.sub, "ops");
        assert_eq!(claims.role, "admin");
    }

    #[test]
    fn customer_token_is_not_admin() {
        let token = generate_token(SECRET, "jane", Role::Customer, Duration::hours(1)).unwrap();
        assert!(matches!(
            validate_token(SECRET, &token, Role::Admin),
            Err(AuthMiddlewareError::InvalidRole)
        ));
    }

    #[test]
    fn wrong_secret_and_expired_tokens_fail() {
        let token = generate_token(SECRET, "ops", Role::Admin, Duration::hours(1)).unwrap();
        assert!(validate_token("other", &token, Role::Admin).is_err());

        let expired = generate_token(SECRET, "ops", Role::Admin, Duration::hours(-2)).unwrap();
        assert!(matches!(
            validate_token(SECRET, &expired, Role::Admin),
            Err(AuthMiddlewareError::TokenExpired)
        ));
    }
}
