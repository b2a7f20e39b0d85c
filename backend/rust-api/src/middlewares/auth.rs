use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::services::AppState;

/// Claims issued by the account service. Only `sub` (the learner id) is
/// used to scope records.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtClaims {
    pub sub: String,
    #[serde(default)]
    pub role: Option<String>,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    ExpiredToken,
    #[error("Invalid token signature")]
    InvalidSignature,
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Tokens are minted by the account service; this is kept for tooling
    /// and tests that need a valid bearer.
    pub fn generate_token(&self, claims: &JwtClaims) -> Result<String, AuthError> {
        encode(&Header::default(), claims, &self.encoding_key).map_err(|_| AuthError::InvalidToken)
    }

    pub fn validate_token(&self, token: &str) -> Result<JwtClaims, AuthError> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::InvalidToken,
            })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = bearer_token(&headers).ok_or(StatusCode::UNAUTHORIZED)?;

    let claims = state.jwt.validate_token(token).map_err(|e| {
        tracing::warn!("JWT validation failed: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    if claims.sub.trim().is_empty() {
        tracing::warn!("JWT without subject rejected");
        return Err(StatusCode::UNAUTHORIZED);
    }

    tracing::debug!("Authenticated learner: {}", claims.sub);
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(exp_offset: i64) -> JwtClaims {
        let now = chrono::Utc::now().timestamp();
        JwtClaims {
            sub: "learner-1".to_string(),
            role: None,
            exp: (now + exp_offset) as usize,
            iat: now as usize,
        }
    }

    #[test]
    fn issued_token_validates() {
        let service = JwtService::new("test-secret");
        let token = service.generate_token(&claims(3600)).unwrap();
        assert_eq!(service.validate_token(&token).unwrap().sub, "learner-1");
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let token = JwtService::new("a").generate_token(&claims(3600)).unwrap();
        assert!(matches!(
            JwtService::new("b").validate_token(&token),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let service = JwtService::new("test-secret");
        let token = service.generate_token(&claims(-3600)).unwrap();
        assert!(matches!(
            service.validate_token(&token),
            Err(AuthError::ExpiredToken)
        ));
    }

    #[test]
    fn bearer_prefix_is_required() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Token abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
        headers.insert("authorization", "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc"));
    }
}
