//! Bearer token validation for the Pulse gateway.
//!
//! Tokens are HS256 JWTs minted by the app tier's identity service. This
//! layer only validates them and resolves the subject to a known user;
//! it never issues tokens to clients. A signing helper exists so tests
//! and tooling can mint subjects against the shared secret.
//!
//! # Presentation
//!
//! - REST requests carry `Authorization: Bearer <jwt>`
//! - WebSocket connects carry `?token=<jwt>` in the query string, checked
//!   before the upgrade is accepted

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

use crate::models::{User, UserId};
use crate::store::Store;

/// Claims carried by app-tier bearer tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject user id
    pub user_id: UserId,
    /// Expiry, seconds since epoch
    pub exp: i64,
}

/// Validates bearer tokens against the shared HMAC secret
#[derive(Clone)]
pub struct TokenValidator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Validate a token and return its claims
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken,
            })
    }

    /// Validate a token and resolve its subject to a known user.
    ///
    /// A syntactically valid token whose subject the store does not know
    /// is an authentication failure, not a lookup miss.
    pub fn authenticate(&self, token: &str, store: &Store) -> Result<User, AuthError> {
        let claims = self.validate(token)?;
        store.user(claims.user_id).ok_or(AuthError::UnknownSubject)
    }

    /// Sign a token for a subject, valid for `ttl_secs` from now
    pub fn sign(&self, user_id: UserId, ttl_secs: i64) -> Result<String, AuthError> {
        let claims = Claims {
            user_id,
            exp: Utc::now().timestamp() + ttl_secs,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|_| AuthError::TokenCreation)
    }
}

/// Authentication error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No credential presented
    MissingToken,
    /// Authorization header present but malformed
    InvalidHeader,
    /// Signature or structure invalid
    InvalidToken,
    /// Token expired
    Expired,
    /// Valid token, but the subject is not a known user
    UnknownSubject,
    /// Signing failed (test/tooling path)
    TokenCreation,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AuthError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "MISSING_AUTH",
                "Authentication credentials were not provided",
            ),
            AuthError::InvalidHeader => (
                StatusCode::BAD_REQUEST,
                "INVALID_AUTH",
                "Invalid Authorization header format",
            ),
            AuthError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Invalid or expired token",
            ),
            AuthError::Expired => (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED", "Token expired"),
            AuthError::UnknownSubject => (
                StatusCode::UNAUTHORIZED,
                "UNKNOWN_SUBJECT",
                "Token subject is not a known user",
            ),
            AuthError::TokenCreation => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "TOKEN_CREATION",
                "Failed to create token",
            ),
        };

        let body = Json(AuthErrorResponse {
            error: message.to_string(),
            code,
        });

        (status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
struct AuthErrorResponse {
    error: String,
    code: &'static str,
}

/// Extract Bearer token from Authorization header
pub fn extract_bearer_token(authorization: &str) -> Option<&str> {
    authorization
        .strip_prefix("Bearer ")
        .or_else(|| authorization.strip_prefix("bearer "))
}
