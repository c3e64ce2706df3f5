use axum::{
    Json,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{TimeDelta, Utc};
use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::{AppState, error::AppError, models::User};

/// Tokens are valid for a day after issuance.
pub const TOKEN_VALIDITY_HOURS: i64 = 24;

/// Claims
///
/// The payload signed into every token: who the holder is and until when the
/// token may be presented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// The user id.
    pub id: i64,
    pub username: String,
    /// Issued At (iat), seconds since the epoch.
    pub iat: i64,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: i64,
}

/// TokenService
///
/// Signs and verifies HS256 tokens with a secret supplied at process start.
/// Cloning is cheap; the keys sit behind an `Arc`.
#[derive(Clone)]
pub struct TokenService {
    keys: Arc<Keys>,
    validity: TimeDelta,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        Self {
            keys: Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret.as_bytes()),
                decoding: DecodingKey::from_secret(secret.as_bytes()),
            }),
            validity: TimeDelta::hours(TOKEN_VALIDITY_HOURS),
        }
    }

    /// Issues a token for `user`, valid from now until now + 24h.
    pub fn issue(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            id: user.id,
            username: user.username.clone(),
            iat: now.timestamp(),
            exp: (now + self.validity).timestamp(),
        };
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::default(), claims, &self.keys.encoding).map_err(|e| {
            tracing::error!(error = %e, "token signing failed");
            AppError::Auth(e.to_string())
        })
    }

    /// Verifies signature and expiry (no leeway). The error message is the
    /// machine-readable reason returned to the client.
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;

        decode::<Claims>(token, &self.keys.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let reason = match e.kind() {
                    ErrorKind::ExpiredSignature => "jwt expired",
                    ErrorKind::InvalidSignature => "invalid signature",
                    ErrorKind::InvalidAlgorithm => "invalid algorithm",
                    ErrorKind::ImmatureSignature => "jwt not active",
                    _ => "jwt malformed",
                };
                AppError::Auth(reason.to_string())
            })
    }
}

const BAD_SCHEME: &str =
    r#"Bad Authorization header format. Format is "Authorization: Bearer <token>""#;

/// bearer_token
///
/// Pulls the token out of `Authorization: Bearer <token>`.
fn bearer_token(request: &Request) -> Result<&str, AppError> {
    let value = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::Auth("Token not found".to_string()))?;
    value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Auth(BAD_SCHEME.to_string()))
}

/// Whether `path` sits under the public prefix (segment-aware, so `/publicity`
/// does not match `/public`).
pub fn is_public_path(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// auth_gate
///
/// Router-wide middleware. Public-prefixed paths pass straight through; every
/// other request must carry a valid, unexpired token or is answered with
/// `401 {"error": <reason>}` before any handler runs.
pub async fn auth_gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if is_public_path(request.uri().path(), &state.config.public_prefix) {
        return next.run(request).await;
    }

    let verified = bearer_token(&request).and_then(|token| state.tokens.verify(token));
    match verified {
        Ok(claims) => {
            tracing::debug!(user_id = claims.id, "token accepted");
            next.run(request).await
        }
        Err(err) => {
            tracing::warn!(path = %request.uri().path(), reason = %err, "request rejected by auth gate");
            (StatusCode::UNAUTHORIZED, Json(json!({ "error": err.to_string() }))).into_response()
        }
    }
}
