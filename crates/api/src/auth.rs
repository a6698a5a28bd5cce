//! Bearer token authentication.
//!
//! Tokens are issued by the external auth service; this layer only verifies
//! the HS256 signature and extracts the caller's identity and role into a
//! request extension.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Caller role carried in the token claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Instructor,
    Admin,
}

/// Authenticated caller, available to handlers as an extension.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    role: Option<String>,
    #[allow(dead_code)]
    exp: usize,
}

/// Verifies bearer tokens issued by the auth service.
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<AuthUser, ApiError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token verification failed");
                ApiError::Unauthorized
            })?;

        let user_id = data
            .claims
            .sub
            .parse::<Uuid>()
            .map_err(|_| ApiError::Unauthorized)?;

        let role = match data.claims.role.as_deref() {
            Some("admin") => Role::Admin,
            Some("instructor") => Role::Instructor,
            _ => Role::User,
        };

        Ok(AuthUser { user_id, role })
    }
}

/// Middleware requiring a valid bearer token; inserts [`AuthUser`] into the
/// request extensions for handlers downstream.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let user = state.jwt.verify(token)?;
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
