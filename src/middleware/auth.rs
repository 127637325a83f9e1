// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Supabase access-token authentication middleware.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Cookie set by the Supabase auth helpers on the frontend.
pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";

/// Audience Supabase puts on tokens of signed-in users.
pub const AUTHENTICATED_AUDIENCE: &str = "authenticated";

/// Role in `app_metadata` that grants the admin routes.
pub const ADMIN_ROLE: &str = "admin";

/// Claims of a Supabase access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (auth user id, same as the profile id)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    pub aud: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Server-controlled metadata; users cannot edit it
    #[serde(default)]
    pub app_metadata: AppMetadata,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AppMetadata {
    #[serde(default)]
    pub role: Option<String>,
}

/// Authenticated user extracted from the access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub is_admin: bool,
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
}

/// Decode and validate an access token.
pub fn verify_token(token: &str, signing_key: &[u8]) -> Result<AuthUser, AppError> {
    let key = DecodingKey::from_secret(signing_key);
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[AUTHENTICATED_AUDIENCE]);

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| {
        tracing::debug!(error = %e, "Rejected access token");
        AppError::InvalidToken
    })?;

    let user_id = Uuid::parse_str(&token_data.claims.sub).map_err(|_| AppError::InvalidToken)?;
    let is_admin = token_data.claims.app_metadata.role.as_deref() == Some(ADMIN_ROLE);

    Ok(AuthUser {
        user_id,
        email: token_data.claims.email,
        is_admin,
    })
}

/// Middleware that requires a valid access token.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Try header first, then cookie
    let token = bearer_token(&request)
        .or_else(|| jar.get(ACCESS_TOKEN_COOKIE).map(|c| c.value().to_string()))
        .ok_or(AppError::Unauthorized)?;

    let auth_user = verify_token(&token, &state.config.jwt_signing_key)?;
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Middleware for admin routes; must run after [`require_auth`].
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AppError::Unauthorized)?;

    if !user.is_admin {
        tracing::warn!(user_id = %user.user_id, path = %request.uri().path(), "Non-admin hit admin route");
        return Err(AppError::Forbidden);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const KEY: &[u8] = b"test_jwt_key_32_bytes_minimum!!";

    fn token(sub: &str, aud: &str, role: Option<&str>, exp_offset: i64) -> String {
        let exp = (chrono::Utc::now().timestamp() + exp_offset) as usize;
        let claims = Claims {
            sub: sub.to_string(),
            exp,
            aud: aud.to_string(),
            email: Some("stylist@example.com".to_string()),
            app_metadata: AppMetadata {
                role: role.map(str::to_string),
            },
        };
        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(KEY)).unwrap()
    }

    #[test]
    fn test_valid_token_yields_user() {
        let id = Uuid::new_v4();
        let user = verify_token(&token(&id.to_string(), "authenticated", None, 3600), KEY).unwrap();
        assert_eq!(user.user_id, id);
        assert!(!user.is_admin);
        assert_eq!(user.email.as_deref(), Some("stylist@example.com"));
    }

    #[test]
    fn test_admin_role_from_app_metadata() {
        let id = Uuid::new_v4().to_string();
        let user = verify_token(&token(&id, "authenticated", Some("admin"), 3600), KEY).unwrap();
        assert!(user.is_admin);
    }

    #[test]
    fn test_rejects_bad_tokens() {
        let id = Uuid::new_v4().to_string();
        // Expired beyond the default leeway
        assert!(verify_token(&token(&id, "authenticated", None, -3600), KEY).is_err());
        // Anonymous-role audience
        assert!(verify_token(&token(&id, "anon", None, 3600), KEY).is_err());
        // Subject is not a uuid
        assert!(verify_token(&token("12345", "authenticated", None, 3600), KEY).is_err());
        // Wrong key
        assert!(verify_token(&token(&id, "authenticated", None, 3600), b"another_key_32_bytes_minimum!!!").is_err());
    }
}
