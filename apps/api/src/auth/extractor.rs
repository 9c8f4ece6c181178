use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use tracing::debug;

use crate::auth::policy::Actor;
use crate::auth::store;
use crate::auth::tokens::TokenType;
use crate::errors::AppError;
use crate::models::user::{Role, UserRow};
use crate::state::AppState;

/// A caller holding a valid access token for an active account.
pub struct AuthUser {
    pub user: UserRow,
    pub actor: Actor,
}

/// Like [`AuthUser`] but never rejects: a missing or bad token yields `None`.
pub struct OptionalAuthUser(pub Option<AuthUser>);

/// Extracts the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Resolves the bearer token in `headers` to an active user and their role.
pub async fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<AuthUser, AppError> {
    let token = bearer_token(headers).ok_or_else(|| {
        AppError::Unauthorized("Authentication credentials were not provided".to_string())
    })?;

    let claims = state
        .tokens
        .decode(token, TokenType::Access)
        .map_err(|e| AppError::Unauthorized(format!("Invalid token: {e}")))?;

    let user = store::find_user_by_id(&state.db, claims.user_id)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| AppError::Unauthorized("User not found or inactive".to_string()))?;

    let role = store::find_profile(&state.db, user.id)
        .await?
        .map(|profile| profile.role())
        .unwrap_or(Role::User);

    Ok(AuthUser {
        actor: Actor {
            user_id: user.id,
            email: user.email.clone(),
            role,
        },
        user,
    })
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate(&parts.headers, state).await
    }
}

#[async_trait]
impl FromRequestParts<AppState> for OptionalAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if bearer_token(&parts.headers).is_none() {
            return Ok(OptionalAuthUser(None));
        }
        match authenticate(&parts.headers, state).await {
            Ok(user) => Ok(OptionalAuthUser(Some(user))),
            Err(AppError::Unauthorized(reason)) => {
                debug!("Ignoring unusable bearer token: {reason}");
                Ok(OptionalAuthUser(None))
            }
            Err(e) => Err(e),
        }
    }
}
