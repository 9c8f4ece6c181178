use axum::{extract::State, http::HeaderMap, Json};
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::PgConnection;
use tracing::{info, warn};

use crate::auth::extractor::{authenticate, bearer_token, AuthUser};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::store::{self, NewUser};
use crate::auth::tokens::{TokenPair, TokenType};
use crate::errors::AppError;
use crate::models::user::{ProfileRow, Role, UserRow, UserView};
use crate::state::AppState;
use crate::validation::{require_email, require_non_empty};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserView,
    pub profile: Option<ProfileRow>,
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserView,
    pub profile: Option<ProfileRow>,
}

/// Splits "First Middle Last" into ("First", "Middle Last").
fn split_full_name(full_name: &str) -> (String, String) {
    let mut words = full_name.split_whitespace();
    let first = words.next().unwrap_or_default().to_string();
    let rest = words.collect::<Vec<_>>().join(" ");
    (first, rest)
}

fn issue_tokens(state: &AppState, user_id: i64) -> Result<TokenPair, AppError> {
    state
        .tokens
        .issue_pair(user_id)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("token issue failed: {e}")))
}

/// Validated registration input with the password already hashed.
struct NewAccount {
    email: String,
    password_hash: String,
    full_name: String,
}

async fn prepare_account(req: RegisterRequest) -> Result<NewAccount, AppError> {
    let email = require_email("email", &req.email)?;
    require_non_empty("password", &req.password)?;
    require_non_empty("full_name", &req.full_name)?;

    Ok(NewAccount {
        email,
        password_hash: hash_password(req.password).await?,
        full_name: req.full_name.trim().to_string(),
    })
}

/// Inserts the user and their profile on `conn`, which the caller keeps inside a transaction.
async fn insert_account(
    conn: &mut PgConnection,
    account: &NewAccount,
    role: Role,
    is_superuser: bool,
) -> Result<(UserRow, ProfileRow), AppError> {
    if store::email_taken(&mut *conn, &account.email).await? {
        return Err(email_taken_error(&account.email, role));
    }

    let (first_name, last_name) = split_full_name(&account.full_name);
    let user = store::insert_user(
        &mut *conn,
        NewUser {
            email: &account.email,
            password_hash: &account.password_hash,
            first_name: &first_name,
            last_name: &last_name,
            is_staff: role == Role::Admin,
            is_superuser,
        },
    )
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            email_taken_error(&account.email, role)
        }
        other => AppError::Database(other),
    })?;
    let profile = store::insert_profile(&mut *conn, user.id, &account.full_name, None, role).await?;

    info!("Created {role} account {} (id {})", user.email, user.id);
    Ok((user, profile))
}

fn email_taken_error(email: &str, role: Role) -> AppError {
    match role {
        Role::Admin => AppError::Validation(format!(
            "User with email {email} already exists. Please log in instead."
        )),
        _ => AppError::Validation("User with this email already exists".to_string()),
    }
}

fn auth_response(
    state: &AppState,
    user: &UserRow,
    profile: ProfileRow,
) -> Result<AuthResponse, AppError> {
    let tokens = issue_tokens(state, user.id)?;
    Ok(AuthResponse {
        user: UserView::from(user),
        profile: Some(profile),
        access: tokens.access,
        refresh: tokens.refresh,
    })
}

/// POST /api/auth/register
pub async fn handle_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let account = prepare_account(req).await?;

    let mut tx = state.db.begin().await?;
    let (user, profile) = insert_account(&mut *tx, &account, Role::User, false).await?;
    tx.commit().await?;

    Ok(Json(auth_response(&state, &user, profile)?))
}

/// POST /api/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    info!("Login attempt for {}", req.email.trim());
    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    let user = store::find_user_by_email(&state.db, req.email.trim())
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(req.password, user.password_hash.clone()).await? {
        warn!("Authentication failed for {}", user.email);
        return Err(invalid());
    }
    if !user.is_active {
        return Err(AppError::Unauthorized("User account is disabled".to_string()));
    }

    let profile = store::get_or_create_profile(&state.db, &user).await?;
    let tokens = issue_tokens(&state, user.id)?;

    Ok(Json(AuthResponse {
        user: UserView::from(&user),
        profile: Some(profile),
        access: tokens.access,
        refresh: tokens.refresh,
    }))
}

/// GET /api/auth/me
pub async fn handle_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<MeResponse>, AppError> {
    let profile = store::find_profile(&state.db, auth.user.id).await?;
    Ok(Json(MeResponse {
        user: UserView::from(&auth.user),
        profile,
    }))
}

/// POST /api/auth/token/refresh
///
/// The presented refresh token is blacklisted and a fresh pair is returned.
pub async fn handle_refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, AppError> {
    let claims = state
        .tokens
        .decode(&req.refresh, TokenType::Refresh)
        .map_err(|e| AppError::Unauthorized(format!("Invalid refresh token: {e}")))?;

    let user = store::find_user_by_id(&state.db, claims.user_id)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| AppError::Unauthorized("Invalid refresh token: unknown user".to_string()))?;

    let expires_at = Utc
        .timestamp_opt(claims.exp, 0)
        .single()
        .unwrap_or_else(Utc::now);
    let rotated = store::blacklist_token(&state.db, claims.jti, user.id, expires_at).await?;
    if !rotated {
        return Err(AppError::Unauthorized(
            "Invalid refresh token: token is blacklisted".to_string(),
        ));
    }

    Ok(Json(issue_tokens(&state, user.id)?))
}

/// POST /api/auth/token/blacklist
pub async fn handle_blacklist(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<Value>, AppError> {
    let claims = state
        .tokens
        .decode(&req.refresh, TokenType::Refresh)
        .map_err(|e| AppError::Validation(format!("Invalid refresh token: {e}")))?;

    let expires_at = Utc
        .timestamp_opt(claims.exp, 0)
        .single()
        .unwrap_or_else(Utc::now);
    store::blacklist_token(&state.db, claims.jti, claims.user_id, expires_at).await?;
    info!("Blacklisted refresh token {} for user {}", claims.jti, claims.user_id);

    Ok(Json(json!({ "message": "Token blacklisted successfully" })))
}

/// POST /api/auth/create-admin
///
/// Open while no admin exists; afterwards only an admin may call it. The
/// admin check and the insert run under one advisory lock so concurrent
/// bootstrap calls cannot each see an empty admin set.
pub async fn handle_create_admin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let account = prepare_account(req).await?;

    let mut tx = state.db.begin().await?;
    store::lock_admin_bootstrap(&mut *tx).await?;

    if store::email_taken(&mut *tx, &account.email).await? {
        return Err(email_taken_error(&account.email, Role::Admin));
    }

    let admin_exists = store::admin_exists(&mut *tx).await?;
    if admin_exists {
        if bearer_token(&headers).is_none() {
            return Err(AppError::Unauthorized(
                "An admin account already exists. Log in with an existing admin account to create additional admins."
                    .to_string(),
            ));
        }
        let caller = authenticate(&headers, &state).await?;
        if !caller.actor.is_admin() {
            return Err(AppError::Forbidden(
                "Only admins can create other admin accounts".to_string(),
            ));
        }
    }

    let (user, profile) = insert_account(&mut *tx, &account, Role::Admin, !admin_exists).await?;
    tx.commit().await?;

    Ok(Json(auth_response(&state, &user, profile)?))
}
