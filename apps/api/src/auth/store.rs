use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::user::{ProfileRow, Role, UserRow};

pub async fn find_user_by_id(db: impl PgExecutor<'_>, id: i64) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Email lookup is case-insensitive.
pub async fn find_user_by_email(
    db: impl PgExecutor<'_>,
    email: &str,
) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .fetch_optional(db)
        .await
}

pub async fn email_taken(db: impl PgExecutor<'_>, email: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))")
        .bind(email)
        .fetch_one(db)
        .await
}

pub struct NewUser<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub is_staff: bool,
    pub is_superuser: bool,
}

pub async fn insert_user(db: impl PgExecutor<'_>, user: NewUser<'_>) -> Result<UserRow, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        r#"
        INSERT INTO users (email, password_hash, first_name, last_name, is_staff, is_superuser)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(user.email)
    .bind(user.password_hash)
    .bind(user.first_name)
    .bind(user.last_name)
    .bind(user.is_staff)
    .bind(user.is_superuser)
    .fetch_one(db)
    .await
}

pub async fn insert_profile(
    db: impl PgExecutor<'_>,
    user_id: i64,
    full_name: &str,
    phone: Option<&str>,
    role: Role,
) -> Result<ProfileRow, sqlx::Error> {
    sqlx::query_as::<_, ProfileRow>(
        r#"
        INSERT INTO user_profiles (id, user_id, full_name, phone, role)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(full_name)
    .bind(phone)
    .bind(role.as_str())
    .fetch_one(db)
    .await
}

pub async fn find_profile(db: impl PgExecutor<'_>, user_id: i64) -> Result<Option<ProfileRow>, sqlx::Error> {
    sqlx::query_as::<_, ProfileRow>("SELECT * FROM user_profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await
}

/// Returns the user's profile, creating a default one on first access.
/// The display name falls back to the email when the account has no name.
pub async fn get_or_create_profile(db: &PgPool, user: &UserRow) -> Result<ProfileRow, sqlx::Error> {
    let full_name = user.full_name().unwrap_or_else(|| user.email.clone());
    sqlx::query(
        r#"
        INSERT INTO user_profiles (id, user_id, full_name, role)
        VALUES ($1, $2, $3, 'user')
        ON CONFLICT (user_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.id)
    .bind(&full_name)
    .execute(db)
    .await?;

    sqlx::query_as::<_, ProfileRow>("SELECT * FROM user_profiles WHERE user_id = $1")
        .bind(user.id)
        .fetch_one(db)
        .await
}

/// Advisory lock key serializing admin bootstrap.
const ADMIN_BOOTSTRAP_LOCK_KEY: i64 = 0x0ad1_0b00_7570;

/// Held until the surrounding transaction ends.
pub async fn lock_admin_bootstrap(db: impl PgExecutor<'_>) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(ADMIN_BOOTSTRAP_LOCK_KEY)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn admin_exists(db: impl PgExecutor<'_>) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM user_profiles WHERE role = 'admin')")
        .fetch_one(db)
        .await
}

/// Returns false when the `jti` was already blacklisted; repeating the call is a no-op.
pub async fn blacklist_token(
    db: impl PgExecutor<'_>,
    jti: Uuid,
    user_id: i64,
    expires_at: chrono::DateTime<chrono::Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO token_blacklist (jti, user_id, expires_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (jti) DO NOTHING
        "#,
    )
    .bind(jti)
    .bind(user_id)
    .bind(expires_at)
    .execute(db)
    .await?;
    Ok(result.rows_affected() == 1)
}
