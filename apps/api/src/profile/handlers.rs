use axum::{extract::State, Json};
use tracing::info;

use crate::auth::{store, AuthUser};
use crate::errors::AppError;
use crate::models::user::ProfileRow;
use crate::profile::patch::ProfilePatch;
use crate::state::AppState;

/// GET /api/profile
pub async fn handle_get_profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ProfileRow>, AppError> {
    let profile = store::get_or_create_profile(&state.db, &auth.user).await?;
    Ok(Json(profile))
}

/// PATCH /api/profile
pub async fn handle_update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(patch): Json<ProfilePatch>,
) -> Result<Json<ProfileRow>, AppError> {
    let current = store::get_or_create_profile(&state.db, &auth.user).await?;
    let updated = patch.apply(current)?;

    let row = sqlx::query_as::<_, ProfileRow>(
        r#"
        UPDATE user_profiles SET
            full_name = $2, phone = $3, target_province = $4, target_city = $5,
            planned_arrival_date = $6, current_location = $7, immigration_status = $8,
            language_preference = $9, notification_settings = $10, updated_at = $11
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(updated.id)
    .bind(&updated.full_name)
    .bind(&updated.phone)
    .bind(&updated.target_province)
    .bind(&updated.target_city)
    .bind(updated.planned_arrival_date)
    .bind(&updated.current_location)
    .bind(&updated.immigration_status)
    .bind(&updated.language_preference)
    .bind(&updated.notification_settings)
    .bind(updated.updated_at)
    .fetch_one(&state.db)
    .await?;

    info!("Updated profile for user {}", auth.user.id);
    Ok(Json(row))
}
