use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::{policy, AuthUser, Resource};
use crate::consultation::status::ConsultationStatus;
use crate::errors::AppError;
use crate::models::consultation::ConsultationRequestRow;
use crate::state::AppState;
use crate::validation::{parse_date, parse_path_id, require_email, require_non_empty};

#[derive(Debug, Deserialize)]
pub struct ConsultationCreateRequest {
    pub user_name: String,
    pub user_email: String,
    pub user_phone: Option<String>,
    pub consultation_type: String,
    pub consultation_reason: String,
    pub preferred_date: String,
    pub preferred_time: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

/// POST /api/consultation/request
pub async fn handle_create_request(
    State(state): State<AppState>,
    Json(req): Json<ConsultationCreateRequest>,
) -> Result<Json<ConsultationRequestRow>, AppError> {
    let email = require_email("user_email", &req.user_email)?;
    require_non_empty("user_name", &req.user_name)?;
    let preferred_date = parse_date("date", &req.preferred_date)?;

    let row = sqlx::query_as::<_, ConsultationRequestRow>(
        r#"
        INSERT INTO consultation_requests
            (id, user_name, user_email, user_phone, consultation_type,
             consultation_reason, preferred_date, preferred_time)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.user_name.trim())
    .bind(&email)
    .bind(&req.user_phone)
    .bind(&req.consultation_type)
    .bind(&req.consultation_reason)
    .bind(preferred_date)
    .bind(&req.preferred_time)
    .fetch_one(&state.db)
    .await?;

    info!("Consultation request {} created for {}", row.id, row.user_email);
    Ok(Json(row))
}

/// GET /api/consultation/requests
pub async fn handle_list_requests(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<ConsultationRequestRow>>, AppError> {
    policy::require(&auth.actor, Resource::AdminArea)?;
    let rows = sqlx::query_as::<_, ConsultationRequestRow>(
        "SELECT * FROM consultation_requests ORDER BY created_at DESC",
    )
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

/// GET /api/consultation/requests/:id
pub async fn handle_get_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConsultationRequestRow>, AppError> {
    let id = parse_path_id(&id, "Consultation request")?;
    let row = sqlx::query_as::<_, ConsultationRequestRow>(
        "SELECT * FROM consultation_requests WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Consultation request not found".to_string()))?;
    Ok(Json(row))
}

/// PATCH /api/consultation/requests/:id/status
pub async fn handle_update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<Json<ConsultationRequestRow>, AppError> {
    policy::require(&auth.actor, Resource::AdminArea)?;
    let status: ConsultationStatus = req.status.parse()?;
    let id = parse_path_id(&id, "Consultation request")?;

    let row = sqlx::query_as::<_, ConsultationRequestRow>(
        "UPDATE consultation_requests SET status = $2 WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(status.as_str())
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Consultation request not found".to_string()))?;

    info!("Consultation request {} moved to {status} by user {}", row.id, auth.user.id);
    Ok(Json(row))
}
