use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth::{policy, AuthUser};
use crate::crs::lookup::{find_calculation, CalculationView};
use crate::crs::session::{upsert_session, SessionUpdate};
use crate::errors::AppError;
use crate::models::crs::{CrsCalculationRow, CrsDetailedRow, CrsSessionRow};
use crate::state::AppState;
use crate::validation::parse_path_id;

const CALCULATION_STATUSES: [&str; 3] = ["completed", "pending", "failed"];

fn default_true() -> bool {
    true
}

fn default_status() -> String {
    "completed".to_string()
}

#[derive(Debug, Deserialize)]
pub struct CalculationRequest {
    pub score: i32,
    pub category_breakdown: Value,
    pub input_data: Value,
    #[serde(default = "default_true")]
    pub is_latest: bool,
    #[serde(default = "default_status")]
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct DetailedCalculationRequest {
    pub user_name: String,
    pub user_email: String,
    pub user_phone: Option<String>,
    pub input_data: Value,
    pub crs_score: i32,
    pub category_breakdown: Value,
    pub improvement_suggestions: Option<Value>,
    pub session_id: Option<String>,
}

/// Full session state as returned by the read endpoint.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub session_id: String,
    pub current_step: String,
    pub completed_steps: Vec<String>,
    pub partial_data: Value,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub user_phone: Option<String>,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CrsSessionRow> for SessionView {
    fn from(row: CrsSessionRow) -> Self {
        Self {
            id: row.id,
            session_id: row.session_id,
            current_step: row.current_step,
            completed_steps: row.completed_steps.0,
            partial_data: row.partial_data,
            user_name: row.user_name,
            user_email: row.user_email,
            user_phone: row.user_phone,
            is_completed: row.is_completed,
            created_at: row.created_at,
            updated_at: row.last_activity,
        }
    }
}

/// Acknowledgement for a session write.
#[derive(Debug, Serialize)]
pub struct SessionSaved {
    pub id: Uuid,
    pub session_id: String,
    pub current_step: String,
    pub completed_steps: Vec<String>,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// POST /api/crs/calculate
pub async fn handle_calculate(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CalculationRequest>,
) -> Result<Json<CrsCalculationRow>, AppError> {
    if !CALCULATION_STATUSES.contains(&req.status.as_str()) {
        return Err(AppError::Validation(format!(
            "Invalid status. Must be one of: {}",
            CALCULATION_STATUSES.join(", ")
        )));
    }

    let mut tx = state.db.begin().await?;
    if req.is_latest {
        sqlx::query(
            "UPDATE crs_calculations SET is_latest = FALSE, updated_at = NOW() WHERE user_id = $1 AND is_latest",
        )
        .bind(auth.user.id)
        .execute(&mut *tx)
        .await?;
    }
    let calculation = sqlx::query_as::<_, CrsCalculationRow>(
        r#"
        INSERT INTO crs_calculations
            (id, user_id, score, category_breakdown, input_data, is_latest, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth.user.id)
    .bind(req.score)
    .bind(&req.category_breakdown)
    .bind(&req.input_data)
    .bind(req.is_latest)
    .bind(&req.status)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    info!(
        "Saved CRS calculation {} (score {}) for user {}",
        calculation.id, calculation.score, auth.user.id
    );
    Ok(Json(calculation))
}

/// POST /api/crs/calculate-detailed
pub async fn handle_calculate_detailed(
    State(state): State<AppState>,
    Json(req): Json<DetailedCalculationRequest>,
) -> Result<Json<CrsDetailedRow>, AppError> {
    let calculation = sqlx::query_as::<_, CrsDetailedRow>(
        r#"
        INSERT INTO crs_calculations_detailed
            (id, user_name, user_email, user_phone, input_data, crs_score,
             category_breakdown, improvement_suggestions, session_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.user_name.trim())
    .bind(req.user_email.trim())
    .bind(&req.user_phone)
    .bind(&req.input_data)
    .bind(req.crs_score)
    .bind(&req.category_breakdown)
    .bind(req.improvement_suggestions.unwrap_or_else(|| json!({})))
    .bind(&req.session_id)
    .fetch_one(&state.db)
    .await?;

    info!(
        "Saved detailed CRS calculation {} (score {})",
        calculation.id, calculation.crs_score
    );
    Ok(Json(calculation))
}

/// GET /api/crs/calculations
pub async fn handle_list_calculations(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<CrsCalculationRow>>, AppError> {
    let rows = sqlx::query_as::<_, CrsCalculationRow>(
        "SELECT * FROM crs_calculations WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(auth.user.id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

/// GET /api/crs/session/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    let id = parse_path_id(&id, "Calculation session")?;
    let row = sqlx::query_as::<_, CrsSessionRow>("SELECT * FROM crs_calculation_sessions WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Calculation session not found".to_string()))?;
    Ok(Json(SessionView::from(row)))
}

/// POST /api/crs/session
pub async fn handle_upsert_session(
    State(state): State<AppState>,
    Json(req): Json<SessionUpdate>,
) -> Result<Json<SessionSaved>, AppError> {
    if req.session_id.trim().is_empty() {
        return Err(AppError::Validation("session_id: must not be empty".to_string()));
    }
    let row = upsert_session(&state.db, &req).await?;
    Ok(Json(SessionSaved {
        id: row.id,
        session_id: row.session_id,
        current_step: row.current_step,
        completed_steps: row.completed_steps.0,
        is_completed: row.is_completed,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}

/// GET /api/crs/calculation/:id
pub async fn handle_get_calculation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<CalculationView>, AppError> {
    let id = parse_path_id(&id, "Calculation")?;
    let calculation = find_calculation(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Calculation not found".to_string()))?;
    policy::require(&auth.actor, calculation.resource())?;
    Ok(Json(calculation.into_view()))
}
