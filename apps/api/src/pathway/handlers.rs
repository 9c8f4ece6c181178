use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;

use crate::auth::{policy, AuthUser, Resource};
use crate::errors::AppError;
use crate::models::pathway::PathwaySubmissionRow;
use crate::pathway::upsert::{upsert_submission, PathwaySubmission};
use crate::state::AppState;
use crate::validation::parse_path_id;

/// POST /api/pathway/submit
pub async fn handle_submit(
    State(state): State<AppState>,
    Json(req): Json<PathwaySubmission>,
) -> Result<Json<PathwaySubmissionRow>, AppError> {
    let (row, created) = upsert_submission(&state.db, &req).await?;
    if created {
        info!("Created pathway submission {}", row.id);
    } else {
        info!("Updated pathway submission {} (step {:?})", row.id, row.current_step);
    }
    Ok(Json(row))
}

/// GET /api/pathway/submissions
pub async fn handle_list_submissions(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<PathwaySubmissionRow>>, AppError> {
    policy::require(&auth.actor, Resource::AdminArea)?;
    let rows = sqlx::query_as::<_, PathwaySubmissionRow>(
        "SELECT * FROM pathway_advisor_submissions ORDER BY created_at DESC",
    )
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

/// GET /api/pathway/submissions/:id
pub async fn handle_get_submission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PathwaySubmissionRow>, AppError> {
    let id = parse_path_id(&id, "Pathway submission")?;
    let row = sqlx::query_as::<_, PathwaySubmissionRow>(
        "SELECT * FROM pathway_advisor_submissions WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Pathway submission not found".to_string()))?;
    Ok(Json(row))
}
