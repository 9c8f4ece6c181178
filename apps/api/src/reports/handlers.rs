use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::auth::OptionalAuthUser;
use crate::errors::AppError;
use crate::models::report::{ImmigrationReportRow, ReportSummaryRow};
use crate::reports::generator::{
    build_report, save_report, with_account_contact, GenerateReportResponse,
};
use crate::reports::prompts::ReportProfile;
use crate::reports::render::render_report_pdf;
use crate::state::AppState;
use crate::validation::parse_path_id;

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ReportListQuery {
    pub user_email: Option<String>,
    pub limit: Option<i64>,
}

/// POST /api/ai-provider/generate-report
pub async fn handle_generate_report(
    State(state): State<AppState>,
    OptionalAuthUser(auth): OptionalAuthUser,
    Json(profile): Json<ReportProfile>,
) -> Result<Json<GenerateReportResponse>, AppError> {
    let (profile, user_id) = match auth {
        Some(auth) => (
            with_account_contact(profile, &auth.user.email, auth.user.full_name()),
            Some(auth.user.id),
        ),
        None => (profile, None),
    };

    let markdown = build_report(&state.llm, &profile).await?;

    let pdf = render_report_pdf(
        state.pdf_renderer.as_ref(),
        &markdown,
        &state.config.media_root,
        &state.config.media_url,
    )
    .await;

    let row = save_report(
        &state.db,
        &profile,
        user_id,
        &markdown,
        pdf.as_ref(),
        state.llm.model(),
    )
    .await?;

    info!(
        "Stored report {} (pdf: {})",
        row.id,
        row.pdf_filename.as_deref().unwrap_or("none")
    );
    Ok(Json(row.into()))
}

/// GET /api/ai-provider/reports
pub async fn handle_list_reports(
    State(state): State<AppState>,
    Query(query): Query<ReportListQuery>,
) -> Result<Json<Vec<ReportSummaryRow>>, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let email = query
        .user_email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());

    let rows = sqlx::query_as::<_, ReportSummaryRow>(
        r#"
        SELECT id, user_name, user_email, pathway_goal, pdf_url, created_at
        FROM immigration_reports
        WHERE $1::TEXT IS NULL OR user_email = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(email)
    .bind(limit)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

/// GET /api/ai-provider/reports/:id
pub async fn handle_get_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ImmigrationReportRow>, AppError> {
    let id = parse_path_id(&id, "Report")?;
    let row = sqlx::query_as::<_, ImmigrationReportRow>(
        "SELECT * FROM immigration_reports WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("Report not found".to_string()))?;
    Ok(Json(row))
}

/// GET /api/ai-provider/reports/user/:email
pub async fn handle_reports_by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Vec<ReportSummaryRow>>, AppError> {
    let rows = sqlx::query_as::<_, ReportSummaryRow>(
        r#"
        SELECT id, user_name, user_email, pathway_goal, pdf_url, created_at
        FROM immigration_reports
        WHERE user_email = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(email.trim())
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}
