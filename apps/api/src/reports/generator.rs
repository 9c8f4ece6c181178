//! Report generation: prompt → LLM → best-effort PDF → stored row.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgExecutor;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::LlmClient;
use crate::models::report::ImmigrationReportRow;
use crate::reports::prompts::{build_user_prompt, system_prompt, ReportProfile};
use crate::reports::render::RenderedPdf;

#[derive(Debug, Serialize)]
pub struct GenerateReportResponse {
    pub id: Uuid,
    pub report: String,
    pub pdf_filename: Option<String>,
    pub pdf_url: Option<String>,
    pub pdf_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ImmigrationReportRow> for GenerateReportResponse {
    fn from(row: ImmigrationReportRow) -> Self {
        Self {
            id: row.id,
            report: row.report_markdown,
            pdf_filename: row.pdf_filename,
            pdf_url: row.pdf_url,
            pdf_path: row.pdf_path,
            created_at: row.created_at,
        }
    }
}

/// Asks the model for the Markdown report.
pub async fn build_report(llm: &LlmClient, profile: &ReportProfile) -> Result<String, AppError> {
    if !llm.is_configured() {
        return Err(AppError::Internal(anyhow::anyhow!(
            "OPENROUTER_API_KEY is not configured"
        )));
    }

    info!(
        "Generating report for path '{}' with model {}",
        profile.path,
        llm.model()
    );
    let markdown = llm
        .complete(&system_prompt(), &build_user_prompt(profile))
        .await?;
    Ok(markdown)
}

/// Persists the report, with or without a PDF.
pub async fn save_report(
    db: impl PgExecutor<'_>,
    profile: &ReportProfile,
    user_id: Option<i64>,
    markdown: &str,
    pdf: Option<&RenderedPdf>,
    model: &str,
) -> Result<ImmigrationReportRow, AppError> {
    let profile_data = serde_json::to_value(profile).map_err(anyhow::Error::from)?;

    let row = sqlx::query_as::<_, ImmigrationReportRow>(
        r#"
        INSERT INTO immigration_reports
            (id, user_name, user_email, user_phone, user_id, profile_data, report_markdown,
             pdf_filename, pdf_path, pdf_url, pathway_goal, ai_model_used)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&profile.user_name)
    .bind(&profile.user_email)
    .bind(&profile.user_phone)
    .bind(user_id)
    .bind(profile_data)
    .bind(markdown)
    .bind(pdf.map(|p| p.filename.clone()))
    .bind(pdf.map(|p| p.path.to_string_lossy().into_owned()))
    .bind(pdf.map(|p| p.url.clone()))
    .bind(&profile.path)
    .bind(model)
    .fetch_one(db)
    .await?;

    Ok(row)
}

/// Fills contact fields the caller left blank from their account.
pub fn with_account_contact(
    mut profile: ReportProfile,
    email: &str,
    name: Option<String>,
) -> ReportProfile {
    let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
    if blank(&profile.user_email) {
        profile.user_email = Some(email.to_string());
    }
    if blank(&profile.user_name) {
        profile.user_name = name;
    }
    profile
}
