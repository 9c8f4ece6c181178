use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// A generated immigration report. PDF columns stay NULL when rendering failed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ImmigrationReportRow {
    pub id: Uuid,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub user_phone: Option<String>,
    #[serde(skip_serializing)]
    pub user_id: Option<i64>,
    pub profile_data: Value,
    pub report_markdown: String,
    pub pdf_filename: Option<String>,
    pub pdf_path: Option<String>,
    pub pdf_url: Option<String>,
    pub pathway_goal: Option<String>,
    pub ai_model_used: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing projection used by the report index endpoints.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReportSummaryRow {
    pub id: Uuid,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub pathway_goal: Option<String>,
    pub pdf_url: Option<String>,
    pub created_at: DateTime<Utc>,
}
