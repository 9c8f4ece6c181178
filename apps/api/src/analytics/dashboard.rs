//! Admin dashboard aggregation. Read-only: building it never writes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::crs::lookup::OwnedCalculation;
use crate::models::consultation::ConsultationRequestRow;
use crate::models::crs::{CrsDetailedRow, CrsSessionRow};
use crate::models::pathway::PathwaySubmissionRow;

const RECENT_PER_SOURCE: i64 = 20;
const RECENT_ACTIVITY_LIMIT: usize = 50;
const RECENT_CONSULTATIONS: i64 = 10;
const RECENT_REPORTS: i64 = 10;
const RECENT_SUBMISSIONS: i64 = 50;
const PAGE_VIEW_WINDOW: i64 = 100;
const TOP_K: usize = 5;

/// One row of the merged recent-activity feed.
#[derive(Debug, Clone, Serialize)]
pub struct RecentCalculation {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub user_name: String,
    pub user_email: String,
    pub user_phone: String,
    pub crs_score: Option<i32>,
    pub input_data: Value,
    pub category_breakdown: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_steps: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,
}

impl RecentCalculation {
    fn sort_key(&self) -> DateTime<Utc> {
        self.last_activity.unwrap_or(self.created_at)
    }

    pub fn from_detailed(row: CrsDetailedRow) -> Self {
        Self {
            id: row.id,
            kind: "completed",
            user_name: row.user_name,
            user_email: row.user_email,
            user_phone: row.user_phone.unwrap_or_default(),
            crs_score: Some(row.crs_score),
            input_data: row.input_data,
            category_breakdown: row.category_breakdown,
            current_step: None,
            completed_steps: None,
            created_at: row.created_at,
            last_activity: None,
        }
    }

    /// Contact details come from the calculator input first, then the owning account.
    pub fn from_authenticated(owned: OwnedCalculation) -> Self {
        let calc = owned.calculation;
        let input_str = |key: &str| {
            calc.input_data
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let user_name = input_str("fullName")
            .or_else(|| owned.owner_email.clone())
            .unwrap_or_else(|| "Unknown".to_string());
        let user_email = input_str("email")
            .or_else(|| owned.owner_email.clone())
            .unwrap_or_default();
        let user_phone = input_str("phone").unwrap_or_default();
        Self {
            id: calc.id,
            kind: "authenticated",
            user_name,
            user_email,
            user_phone,
            crs_score: Some(calc.score),
            input_data: calc.input_data,
            category_breakdown: calc.category_breakdown,
            current_step: None,
            completed_steps: None,
            created_at: calc.created_at,
            last_activity: None,
        }
    }

    pub fn from_session(row: CrsSessionRow) -> Self {
        Self {
            id: row.id,
            kind: "partial",
            user_name: row.user_name.unwrap_or_else(|| "Not provided".to_string()),
            user_email: row.user_email.unwrap_or_else(|| "Not provided".to_string()),
            user_phone: row.user_phone.unwrap_or_default(),
            crs_score: None,
            input_data: row.partial_data,
            category_breakdown: json!({}),
            current_step: Some(row.current_step),
            completed_steps: Some(row.completed_steps.0),
            created_at: row.created_at,
            last_activity: Some(row.last_activity),
        }
    }
}

/// Newest first by `last_activity`, falling back to `created_at`. Stable, so
/// equal timestamps keep their input order.
pub fn merge_recent(
    sources: impl IntoIterator<Item = Vec<RecentCalculation>>,
) -> Vec<RecentCalculation> {
    let mut merged: Vec<RecentCalculation> = sources.into_iter().flatten().collect();
    merged.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
    merged.truncate(RECENT_ACTIVITY_LIMIT);
    merged
}

/// Naive frequency count; ties keep first-seen order.
pub fn top_k<I>(labels: I, k: usize) -> Vec<(String, i64)>
where
    I: IntoIterator<Item = String>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<(String, i64)> = Vec::new();
    for label in labels {
        match index.get(&label) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(label.clone(), counts.len());
                counts.push((label, 1));
            }
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(k);
    counts
}

pub fn rounded_average(avg: Option<f64>) -> i64 {
    avg.map(|v| v.round() as i64).unwrap_or(0)
}

#[derive(Debug, Clone, Serialize)]
pub struct PageCount {
    pub page: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ButtonCount {
    pub button: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RecentReport {
    pub id: Uuid,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub user_phone: Option<String>,
    pub pathway_goal: Option<String>,
    pub pdf_url: Option<String>,
    pub ai_model_used: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    #[serde(rename = "totalPageViews")]
    pub total_page_views: i64,
    #[serde(rename = "totalClicks")]
    pub total_clicks: i64,
    #[serde(rename = "totalCRSCalculations")]
    pub total_crs_calculations: i64,
    #[serde(rename = "avgCRSScore")]
    pub avg_crs_score: i64,
    #[serde(rename = "totalConsultations")]
    pub total_consultations: i64,
    #[serde(rename = "totalPathwaySubmissions")]
    pub total_pathway_submissions: i64,
    #[serde(rename = "totalImmigrationReports")]
    pub total_immigration_reports: i64,
    #[serde(rename = "recentCalculations")]
    pub recent_calculations: Vec<RecentCalculation>,
    #[serde(rename = "recentConsultations")]
    pub recent_consultations: Vec<ConsultationRequestRow>,
    #[serde(rename = "topPages")]
    pub top_pages: Vec<PageCount>,
    #[serde(rename = "topButtons")]
    pub top_buttons: Vec<ButtonCount>,
    #[serde(rename = "recentReports")]
    pub recent_reports: Vec<RecentReport>,
    #[serde(rename = "recentPathwaySubmissions")]
    pub recent_pathway_submissions: Vec<PathwaySubmissionRow>,
}

async fn count(db: &PgPool, sql: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(sql).fetch_one(db).await
}

pub async fn build_dashboard(db: &PgPool) -> Result<Dashboard, sqlx::Error> {
    let total_page_views = count(db, "SELECT COUNT(*) FROM page_views").await?;
    let total_clicks = count(db, "SELECT COUNT(*) FROM button_clicks").await?;
    let detailed_count = count(db, "SELECT COUNT(*) FROM crs_calculations_detailed").await?;
    let authenticated_count = count(db, "SELECT COUNT(*) FROM crs_calculations").await?;
    let open_sessions =
        count(db, "SELECT COUNT(*) FROM crs_calculation_sessions WHERE NOT is_completed").await?;
    let total_consultations = count(db, "SELECT COUNT(*) FROM consultation_requests").await?;
    let total_pathway_submissions =
        count(db, "SELECT COUNT(*) FROM pathway_advisor_submissions").await?;
    let total_immigration_reports = count(db, "SELECT COUNT(*) FROM immigration_reports").await?;

    let avg_score: Option<f64> =
        sqlx::query_scalar("SELECT AVG(crs_score)::DOUBLE PRECISION FROM crs_calculations_detailed")
            .fetch_one(db)
            .await?;

    let recent_detailed = sqlx::query_as::<_, CrsDetailedRow>(
        "SELECT * FROM crs_calculations_detailed ORDER BY created_at DESC LIMIT $1",
    )
    .bind(RECENT_PER_SOURCE)
    .fetch_all(db)
    .await?;
    let recent_authenticated = sqlx::query_as::<_, OwnedCalculation>(
        r#"
        SELECT c.*,
               u.email     AS owner_email,
               p.full_name AS owner_name,
               p.phone     AS owner_phone
        FROM crs_calculations c
        LEFT JOIN users u ON u.id = c.user_id
        LEFT JOIN user_profiles p ON p.user_id = c.user_id
        ORDER BY c.created_at DESC
        LIMIT $1
        "#,
    )
    .bind(RECENT_PER_SOURCE)
    .fetch_all(db)
    .await?;
    let recent_sessions = sqlx::query_as::<_, CrsSessionRow>(
        "SELECT * FROM crs_calculation_sessions WHERE NOT is_completed ORDER BY last_activity DESC LIMIT $1",
    )
    .bind(RECENT_PER_SOURCE)
    .fetch_all(db)
    .await?;

    let recent_calculations = merge_recent([
        recent_detailed.into_iter().map(RecentCalculation::from_detailed).collect(),
        recent_authenticated
            .into_iter()
            .map(RecentCalculation::from_authenticated)
            .collect(),
        recent_sessions.into_iter().map(RecentCalculation::from_session).collect(),
    ]);

    let recent_consultations = sqlx::query_as::<_, ConsultationRequestRow>(
        "SELECT * FROM consultation_requests ORDER BY created_at DESC LIMIT $1",
    )
    .bind(RECENT_CONSULTATIONS)
    .fetch_all(db)
    .await?;
    let recent_reports = sqlx::query_as::<_, RecentReport>(
        r#"
        SELECT id, user_name, user_email, user_phone, pathway_goal, pdf_url, ai_model_used, created_at
        FROM immigration_reports
        ORDER BY created_at DESC
        LIMIT $1
        "#,
    )
    .bind(RECENT_REPORTS)
    .fetch_all(db)
    .await?;
    let recent_pathway_submissions = sqlx::query_as::<_, PathwaySubmissionRow>(
        "SELECT * FROM pathway_advisor_submissions ORDER BY created_at DESC LIMIT $1",
    )
    .bind(RECENT_SUBMISSIONS)
    .fetch_all(db)
    .await?;

    let recent_pages: Vec<String> =
        sqlx::query_scalar("SELECT page_path FROM page_views ORDER BY created_at DESC LIMIT $1")
            .bind(PAGE_VIEW_WINDOW)
            .fetch_all(db)
            .await?;
    let all_buttons: Vec<String> =
        sqlx::query_scalar("SELECT button_label FROM button_clicks ORDER BY created_at")
            .fetch_all(db)
            .await?;

    Ok(Dashboard {
        total_page_views,
        total_clicks,
        total_crs_calculations: detailed_count + authenticated_count + open_sessions,
        avg_crs_score: rounded_average(avg_score),
        total_consultations,
        total_pathway_submissions,
        total_immigration_reports,
        recent_calculations,
        recent_consultations,
        top_pages: top_k(recent_pages, TOP_K)
            .into_iter()
            .map(|(page, count)| PageCount { page, count })
            .collect(),
        top_buttons: top_k(all_buttons, TOP_K)
            .into_iter()
            .map(|(button, count)| ButtonCount { button, count })
            .collect(),
        recent_reports,
        recent_pathway_submissions,
    })
}
