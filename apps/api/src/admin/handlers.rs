//! Read-only cross-entity views over one user. Every route is admin-only.
//!
//! Consultations, submissions and detailed calculations carry no user id, so
//! they are matched to the account by email.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::auth::{policy, store, AuthUser, Resource};
use crate::errors::AppError;
use crate::models::consultation::ConsultationRequestRow;
use crate::models::crs::{CrsCalculationRow, CrsDetailedRow};
use crate::models::pathway::PathwaySubmissionRow;
use crate::models::user::{ProfileRow, UserRow, UserView};
use crate::state::AppState;

#[derive(Debug, Serialize, FromRow)]
pub struct ProfileSummary {
    pub id: Uuid,
    pub full_name: String,
    pub role: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct UserSummaryRow {
    #[sqlx(flatten)]
    user: UserRow,
    profile_id: Option<Uuid>,
    profile_full_name: Option<String>,
    profile_role: Option<String>,
    profile_phone: Option<String>,
    profile_created_at: Option<DateTime<Utc>>,
    calculation_count: i64,
    consultation_count: i64,
    submission_count: i64,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    #[serde(flatten)]
    pub user: UserView,
    pub profile: Option<ProfileSummary>,
    pub calculation_count: i64,
    pub consultation_count: i64,
    pub submission_count: i64,
}

impl From<UserSummaryRow> for UserSummary {
    fn from(row: UserSummaryRow) -> Self {
        let profile = match (row.profile_id, row.profile_full_name, row.profile_role, row.profile_created_at) {
            (Some(id), Some(full_name), Some(role), Some(created_at)) => Some(ProfileSummary {
                id,
                full_name,
                role,
                phone: row.profile_phone,
                created_at,
            }),
            _ => None,
        };
        Self {
            user: UserView::from(&row.user),
            profile,
            calculation_count: row.calculation_count,
            consultation_count: row.consultation_count,
            submission_count: row.submission_count,
        }
    }
}

/// A calculation in the admin views, tagged by source table.
#[derive(Debug, Serialize)]
pub struct TaggedCalculation {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub score: i32,
    pub status: String,
    pub category_breakdown: Value,
    pub input_data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub improvement_suggestions: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<CrsCalculationRow> for TaggedCalculation {
    fn from(row: CrsCalculationRow) -> Self {
        Self {
            id: row.id,
            kind: "authenticated",
            score: row.score,
            status: row.status,
            category_breakdown: row.category_breakdown,
            input_data: row.input_data,
            improvement_suggestions: None,
            user_name: None,
            created_at: row.created_at,
        }
    }
}

impl From<CrsDetailedRow> for TaggedCalculation {
    fn from(row: CrsDetailedRow) -> Self {
        Self {
            id: row.id,
            kind: "detailed",
            score: row.crs_score,
            status: "detailed".to_string(),
            category_breakdown: row.category_breakdown,
            input_data: row.input_data,
            improvement_suggestions: row.improvement_suggestions,
            user_name: Some(row.user_name),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: UserView,
    pub profile: Option<ProfileRow>,
    pub calculations: Vec<TaggedCalculation>,
    pub consultations: Vec<ConsultationRequestRow>,
    pub submissions: Vec<PathwaySubmissionRow>,
}

#[derive(Debug, Serialize)]
pub struct UserActivity {
    pub user_id: i64,
    pub user_email: String,
    pub total_calculations: i64,
    pub total_consultations: i64,
    pub total_submissions: i64,
    pub total_activity: i64,
}

/// Non-numeric ids cannot match a user and read as 404.
async fn load_user(db: &PgPool, raw_id: &str) -> Result<UserRow, AppError> {
    let not_found = || AppError::NotFound("User not found".to_string());
    let id: i64 = raw_id.trim().parse().map_err(|_| not_found())?;
    store::find_user_by_id(db, id).await?.ok_or_else(not_found)
}

async fn calculations_for(db: &PgPool, user: &UserRow) -> Result<Vec<TaggedCalculation>, sqlx::Error> {
    let authenticated = sqlx::query_as::<_, CrsCalculationRow>(
        "SELECT * FROM crs_calculations WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user.id)
    .fetch_all(db)
    .await?;
    let detailed = sqlx::query_as::<_, CrsDetailedRow>(
        "SELECT * FROM crs_calculations_detailed WHERE LOWER(user_email) = LOWER($1) ORDER BY created_at DESC",
    )
    .bind(&user.email)
    .fetch_all(db)
    .await?;

    Ok(authenticated
        .into_iter()
        .map(TaggedCalculation::from)
        .chain(detailed.into_iter().map(TaggedCalculation::from))
        .collect())
}

async fn consultations_for(db: &PgPool, email: &str) -> Result<Vec<ConsultationRequestRow>, sqlx::Error> {
    sqlx::query_as::<_, ConsultationRequestRow>(
        "SELECT * FROM consultation_requests WHERE LOWER(user_email) = LOWER($1) ORDER BY created_at DESC",
    )
    .bind(email)
    .fetch_all(db)
    .await
}

async fn submissions_for(db: &PgPool, email: &str) -> Result<Vec<PathwaySubmissionRow>, sqlx::Error> {
    sqlx::query_as::<_, PathwaySubmissionRow>(
        "SELECT * FROM pathway_advisor_submissions WHERE LOWER(user_email) = LOWER($1) ORDER BY created_at DESC",
    )
    .bind(email)
    .fetch_all(db)
    .await
}

/// GET /api/admin/users
pub async fn handle_list_users(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<UserSummary>>, AppError> {
    policy::require(&auth.actor, Resource::AdminArea)?;
    let rows = sqlx::query_as::<_, UserSummaryRow>(
        r#"
        SELECT u.*,
               p.id         AS profile_id,
               p.full_name  AS profile_full_name,
               p.role       AS profile_role,
               p.phone      AS profile_phone,
               p.created_at AS profile_created_at,
               (SELECT COUNT(*) FROM crs_calculations c WHERE c.user_id = u.id) AS calculation_count,
               (SELECT COUNT(*) FROM consultation_requests r
                 WHERE LOWER(r.user_email) = LOWER(u.email)) AS consultation_count,
               (SELECT COUNT(*) FROM pathway_advisor_submissions s
                 WHERE LOWER(s.user_email) = LOWER(u.email)) AS submission_count
        FROM users u
        LEFT JOIN user_profiles p ON p.user_id = u.id
        ORDER BY u.date_joined DESC
        "#,
    )
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows.into_iter().map(UserSummary::from).collect()))
}

/// GET /api/admin/users/:id
pub async fn handle_get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<UserDetail>, AppError> {
    policy::require(&auth.actor, Resource::AdminArea)?;
    let user = load_user(&state.db, &id).await?;
    let profile = store::find_profile(&state.db, user.id).await?;
    let calculations = calculations_for(&state.db, &user).await?;
    let consultations = consultations_for(&state.db, &user.email).await?;
    let submissions = submissions_for(&state.db, &user.email).await?;

    Ok(Json(UserDetail {
        user: UserView::from(&user),
        profile,
        calculations,
        consultations,
        submissions,
    }))
}

/// GET /api/admin/users/:id/calculations
pub async fn handle_user_calculations(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<TaggedCalculation>>, AppError> {
    policy::require(&auth.actor, Resource::AdminArea)?;
    let user = load_user(&state.db, &id).await?;
    Ok(Json(calculations_for(&state.db, &user).await?))
}

/// GET /api/admin/users/:id/consultations
pub async fn handle_user_consultations(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<ConsultationRequestRow>>, AppError> {
    policy::require(&auth.actor, Resource::AdminArea)?;
    let user = load_user(&state.db, &id).await?;
    Ok(Json(consultations_for(&state.db, &user.email).await?))
}

/// GET /api/admin/users/:id/submissions
pub async fn handle_user_submissions(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<PathwaySubmissionRow>>, AppError> {
    policy::require(&auth.actor, Resource::AdminArea)?;
    let user = load_user(&state.db, &id).await?;
    Ok(Json(submissions_for(&state.db, &user.email).await?))
}

/// GET /api/admin/users/:id/activity
pub async fn handle_user_activity(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<UserActivity>, AppError> {
    policy::require(&auth.actor, Resource::AdminArea)?;
    let user = load_user(&state.db, &id).await?;

    let (calculations, consultations, submissions): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM crs_calculations WHERE user_id = $1)
              + (SELECT COUNT(*) FROM crs_calculations_detailed WHERE LOWER(user_email) = LOWER($2)),
            (SELECT COUNT(*) FROM consultation_requests WHERE LOWER(user_email) = LOWER($2)),
            (SELECT COUNT(*) FROM pathway_advisor_submissions WHERE LOWER(user_email) = LOWER($2))
        "#,
    )
    .bind(user.id)
    .bind(&user.email)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(UserActivity {
        user_id: user.id,
        user_email: user.email,
        total_calculations: calculations,
        total_consultations: consultations,
        total_submissions: submissions,
        total_activity: calculations + consultations + submissions,
    }))
}
