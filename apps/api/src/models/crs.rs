use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// A calculation saved by a signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CrsCalculationRow {
    pub id: Uuid,
    pub user_id: Option<i64>,
    pub calculation_date: DateTime<Utc>,
    pub score: i32,
    pub category_breakdown: Value,
    pub input_data: Value,
    pub is_latest: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A completed calculation submitted anonymously with contact details.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CrsDetailedRow {
    pub id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub user_phone: Option<String>,
    pub input_data: Value,
    pub crs_score: i32,
    pub category_breakdown: Value,
    pub improvement_suggestions: Option<Value>,
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Partial calculator progress keyed by a client-held session token.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CrsSessionRow {
    pub id: Uuid,
    pub session_id: String,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub user_phone: Option<String>,
    pub current_step: String,
    pub completed_steps: Json<Vec<String>>,
    pub partial_data: Value,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}
