use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConsultationRequestRow {
    pub id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub user_phone: Option<String>,
    pub consultation_type: String,
    pub consultation_reason: String,
    pub preferred_date: NaiveDate,
    pub preferred_time: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}
