use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PathwaySubmissionRow {
    pub id: Uuid,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub user_phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub citizenship_country: Option<String>,
    pub residence_country: Option<String>,
    pub education_level: Option<String>,
    pub work_experience_years: f64,
    pub field_of_study: Option<String>,
    pub language_tests: Value,
    pub marital_status: Option<String>,
    pub has_canadian_relative: bool,
    pub has_job_offer: bool,
    pub has_canadian_experience: bool,
    pub has_police_record: bool,
    pub available_funds: f64,
    pub pathway_goal: Option<String>,
    pub pathway_specific_data: Value,
    pub eligibility_results: Value,
    pub current_step: Option<String>,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
