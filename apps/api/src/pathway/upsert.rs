//! Partial-update upsert for pathway advisor submissions.
//!
//! The wizard posts whatever it has collected so far. With a known
//! `submission_id` only the fields present in the body are applied; anything
//! else becomes a fresh row.

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::pathway::PathwaySubmissionRow;
use crate::validation::{is_valid_email, parse_date};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathwaySubmission {
    pub submission_id: Option<String>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub user_phone: Option<String>,
    pub birth_date: Option<String>,
    pub citizenship_country: Option<String>,
    pub residence_country: Option<String>,
    pub education_level: Option<String>,
    pub work_experience_years: Option<f64>,
    pub field_of_study: Option<String>,
    pub language_tests: Option<Value>,
    pub marital_status: Option<String>,
    pub has_canadian_relative: Option<bool>,
    pub has_job_offer: Option<bool>,
    pub has_canadian_experience: Option<bool>,
    pub has_police_record: Option<bool>,
    pub available_funds: Option<f64>,
    pub pathway_goal: Option<String>,
    pub pathway_specific_data: Option<Value>,
    pub eligibility_results: Option<Value>,
    pub current_step: Option<String>,
    pub is_completed: Option<bool>,
}

/// Invalid or blank emails are stored as empty rather than rejected.
pub fn normalize_email(raw: &str) -> String {
    let email = raw.trim();
    if is_valid_email(email) {
        email.to_string()
    } else {
        String::new()
    }
}

fn birth_date(raw: &Option<String>) -> Result<Option<NaiveDate>, AppError> {
    match raw.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => parse_date("birth_date", s).map(Some),
        _ => Ok(None),
    }
}

macro_rules! overwrite {
    ($row:ident, $req:ident, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = &$req.$field {
                $row.$field = value.clone().into();
            }
        )+
    };
}

impl PathwaySubmission {
    /// The id to update, if the client sent a well-formed one.
    pub fn target_id(&self) -> Option<Uuid> {
        self.submission_id
            .as_deref()
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
    }

    /// Applies only the fields present in the request.
    pub fn apply(&self, mut row: PathwaySubmissionRow) -> Result<PathwaySubmissionRow, AppError> {
        let req = self;
        if let Some(date) = birth_date(&req.birth_date)? {
            row.birth_date = Some(date);
        }
        if let Some(name) = req.user_name.as_ref().filter(|n| !n.is_empty()) {
            row.user_name = Some(name.clone());
        }
        if let Some(email) = &req.user_email {
            row.user_email = Some(normalize_email(email));
        }
        overwrite!(
            row,
            req,
            user_phone,
            citizenship_country,
            residence_country,
            education_level,
            field_of_study,
            marital_status,
            pathway_goal,
            current_step,
        );
        overwrite!(
            row,
            req,
            work_experience_years,
            available_funds,
            language_tests,
            pathway_specific_data,
            eligibility_results,
            has_canadian_relative,
            has_job_offer,
            has_canadian_experience,
            has_police_record,
            is_completed,
        );
        row.updated_at = Utc::now();
        Ok(row)
    }

    /// Builds a fresh row, defaulting unset fields to zero, empty, or false.
    pub fn new_row(&self, id: Uuid) -> Result<PathwaySubmissionRow, AppError> {
        let now = Utc::now();
        Ok(PathwaySubmissionRow {
            id,
            user_name: Some(self.user_name.clone().unwrap_or_default()),
            user_email: Some(self.user_email.as_deref().map(normalize_email).unwrap_or_default()),
            user_phone: self.user_phone.clone(),
            birth_date: birth_date(&self.birth_date)?,
            citizenship_country: self.citizenship_country.clone(),
            residence_country: self.residence_country.clone(),
            education_level: self.education_level.clone(),
            work_experience_years: self.work_experience_years.unwrap_or(0.0),
            field_of_study: self.field_of_study.clone(),
            language_tests: self.language_tests.clone().unwrap_or_else(|| json!([])),
            marital_status: self.marital_status.clone(),
            has_canadian_relative: self.has_canadian_relative.unwrap_or(false),
            has_job_offer: self.has_job_offer.unwrap_or(false),
            has_canadian_experience: self.has_canadian_experience.unwrap_or(false),
            has_police_record: self.has_police_record.unwrap_or(false),
            available_funds: self.available_funds.unwrap_or(0.0),
            pathway_goal: self.pathway_goal.clone(),
            pathway_specific_data: self.pathway_specific_data.clone().unwrap_or_else(|| json!({})),
            eligibility_results: self.eligibility_results.clone().unwrap_or_else(|| json!({})),
            current_step: Some(self.current_step.clone().unwrap_or_default()),
            is_completed: self.is_completed.unwrap_or(false),
            created_at: now,
            updated_at: now,
        })
    }
}

/// Updates the targeted submission when it exists, otherwise inserts a new one.
pub async fn upsert_submission(
    db: &PgPool,
    req: &PathwaySubmission,
) -> Result<(PathwaySubmissionRow, bool), AppError> {
    let mut tx = db.begin().await?;

    let existing = match req.target_id() {
        Some(id) => {
            sqlx::query_as::<_, PathwaySubmissionRow>(
                "SELECT * FROM pathway_advisor_submissions WHERE id = $1 FOR UPDATE",
            )
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        }
        None => None,
    };

    let (row, created) = match existing {
        Some(current) => (req.apply(current)?, false),
        None => (req.new_row(Uuid::new_v4())?, true),
    };

    let saved = sqlx::query_as::<_, PathwaySubmissionRow>(
        r#"
        INSERT INTO pathway_advisor_submissions
            (id, user_name, user_email, user_phone, birth_date, citizenship_country,
             residence_country, education_level, work_experience_years, field_of_study,
             language_tests, marital_status, has_canadian_relative, has_job_offer,
             has_canadian_experience, has_police_record, available_funds, pathway_goal,
             pathway_specific_data, eligibility_results, current_step, is_completed,
             created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24)
        ON CONFLICT (id) DO UPDATE SET
            user_name = EXCLUDED.user_name,
            user_email = EXCLUDED.user_email,
            user_phone = EXCLUDED.user_phone,
            birth_date = EXCLUDED.birth_date,
            citizenship_country = EXCLUDED.citizenship_country,
            residence_country = EXCLUDED.residence_country,
            education_level = EXCLUDED.education_level,
            work_experience_years = EXCLUDED.work_experience_years,
            field_of_study = EXCLUDED.field_of_study,
            language_tests = EXCLUDED.language_tests,
            marital_status = EXCLUDED.marital_status,
            has_canadian_relative = EXCLUDED.has_canadian_relative,
            has_job_offer = EXCLUDED.has_job_offer,
            has_canadian_experience = EXCLUDED.has_canadian_experience,
            has_police_record = EXCLUDED.has_police_record,
            available_funds = EXCLUDED.available_funds,
            pathway_goal = EXCLUDED.pathway_goal,
            pathway_specific_data = EXCLUDED.pathway_specific_data,
            eligibility_results = EXCLUDED.eligibility_results,
            current_step = EXCLUDED.current_step,
            is_completed = EXCLUDED.is_completed,
            updated_at = EXCLUDED.updated_at
        RETURNING *
        "#,
    )
    .bind(row.id)
    .bind(&row.user_name)
    .bind(&row.user_email)
    .bind(&row.user_phone)
    .bind(row.birth_date)
    .bind(&row.citizenship_country)
    .bind(&row.residence_country)
    .bind(&row.education_level)
    .bind(row.work_experience_years)
    .bind(&row.field_of_study)
    .bind(&row.language_tests)
    .bind(&row.marital_status)
    .bind(row.has_canadian_relative)
    .bind(row.has_job_offer)
    .bind(row.has_canadian_experience)
    .bind(row.has_police_record)
    .bind(row.available_funds)
    .bind(&row.pathway_goal)
    .bind(&row.pathway_specific_data)
    .bind(&row.eligibility_results)
    .bind(&row.current_step)
    .bind(row.is_completed)
    .bind(row.created_at)
    .bind(row.updated_at)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok((saved, created))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::postgres;

    fn stored() -> PathwaySubmissionRow {
        PathwaySubmission {
            user_name: Some("Amara".into()),
            user_email: Some("amara@example.com".into()),
            education_level: Some("bachelors".into()),
            work_experience_years: Some(3.0),
            has_job_offer: Some(true),
            ..Default::default()
        }
        .new_row(Uuid::new_v4())
        .unwrap()
    }

    #[test]
    fn test_new_row_defaults() {
        let row = PathwaySubmission::default().new_row(Uuid::new_v4()).unwrap();
        assert_eq!(row.user_name.as_deref(), Some(""));
        assert_eq!(row.user_email.as_deref(), Some(""));
        assert_eq!(row.current_step.as_deref(), Some(""));
        assert_eq!(row.work_experience_years, 0.0);
        assert_eq!(row.available_funds, 0.0);
        assert_eq!(row.language_tests, json!([]));
        assert_eq!(row.pathway_specific_data, json!({}));
        assert!(!row.has_police_record);
        assert!(!row.is_completed);
    }

    #[test]
    fn test_apply_leaves_absent_fields_untouched() {
        let before = stored();
        let req = PathwaySubmission {
            current_step: Some("language".into()),
            available_funds: Some(25_000.0),
            ..Default::default()
        };
        let after = req.apply(before.clone()).unwrap();

        assert_eq!(after.current_step.as_deref(), Some("language"));
        assert_eq!(after.available_funds, 25_000.0);
        assert_eq!(after.user_name, before.user_name);
        assert_eq!(after.user_email, before.user_email);
        assert_eq!(after.education_level, before.education_level);
        assert_eq!(after.work_experience_years, 3.0);
        assert!(after.has_job_offer);
        assert_eq!(after.created_at, before.created_at);
    }

    #[test]
    fn test_apply_ignores_empty_name() {
        let req = PathwaySubmission {
            user_name: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(req.apply(stored()).unwrap().user_name.as_deref(), Some("Amara"));
    }

    #[test]
    fn test_invalid_email_is_stored_empty() {
        let req = PathwaySubmission {
            user_email: Some("  not-an-email ".into()),
            ..Default::default()
        };
        assert_eq!(req.apply(stored()).unwrap().user_email.as_deref(), Some(""));

        let req = PathwaySubmission {
            user_email: Some(" new@example.com ".into()),
            ..Default::default()
        };
        assert_eq!(
            req.apply(stored()).unwrap().user_email.as_deref(),
            Some("new@example.com")
        );
    }

    #[test]
    fn test_bad_birth_date_rejected() {
        let req = PathwaySubmission {
            birth_date: Some("03/04/1990".into()),
            ..Default::default()
        };
        assert!(matches!(req.apply(stored()), Err(AppError::Validation(_))));
        assert!(matches!(
            req.new_row(Uuid::new_v4()),
            Err(AppError::Validation(_))
        ));

        let req = PathwaySubmission {
            birth_date: Some("1990-04-03".into()),
            ..Default::default()
        };
        assert_eq!(
            req.apply(stored()).unwrap().birth_date,
            NaiveDate::from_ymd_opt(1990, 4, 3)
        );
    }

    #[test]
    fn test_malformed_submission_id_means_insert() {
        let req = PathwaySubmission {
            submission_id: Some("draft-1".into()),
            ..Default::default()
        };
        assert_eq!(req.target_id(), None);

        let id = Uuid::new_v4();
        let req = PathwaySubmission {
            submission_id: Some(id.to_string()),
            ..Default::default()
        };
        assert_eq!(req.target_id(), Some(id));
    }

    #[tokio::test]
    async fn test_resubmitting_by_id_updates_the_same_row() {
        let Some(db) = postgres().await else { return };

        let first = PathwaySubmission {
            user_name: Some("Amara".into()),
            user_email: Some("amara@example.com".into()),
            education_level: Some("bachelors".into()),
            current_step: Some("personal".into()),
            ..Default::default()
        };
        let (created, was_created) = upsert_submission(&db.pool, &first).await.unwrap();
        assert!(was_created);

        let next = PathwaySubmission {
            submission_id: Some(created.id.to_string()),
            current_step: Some("language".into()),
            available_funds: Some(15_000.0),
            ..Default::default()
        };
        let (updated, was_created) = upsert_submission(&db.pool, &next).await.unwrap();
        assert!(!was_created);
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.current_step.as_deref(), Some("language"));
        assert_eq!(updated.available_funds, 15_000.0);
        assert_eq!(updated.user_name.as_deref(), Some("Amara"));
        assert_eq!(updated.education_level.as_deref(), Some("bachelors"));

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pathway_advisor_submissions")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_unknown_submission_id_creates_a_new_row() {
        let Some(db) = postgres().await else { return };

        let req = PathwaySubmission {
            submission_id: Some(Uuid::new_v4().to_string()),
            user_name: Some("Lin".into()),
            ..Default::default()
        };
        let (_, was_created) = upsert_submission(&db.pool, &req).await.unwrap();
        assert!(was_created);
    }
}
