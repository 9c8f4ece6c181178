use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::db::{is_lock_error, retry_with_backoff};
use crate::models::crs::CrsSessionRow;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionUpdate {
    pub session_id: String,
    pub current_step: String,
    pub completed_steps: Option<Vec<String>>,
    pub partial_data: Option<Value>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub user_phone: Option<String>,
    pub is_completed: Option<bool>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

impl SessionUpdate {
    /// Progress fields are replaced outright; contact fields only when non-empty.
    pub fn apply(&self, mut session: CrsSessionRow) -> CrsSessionRow {
        session.current_step = self.current_step.clone();
        session.completed_steps = Json(self.completed_steps.clone().unwrap_or_default());
        session.partial_data = self.partial_data.clone().unwrap_or_else(|| json!({}));
        session.is_completed = self.is_completed.unwrap_or(false);
        if let Some(name) = non_empty(&self.user_name) {
            session.user_name = Some(name);
        }
        if let Some(email) = non_empty(&self.user_email) {
            session.user_email = Some(email);
        }
        if let Some(phone) = non_empty(&self.user_phone) {
            session.user_phone = Some(phone);
        }
        let now = Utc::now();
        session.updated_at = now;
        session.last_activity = now;
        session
    }
}

async fn write_existing(
    conn: &mut PgConnection,
    session: CrsSessionRow,
) -> Result<CrsSessionRow, sqlx::Error> {
    sqlx::query_as::<_, CrsSessionRow>(
        r#"
        UPDATE crs_calculation_sessions
        SET current_step = $2, completed_steps = $3, partial_data = $4, is_completed = $5,
            user_name = $6, user_email = $7, user_phone = $8,
            updated_at = $9, last_activity = $10
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(session.id)
    .bind(&session.current_step)
    .bind(&session.completed_steps)
    .bind(&session.partial_data)
    .bind(session.is_completed)
    .bind(&session.user_name)
    .bind(&session.user_email)
    .bind(&session.user_phone)
    .bind(session.updated_at)
    .bind(session.last_activity)
    .fetch_one(conn)
    .await
}

async fn upsert_once(db: &PgPool, update: &SessionUpdate) -> Result<CrsSessionRow, sqlx::Error> {
    let mut tx = db.begin().await?;

    // Blocking FOR UPDATE queues concurrent writers on the row. NOWAIT would turn
    // every collision into 55P03 and exhaust the retry budget under bursts.
    // Deadlocks and serialization failures still go through the retry.
    let existing = sqlx::query_as::<_, CrsSessionRow>(
        "SELECT * FROM crs_calculation_sessions WHERE session_id = $1 FOR UPDATE",
    )
    .bind(&update.session_id)
    .fetch_optional(&mut *tx)
    .await?;

    let saved = match existing {
        Some(current) => write_existing(&mut *tx, update.apply(current)).await?,
        None => {
            let inserted = sqlx::query_as::<_, CrsSessionRow>(
                r#"
                INSERT INTO crs_calculation_sessions
                    (id, session_id, current_step, completed_steps, partial_data,
                     user_name, user_email, user_phone, is_completed)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (session_id) DO NOTHING
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&update.session_id)
            .bind(&update.current_step)
            .bind(Json(update.completed_steps.clone().unwrap_or_default()))
            .bind(update.partial_data.clone().unwrap_or_else(|| json!({})))
            .bind(&update.user_name)
            .bind(&update.user_email)
            .bind(&update.user_phone)
            .bind(update.is_completed.unwrap_or(false))
            .fetch_optional(&mut *tx)
            .await?;

            match inserted {
                Some(row) => row,
                // A concurrent request created it first; update theirs.
                None => {
                    let current = sqlx::query_as::<_, CrsSessionRow>(
                        "SELECT * FROM crs_calculation_sessions WHERE session_id = $1 FOR UPDATE",
                    )
                    .bind(&update.session_id)
                    .fetch_one(&mut *tx)
                    .await?;
                    write_existing(&mut *tx, update.apply(current)).await?
                }
            }
        }
    };

    tx.commit().await?;
    Ok(saved)
}

/// Creates or updates progress for `update.session_id`, retrying on lock contention.
pub async fn upsert_session(db: &PgPool, update: &SessionUpdate) -> Result<CrsSessionRow, sqlx::Error> {
    retry_with_backoff(|| upsert_once(db, update), is_lock_error).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::postgres;

    fn stored() -> CrsSessionRow {
        let then = Utc::now() - chrono::Duration::days(1);
        CrsSessionRow {
            id: Uuid::new_v4(),
            session_id: "tok".into(),
            user_name: Some("Original".into()),
            user_email: Some("orig@example.com".into()),
            user_phone: None,
            current_step: "user-info".into(),
            completed_steps: Json(vec![]),
            partial_data: json!({"age": 30}),
            is_completed: false,
            created_at: then,
            updated_at: then,
            last_activity: then,
        }
    }

    fn update() -> SessionUpdate {
        SessionUpdate {
            session_id: "tok".into(),
            current_step: "education".into(),
            completed_steps: Some(vec!["user-info".into(), "age".into()]),
            partial_data: Some(json!({"age": 30, "education": "masters"})),
            user_name: Some(String::new()),
            user_email: None,
            user_phone: Some("+1 555 0100".into()),
            is_completed: None,
        }
    }

    #[test]
    fn test_apply_replaces_progress_and_keeps_contact_on_empty() {
        let before = stored();
        let created = before.created_at;
        let merged = update().apply(before);

        assert_eq!(merged.current_step, "education");
        assert_eq!(merged.completed_steps.0, vec!["user-info", "age"]);
        assert_eq!(merged.partial_data["education"], "masters");
        assert_eq!(merged.user_name.as_deref(), Some("Original"));
        assert_eq!(merged.user_email.as_deref(), Some("orig@example.com"));
        assert_eq!(merged.user_phone.as_deref(), Some("+1 555 0100"));
        assert!(!merged.is_completed);
        assert_eq!(merged.created_at, created);
        assert!(merged.last_activity > created);
    }

    #[test]
    fn test_apply_defaults_missing_progress_fields() {
        let mut req = update();
        req.completed_steps = None;
        req.partial_data = None;
        req.is_completed = Some(true);
        let merged = req.apply(stored());

        assert!(merged.completed_steps.0.is_empty());
        assert_eq!(merged.partial_data, json!({}));
        assert!(merged.is_completed);
    }

    fn progress(session_id: &str, step: &str) -> SessionUpdate {
        SessionUpdate {
            session_id: session_id.into(),
            current_step: step.into(),
            completed_steps: Some(vec!["user-info".into()]),
            partial_data: Some(json!({"step": step})),
            user_name: Some("Noor".into()),
            user_email: None,
            user_phone: None,
            is_completed: None,
        }
    }

    async fn rows_for(db: &PgPool, session_id: &str) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM crs_calculation_sessions WHERE session_id = $1")
            .bind(session_id)
            .fetch_one(db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates_one_row() {
        let Some(db) = postgres().await else { return };

        let created = upsert_session(&db.pool, &progress("tok-a", "age")).await.unwrap();
        let updated = upsert_session(&db.pool, &progress("tok-a", "education"))
            .await
            .unwrap();

        assert_eq!(created.id, updated.id);
        assert_eq!(updated.current_step, "education");
        assert_eq!(updated.user_name.as_deref(), Some("Noor"));
        assert!(updated.last_activity >= created.last_activity);
        assert_eq!(rows_for(&db.pool, "tok-a").await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_on_one_session_all_succeed() {
        let Some(db) = postgres().await else { return };

        let mut writers = Vec::new();
        for i in 0..30 {
            let pool = db.pool.clone();
            writers.push(tokio::spawn(async move {
                upsert_session(&pool, &progress("tok-busy", &format!("step-{i}"))).await
            }));
        }
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        assert_eq!(rows_for(&db.pool, "tok-busy").await, 1);
    }
}
