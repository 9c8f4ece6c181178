//! Unified read over the three calculation tables.
//!
//! A calculation id belongs to exactly one table. Lookup searches them in
//! [`LOOKUP_ORDER`] and the first hit wins.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::auth::Resource;
use crate::models::crs::{CrsCalculationRow, CrsDetailedRow, CrsSessionRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalculationKind {
    Authenticated,
    Detailed,
    Session,
}

pub const LOOKUP_ORDER: [CalculationKind; 3] = [
    CalculationKind::Authenticated,
    CalculationKind::Detailed,
    CalculationKind::Session,
];

impl CalculationKind {
    /// Discriminator emitted in the JSON view.
    pub fn tag(self) -> &'static str {
        match self {
            CalculationKind::Authenticated => "authenticated",
            CalculationKind::Detailed => "detailed",
            CalculationKind::Session => "partial",
        }
    }
}

/// An authenticated calculation joined with its owner's contact details.
#[derive(Debug, Clone, FromRow)]
pub struct OwnedCalculation {
    #[sqlx(flatten)]
    pub calculation: CrsCalculationRow,
    pub owner_email: Option<String>,
    pub owner_name: Option<String>,
    pub owner_phone: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Calculation {
    Authenticated(OwnedCalculation),
    Detailed(CrsDetailedRow),
    Session(CrsSessionRow),
}

/// One shape for all three sources; fields a source lacks are `null`.
#[derive(Debug, Clone, Serialize)]
pub struct CalculationView {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub user_id: Option<i64>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub user_phone: Option<String>,
    pub calculation_date: DateTime<Utc>,
    pub score: Option<i32>,
    pub category_breakdown: Value,
    pub input_data: Value,
    pub improvement_suggestions: Option<Value>,
    pub session_id: Option<String>,
    pub current_step: Option<String>,
    pub completed_steps: Option<Vec<String>>,
    pub is_latest: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Calculation {
    pub fn kind(&self) -> CalculationKind {
        match self {
            Calculation::Authenticated(_) => CalculationKind::Authenticated,
            Calculation::Detailed(_) => CalculationKind::Detailed,
            Calculation::Session(_) => CalculationKind::Session,
        }
    }

    /// What the access policy must approve before this record is shown.
    pub fn resource(&self) -> Resource<'_> {
        match self {
            Calculation::Authenticated(owned) => Resource::AuthenticatedCalculation {
                owner_id: owned.calculation.user_id,
            },
            Calculation::Detailed(row) => Resource::DetailedCalculation {
                email: &row.user_email,
            },
            Calculation::Session(_) => Resource::SessionCalculation,
        }
    }

    pub fn into_view(self) -> CalculationView {
        let kind = self.kind().tag();
        match self {
            Calculation::Authenticated(owned) => {
                let calc = owned.calculation;
                CalculationView {
                    id: calc.id,
                    kind,
                    user_id: calc.user_id,
                    user_name: owned.owner_name,
                    user_email: owned.owner_email,
                    user_phone: owned.owner_phone,
                    calculation_date: calc.calculation_date,
                    score: Some(calc.score),
                    category_breakdown: calc.category_breakdown,
                    input_data: calc.input_data,
                    improvement_suggestions: None,
                    session_id: None,
                    current_step: None,
                    completed_steps: None,
                    is_latest: calc.is_latest,
                    status: calc.status,
                    created_at: calc.created_at,
                    updated_at: calc.updated_at,
                }
            }
            Calculation::Detailed(row) => CalculationView {
                id: row.id,
                kind,
                user_id: None,
                user_name: Some(row.user_name),
                user_email: Some(row.user_email),
                user_phone: row.user_phone,
                calculation_date: row.created_at,
                score: Some(row.crs_score),
                category_breakdown: row.category_breakdown,
                input_data: row.input_data,
                improvement_suggestions: row.improvement_suggestions,
                session_id: row.session_id,
                current_step: None,
                completed_steps: None,
                is_latest: true,
                status: "completed".to_string(),
                created_at: row.created_at,
                updated_at: row.created_at,
            },
            Calculation::Session(row) => CalculationView {
                id: row.id,
                kind,
                user_id: None,
                user_name: row.user_name,
                user_email: row.user_email,
                user_phone: row.user_phone,
                calculation_date: row.created_at,
                score: None,
                category_breakdown: json!({}),
                input_data: row.partial_data,
                improvement_suggestions: None,
                session_id: Some(row.session_id),
                current_step: Some(row.current_step),
                completed_steps: Some(row.completed_steps.0),
                is_latest: false,
                status: if row.is_completed { "completed" } else { "in_progress" }.to_string(),
                created_at: row.created_at,
                updated_at: row.last_activity,
            },
        }
    }
}

async fn fetch_kind(
    db: &PgPool,
    kind: CalculationKind,
    id: Uuid,
) -> Result<Option<Calculation>, sqlx::Error> {
    let found = match kind {
        CalculationKind::Authenticated => sqlx::query_as::<_, OwnedCalculation>(
            r#"
            SELECT c.*,
                   u.email      AS owner_email,
                   p.full_name  AS owner_name,
                   p.phone      AS owner_phone
            FROM crs_calculations c
            LEFT JOIN users u ON u.id = c.user_id
            LEFT JOIN user_profiles p ON p.user_id = c.user_id
            WHERE c.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?
        .map(Calculation::Authenticated),
        CalculationKind::Detailed => {
            sqlx::query_as::<_, CrsDetailedRow>("SELECT * FROM crs_calculations_detailed WHERE id = $1")
                .bind(id)
                .fetch_optional(db)
                .await?
                .map(Calculation::Detailed)
        }
        CalculationKind::Session => {
            sqlx::query_as::<_, CrsSessionRow>("SELECT * FROM crs_calculation_sessions WHERE id = $1")
                .bind(id)
                .fetch_optional(db)
                .await?
                .map(Calculation::Session)
        }
    };
    Ok(found)
}

/// Returns the first record with this id in lookup order.
pub async fn find_calculation(db: &PgPool, id: Uuid) -> Result<Option<Calculation>, sqlx::Error> {
    for kind in LOOKUP_ORDER {
        if let Some(found) = fetch_kind(db, kind, id).await? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;

    use crate::test_support::postgres;

    fn session(is_completed: bool) -> CrsSessionRow {
        let created = Utc::now() - chrono::Duration::hours(1);
        CrsSessionRow {
            id: Uuid::new_v4(),
            session_id: "client-token".into(),
            user_name: Some("Ravi".into()),
            user_email: None,
            user_phone: None,
            current_step: "language".into(),
            completed_steps: Json(vec!["user-info".into(), "age".into()]),
            partial_data: json!({"age": 29}),
            is_completed,
            created_at: created,
            updated_at: created,
            last_activity: Utc::now(),
        }
    }

    fn detailed() -> CrsDetailedRow {
        CrsDetailedRow {
            id: Uuid::new_v4(),
            user_name: "Mei".into(),
            user_email: "mei@example.com".into(),
            user_phone: None,
            input_data: json!({"age": 31}),
            crs_score: 472,
            category_breakdown: json!({"core": 400}),
            improvement_suggestions: Some(json!({"french": "+50"})),
            session_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_lookup_order_is_authenticated_detailed_session() {
        assert_eq!(
            LOOKUP_ORDER.map(CalculationKind::tag),
            ["authenticated", "detailed", "partial"]
        );
    }

    #[test]
    fn test_session_view_is_partial_without_score() {
        let row = session(false);
        let last_activity = row.last_activity;
        let view = Calculation::Session(row).into_view();

        assert_eq!(view.kind, "partial");
        assert_eq!(view.score, None);
        assert_eq!(view.status, "in_progress");
        assert_eq!(view.input_data, json!({"age": 29}));
        assert_eq!(view.completed_steps.as_deref().map(<[String]>::len), Some(2));
        assert_eq!(view.updated_at, last_activity);
        assert!(!view.is_latest);
    }

    #[test]
    fn test_completed_session_reports_completed() {
        assert_eq!(Calculation::Session(session(true)).into_view().status, "completed");
    }

    #[test]
    fn test_detailed_view_serializes_type_and_nulls() {
        let json = serde_json::to_value(Calculation::Detailed(detailed()).into_view()).unwrap();
        assert_eq!(json["type"], "detailed");
        assert_eq!(json["score"], 472);
        assert_eq!(json["status"], "completed");
        assert!(json["user_id"].is_null());
        assert!(json["current_step"].is_null());
    }

    #[test]
    fn test_resources_follow_record_kind() {
        let calc = Calculation::Detailed(detailed());
        assert!(matches!(
            calc.resource(),
            Resource::DetailedCalculation { email: "mei@example.com" }
        ));
        assert!(matches!(
            Calculation::Session(session(false)).resource(),
            Resource::SessionCalculation
        ));
    }

    async fn insert_authenticated(db: &PgPool, id: Uuid) {
        sqlx::query("INSERT INTO crs_calculations (id, score) VALUES ($1, 455)")
            .bind(id)
            .execute(db)
            .await
            .unwrap();
    }

    async fn insert_detailed(db: &PgPool, id: Uuid) {
        sqlx::query(
            "INSERT INTO crs_calculations_detailed (id, user_name, user_email, crs_score) \
             VALUES ($1, 'Mei', 'mei@example.com', 472)",
        )
        .bind(id)
        .execute(db)
        .await
        .unwrap();
    }

    async fn insert_session(db: &PgPool, id: Uuid) {
        sqlx::query("INSERT INTO crs_calculation_sessions (id, session_id) VALUES ($1, $2)")
            .bind(id)
            .bind(format!("token-{id}"))
            .execute(db)
            .await
            .unwrap();
    }

    async fn kind_of(db: &PgPool, id: Uuid) -> Option<CalculationKind> {
        find_calculation(db, id).await.unwrap().map(|c| c.kind())
    }

    #[tokio::test]
    async fn test_find_calculation_searches_tables_in_order() {
        let Some(db) = postgres().await else { return };

        let everywhere = Uuid::new_v4();
        insert_authenticated(&db.pool, everywhere).await;
        insert_detailed(&db.pool, everywhere).await;
        insert_session(&db.pool, everywhere).await;

        let detailed_and_session = Uuid::new_v4();
        insert_detailed(&db.pool, detailed_and_session).await;
        insert_session(&db.pool, detailed_and_session).await;

        let session_only = Uuid::new_v4();
        insert_session(&db.pool, session_only).await;

        assert_eq!(
            kind_of(&db.pool, everywhere).await,
            Some(CalculationKind::Authenticated)
        );
        assert_eq!(
            kind_of(&db.pool, detailed_and_session).await,
            Some(CalculationKind::Detailed)
        );
        assert_eq!(
            kind_of(&db.pool, session_only).await,
            Some(CalculationKind::Session)
        );
        assert_eq!(kind_of(&db.pool, Uuid::new_v4()).await, None);
    }

    #[tokio::test]
    async fn test_authenticated_lookup_without_owner_has_no_contact() {
        let Some(db) = postgres().await else { return };
        let id = Uuid::new_v4();
        insert_authenticated(&db.pool, id).await;

        let view = find_calculation(&db.pool, id)
            .await
            .unwrap()
            .unwrap()
            .into_view();
        let json = serde_json::to_value(view).unwrap();
        assert_eq!(json["type"], "authenticated");
        assert_eq!(json["score"], 455);
        assert!(json["user_email"].is_null());
    }
}
