use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Acknowledgement returned for every tracked event.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TrackedEvent {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}
