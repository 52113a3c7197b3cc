use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A tracked job application. `has_resume` / `has_cover_letter` are derived
/// from pin state and owned by the version store; job CRUD never writes them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub title: String,
    pub company: String,
    pub status: String,
    pub notes: Option<String>,
    pub has_resume: bool,
    pub has_cover_letter: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
