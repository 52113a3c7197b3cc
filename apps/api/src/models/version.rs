use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// The two document families a job can carry drafts for. Stored as the
/// Postgres enum `document_kind`; both families run through the same
/// version-store code with this tag as the only difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "document_kind", rename_all = "snake_case")]
pub enum DocumentKind {
    Resume,
    CoverLetter,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Resume => "resume",
            DocumentKind::CoverLetter => "cover_letter",
        }
    }

    /// Name of the derived boolean on the job row for this kind.
    pub fn flag_column(&self) -> &'static str {
        match self {
            DocumentKind::Resume => "has_resume",
            DocumentKind::CoverLetter => "has_cover_letter",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stored draft of a generated document.
///
/// `version_index` is unique per (job_id, document_kind) and assigned at
/// creation. `is_pinned` marks the job's current document of that kind, at
/// most one per pair. Once `locked` is set, content, template and pin state
/// are frozen; the row can only be deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DocumentVersionRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub document_kind: DocumentKind,
    pub version_index: i32,
    pub content: Value,
    pub template_name: Option<String>,
    pub is_pinned: bool,
    pub locked: bool,
    /// Kind-specific pass-through (e.g. `parent_version_id`, `event_type`
    /// for cover letters). Opaque to the version store.
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
