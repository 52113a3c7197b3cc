//! Persistence boundary for the document version store.
//!
//! Every trait method is a single atomic statement against the backing
//! store. Multi-step flows (pin promotion, flag reconciliation) are composed
//! above this boundary from these primitives plus bounded retry, so the
//! invariants hold on any backend that enforces the two uniqueness
//! constraints: one `version_index` per (job, kind) and one pinned row per
//! (job, kind).

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::version::{DocumentKind, DocumentVersionRow};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write: duplicate version index,
    /// or a second pinned row for the pair. Retryable with a fresh read.
    #[error("storage write conflicted with a concurrent writer")]
    Conflict,

    /// The referenced job row no longer exists.
    #[error("referenced job does not exist")]
    ForeignKey,

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            match db.kind() {
                sqlx::error::ErrorKind::UniqueViolation => return StoreError::Conflict,
                sqlx::error::ErrorKind::ForeignKeyViolation => return StoreError::ForeignKey,
                _ => {}
            }
        }
        StoreError::Unavailable(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => AppError::Conflict(err.to_string()),
            StoreError::ForeignKey => {
                AppError::NotFound("Referenced job not found".to_string())
            }
            StoreError::Unavailable(msg) => AppError::Storage(msg),
        }
    }
}

/// Fields of a version row assigned at creation. Rows are always inserted
/// unpinned and unlocked; pin promotion is a separate observable step.
#[derive(Debug, Clone)]
pub struct NewVersionRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub document_kind: DocumentKind,
    pub version_index: i32,
    pub content: Value,
    pub template_name: Option<String>,
    pub metadata: Value,
}

/// Patchable fields of a version row. `None` leaves the column untouched.
/// Pin state is absent on purpose; it only changes through `set_pinned`.
#[derive(Debug, Clone, Default)]
pub struct VersionChanges {
    pub content: Option<Value>,
    pub template_name: Option<String>,
    pub locked: Option<bool>,
}

impl VersionChanges {
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.template_name.is_none() && self.locked.is_none()
    }
}

/// Storage port for document versions and the jobs they hang off.
#[async_trait]
pub trait VersionStore: Send + Sync {
    async fn job_exists(&self, job_id: Uuid) -> Result<bool, StoreError>;

    /// Writes the job's derived `has_resume` / `has_cover_letter` flag.
    /// A missing job is not an error: its versions are gone with it.
    async fn set_job_flag(
        &self,
        job_id: Uuid,
        kind: DocumentKind,
        value: bool,
    ) -> Result<(), StoreError>;

    async fn insert_version(&self, new: NewVersionRow)
        -> Result<DocumentVersionRow, StoreError>;

    async fn fetch_version(&self, id: Uuid) -> Result<Option<DocumentVersionRow>, StoreError>;

    /// All versions of the pair, newest `version_index` first.
    async fn list_versions(
        &self,
        job_id: Uuid,
        kind: DocumentKind,
    ) -> Result<Vec<DocumentVersionRow>, StoreError>;

    async fn fetch_pinned(
        &self,
        job_id: Uuid,
        kind: DocumentKind,
    ) -> Result<Option<DocumentVersionRow>, StoreError>;

    async fn max_version_index(
        &self,
        job_id: Uuid,
        kind: DocumentKind,
    ) -> Result<Option<i32>, StoreError>;

    /// Applies content/template/lock changes. Returns `None` when the row is
    /// missing or already locked; a locked row is never written through.
    async fn update_fields(
        &self,
        id: Uuid,
        changes: VersionChanges,
    ) -> Result<Option<DocumentVersionRow>, StoreError>;

    /// Sets or clears the pin on one row. Returns `None` when the row is
    /// missing or locked. Pinning a second row of a pair fails with
    /// `Conflict` (partial unique index).
    async fn set_pinned(
        &self,
        id: Uuid,
        pinned: bool,
    ) -> Result<Option<DocumentVersionRow>, StoreError>;

    /// Unpins every pinned row of the pair except `except`. Locked rows are
    /// left untouched; the caller detects them via the subsequent pin
    /// conflict. Returns the number of rows unpinned.
    async fn clear_pins(
        &self,
        job_id: Uuid,
        kind: DocumentKind,
        except: Option<Uuid>,
    ) -> Result<u64, StoreError>;

    /// Deletes the row and returns it, so callers can see whether the
    /// deleted version held the pin.
    async fn delete_version(&self, id: Uuid)
        -> Result<Option<DocumentVersionRow>, StoreError>;
}

/// PostgreSQL-backed store. Uniqueness of `(job_id, document_kind,
/// version_index)` and of the pinned row per pair is enforced by the schema;
/// violations surface as `StoreError::Conflict`.
pub struct PgVersionStore {
    pool: PgPool,
}

impl PgVersionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VersionStore for PgVersionStore {
    async fn job_exists(&self, job_id: Uuid) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM jobs WHERE id = $1)")
            .bind(job_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn set_job_flag(
        &self,
        job_id: Uuid,
        kind: DocumentKind,
        value: bool,
    ) -> Result<(), StoreError> {
        let sql = match kind {
            DocumentKind::Resume => {
                "UPDATE jobs SET has_resume = $2, updated_at = now() WHERE id = $1"
            }
            DocumentKind::CoverLetter => {
                "UPDATE jobs SET has_cover_letter = $2, updated_at = now() WHERE id = $1"
            }
        };
        let result = sqlx::query(sql)
            .bind(job_id)
            .bind(value)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            debug!("{} write skipped: job {job_id} is gone", kind.flag_column());
        }
        Ok(())
    }

    async fn insert_version(
        &self,
        new: NewVersionRow,
    ) -> Result<DocumentVersionRow, StoreError> {
        let row = sqlx::query_as::<_, DocumentVersionRow>(
            r#"
            INSERT INTO document_versions
                (id, job_id, document_kind, version_index, content, template_name, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(new.id)
        .bind(new.job_id)
        .bind(new.document_kind)
        .bind(new.version_index)
        .bind(&new.content)
        .bind(&new.template_name)
        .bind(&new.metadata)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn fetch_version(&self, id: Uuid) -> Result<Option<DocumentVersionRow>, StoreError> {
        let row = sqlx::query_as::<_, DocumentVersionRow>(
            "SELECT * FROM document_versions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_versions(
        &self,
        job_id: Uuid,
        kind: DocumentKind,
    ) -> Result<Vec<DocumentVersionRow>, StoreError> {
        let rows = sqlx::query_as::<_, DocumentVersionRow>(
            r#"
            SELECT * FROM document_versions
            WHERE job_id = $1 AND document_kind = $2
            ORDER BY version_index DESC, created_at DESC
            "#,
        )
        .bind(job_id)
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn fetch_pinned(
        &self,
        job_id: Uuid,
        kind: DocumentKind,
    ) -> Result<Option<DocumentVersionRow>, StoreError> {
        let row = sqlx::query_as::<_, DocumentVersionRow>(
            r#"
            SELECT * FROM document_versions
            WHERE job_id = $1 AND document_kind = $2 AND is_pinned
            LIMIT 1
            "#,
        )
        .bind(job_id)
        .bind(kind)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn max_version_index(
        &self,
        job_id: Uuid,
        kind: DocumentKind,
    ) -> Result<Option<i32>, StoreError> {
        let max: Option<i32> = sqlx::query_scalar(
            "SELECT MAX(version_index) FROM document_versions WHERE job_id = $1 AND document_kind = $2",
        )
        .bind(job_id)
        .bind(kind)
        .fetch_one(&self.pool)
        .await?;
        Ok(max)
    }

    async fn update_fields(
        &self,
        id: Uuid,
        changes: VersionChanges,
    ) -> Result<Option<DocumentVersionRow>, StoreError> {
        let row = sqlx::query_as::<_, DocumentVersionRow>(
            r#"
            UPDATE document_versions
            SET content = COALESCE($2, content),
                template_name = COALESCE($3, template_name),
                locked = COALESCE($4, locked),
                updated_at = now()
            WHERE id = $1 AND NOT locked
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.content)
        .bind(&changes.template_name)
        .bind(changes.locked)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn set_pinned(
        &self,
        id: Uuid,
        pinned: bool,
    ) -> Result<Option<DocumentVersionRow>, StoreError> {
        let row = sqlx::query_as::<_, DocumentVersionRow>(
            r#"
            UPDATE document_versions
            SET is_pinned = $2, updated_at = now()
            WHERE id = $1 AND NOT locked
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(pinned)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn clear_pins(
        &self,
        job_id: Uuid,
        kind: DocumentKind,
        except: Option<Uuid>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE document_versions
            SET is_pinned = FALSE, updated_at = now()
            WHERE job_id = $1 AND document_kind = $2 AND is_pinned AND NOT locked
              AND ($3::uuid IS NULL OR id <> $3)
            "#,
        )
        .bind(job_id)
        .bind(kind)
        .bind(except)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_version(
        &self,
        id: Uuid,
    ) -> Result<Option<DocumentVersionRow>, StoreError> {
        let row = sqlx::query_as::<_, DocumentVersionRow>(
            "DELETE FROM document_versions WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
