//! Version lifecycle orchestration. Composes the allocator, pin coordinator
//! and flag synchronizer into the public create/read/update/delete flows,
//! with bounded retry around every write that can lose a constraint race.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::version::{DocumentKind, DocumentVersionRow};
use crate::versions::store::{NewVersionRow, StoreError, VersionChanges, VersionStore};
use crate::versions::{allocator, flags, pin};

/// Max retries when a constraint race rejects a write. Each retry re-reads
/// the allocator/pin state before trying again; exhaustion surfaces as a
/// storage failure.
pub const MAX_CONFLICT_RETRIES: u32 = 3;

/// Creation input. Versions are always persisted unpinned and unlocked
/// first; `pin` promotes the fresh row as a separate observable step.
#[derive(Debug, Clone)]
pub struct CreateVersion {
    pub job_id: Uuid,
    pub content: Value,
    pub template_name: Option<String>,
    pub metadata: Value,
    pub pin: bool,
}

/// Partial update. `job_id`, `document_kind` and `version_index` are carried
/// so the service can reject attempts to change them; they are immutable for
/// the life of the row.
#[derive(Debug, Clone, Default)]
pub struct VersionPatch {
    pub job_id: Option<Uuid>,
    pub document_kind: Option<DocumentKind>,
    pub version_index: Option<i32>,
    pub content: Option<Value>,
    pub template_name: Option<String>,
    pub is_pinned: Option<bool>,
    pub locked: Option<bool>,
}

fn not_found(kind: DocumentKind) -> AppError {
    AppError::NotFound(match kind {
        DocumentKind::Resume => "Resume version not found".to_string(),
        DocumentKind::CoverLetter => "Cover letter version not found".to_string(),
    })
}

fn locked_error() -> AppError {
    AppError::Locked("Version is locked and cannot be modified".to_string())
}

/// One service instance handles both document kinds; every operation takes
/// the kind it acts on, and rows of the other kind are invisible to it.
#[derive(Clone)]
pub struct VersionLifecycleService {
    store: Arc<dyn VersionStore>,
}

impl VersionLifecycleService {
    pub fn new(store: Arc<dyn VersionStore>) -> Self {
        Self { store }
    }

    /// Creates the next version of the pair. The row lands unpinned; when
    /// `pin` is set it is promoted afterwards, so a previously pinned
    /// version is observably unpinned before the new pin appears.
    pub async fn create(
        &self,
        kind: DocumentKind,
        input: CreateVersion,
    ) -> Result<DocumentVersionRow, AppError> {
        if input.content.is_null() {
            return Err(AppError::Validation("content is required".to_string()));
        }
        if !self.store.job_exists(input.job_id).await? {
            return Err(AppError::NotFound("Job not found".to_string()));
        }

        let id = Uuid::new_v4();
        let row = self.insert_with_fresh_index(id, kind, &input).await?;
        info!(
            "Created {kind} version {} (index {}) for job {}",
            row.id, row.version_index, row.job_id
        );

        if input.pin {
            return self.promote_and_reconcile(row).await;
        }
        Ok(row)
    }

    pub async fn get(&self, kind: DocumentKind, id: Uuid) -> Result<DocumentVersionRow, AppError> {
        self.require_version(kind, id).await
    }

    /// All versions of the pair, newest first.
    pub async fn list(
        &self,
        kind: DocumentKind,
        job_id: Uuid,
    ) -> Result<Vec<DocumentVersionRow>, AppError> {
        if !self.store.job_exists(job_id).await? {
            return Err(AppError::NotFound("Job not found".to_string()));
        }
        Ok(self.store.list_versions(job_id, kind).await?)
    }

    /// The pinned version of the pair, or `None` when nothing is pinned.
    /// Never falls back to an arbitrary version.
    pub async fn get_current(
        &self,
        kind: DocumentKind,
        job_id: Uuid,
    ) -> Result<Option<DocumentVersionRow>, AppError> {
        if !self.store.job_exists(job_id).await? {
            return Err(AppError::NotFound("Job not found".to_string()));
        }
        Ok(self.store.fetch_pinned(job_id, kind).await?)
    }

    /// Applies a partial update. Pin transitions run before field changes,
    /// so a patch that pins and locks in one call pins first and then
    /// freezes the row. On a locked version only no-op patches succeed.
    pub async fn update(
        &self,
        kind: DocumentKind,
        id: Uuid,
        patch: VersionPatch,
    ) -> Result<DocumentVersionRow, AppError> {
        if patch.job_id.is_some() || patch.document_kind.is_some() || patch.version_index.is_some()
        {
            return Err(AppError::Validation(
                "job_id, document_kind and version_index cannot be changed".to_string(),
            ));
        }
        if patch.content.as_ref().is_some_and(Value::is_null) {
            return Err(AppError::Validation("content cannot be null".to_string()));
        }

        let current = self.require_version(kind, id).await?;

        if current.locked {
            let changes_protected = patch.content.is_some()
                || patch.template_name.is_some()
                || patch.is_pinned.is_some_and(|p| p != current.is_pinned)
                || patch.locked == Some(false);
            if changes_protected {
                return Err(locked_error());
            }
            return Ok(current);
        }

        let mut row = current;

        match patch.is_pinned {
            Some(true) => {
                row = self.promote_and_reconcile(row).await?;
            }
            Some(false) if row.is_pinned => {
                match self.store.set_pinned(row.id, false).await? {
                    Some(updated) => row = updated,
                    None => {
                        return Err(match self.store.fetch_version(row.id).await? {
                            Some(_) => locked_error(),
                            None => not_found(kind),
                        });
                    }
                }
                self.reconcile_with_retry(row.job_id, row.document_kind).await?;
            }
            _ => {}
        }

        let changes = VersionChanges {
            content: patch.content,
            template_name: patch.template_name,
            locked: patch.locked,
        };
        if !changes.is_empty() {
            match self.store.update_fields(row.id, changes).await? {
                Some(updated) => row = updated,
                None => {
                    return Err(match self.store.fetch_version(row.id).await? {
                        Some(_) => locked_error(),
                        None => not_found(kind),
                    });
                }
            }
        }

        Ok(row)
    }

    /// Deletes the version. Locked versions can be deleted; lock freezes
    /// mutation, not removal. When the deleted row held the pin the job
    /// flag is cleared and no successor is promoted: the pair returns to
    /// "no current document" until a user pins another version.
    pub async fn delete(&self, kind: DocumentKind, id: Uuid) -> Result<(), AppError> {
        self.require_version(kind, id).await?;

        let Some(deleted) = self.store.delete_version(id).await? else {
            return Err(not_found(kind));
        };
        info!(
            "Deleted {kind} version {} (index {}) of job {}",
            deleted.id, deleted.version_index, deleted.job_id
        );

        if deleted.is_pinned {
            self.reconcile_with_retry(deleted.job_id, deleted.document_kind)
                .await?;
        }
        Ok(())
    }

    // ────────────────────────────────────────────────────────────────────────
    // Internal steps
    // ────────────────────────────────────────────────────────────────────────

    async fn require_version(
        &self,
        kind: DocumentKind,
        id: Uuid,
    ) -> Result<DocumentVersionRow, AppError> {
        match self.store.fetch_version(id).await? {
            Some(row) if row.document_kind == kind => Ok(row),
            _ => Err(not_found(kind)),
        }
    }

    /// Inserts with a freshly allocated index, re-allocating when a
    /// concurrent creation takes the index first. The row id is fixed
    /// across retries; only the index moves.
    async fn insert_with_fresh_index(
        &self,
        id: Uuid,
        kind: DocumentKind,
        input: &CreateVersion,
    ) -> Result<DocumentVersionRow, AppError> {
        for attempt in 0..=MAX_CONFLICT_RETRIES {
            let version_index =
                allocator::next_index(self.store.as_ref(), input.job_id, kind).await?;
            match self
                .store
                .insert_version(NewVersionRow {
                    id,
                    job_id: input.job_id,
                    document_kind: kind,
                    version_index,
                    content: input.content.clone(),
                    template_name: input.template_name.clone(),
                    metadata: input.metadata.clone(),
                })
                .await
            {
                Ok(row) => return Ok(row),
                Err(StoreError::Conflict) => warn!(
                    "Create attempt {}/{}: index {version_index} for job {} was taken — retrying",
                    attempt + 1,
                    MAX_CONFLICT_RETRIES + 1,
                    input.job_id
                ),
                Err(err) => return Err(err.into()),
            }
        }
        Err(AppError::Storage(format!(
            "Version index allocation for job {} kept conflicting after {} attempts",
            input.job_id,
            MAX_CONFLICT_RETRIES + 1
        )))
    }

    /// Promotes `target` to the pair's single pin and brings the job flag in
    /// line. A conflict means another writer pinned concurrently; the retry
    /// re-reads both the target and the pair's pin state, so the last writer
    /// wins and exactly one pin survives.
    async fn promote_and_reconcile(
        &self,
        mut target: DocumentVersionRow,
    ) -> Result<DocumentVersionRow, AppError> {
        for attempt in 0..=MAX_CONFLICT_RETRIES {
            match pin::ensure_exclusive_pin(self.store.as_ref(), &target).await {
                Ok(pinned) => {
                    self.reconcile_with_retry(pinned.job_id, pinned.document_kind)
                        .await?;
                    return Ok(pinned);
                }
                Err(AppError::Conflict(_)) => {
                    warn!(
                        "Pin attempt {}/{} for version {} lost a race — retrying",
                        attempt + 1,
                        MAX_CONFLICT_RETRIES + 1,
                        target.id
                    );
                    target = match self.store.fetch_version(target.id).await? {
                        Some(fresh) => fresh,
                        None => return Err(not_found(target.document_kind)),
                    };
                }
                Err(err) => return Err(err),
            }
        }
        Err(AppError::Storage(format!(
            "Pinning version {} kept conflicting after {} attempts",
            target.id,
            MAX_CONFLICT_RETRIES + 1
        )))
    }

    /// Rewrites the job flag from pinned-version existence. The write is
    /// idempotent, so transient failures are retried; total failure is
    /// logged loudly and surfaced instead of silently returning success
    /// with a stale flag. The flag heals on the next successful pin change
    /// for the pair.
    async fn reconcile_with_retry(
        &self,
        job_id: Uuid,
        kind: DocumentKind,
    ) -> Result<(), AppError> {
        for attempt in 0..=MAX_CONFLICT_RETRIES {
            match flags::reconcile(self.store.as_ref(), job_id, kind).await {
                Ok(_) => return Ok(()),
                Err(err) => warn!(
                    "Flag reconcile attempt {}/{} for job {job_id} ({kind}) failed: {err} — retrying",
                    attempt + 1,
                    MAX_CONFLICT_RETRIES + 1
                ),
            }
        }
        error!(
            "Job {job_id} {} is stale after {} failed reconcile attempts; it will heal on the next pin change",
            kind.flag_column(),
            MAX_CONFLICT_RETRIES + 1
        );
        Err(AppError::Storage(format!(
            "Job flag update for {kind} failed after {} attempts",
            MAX_CONFLICT_RETRIES + 1
        )))
    }
}
