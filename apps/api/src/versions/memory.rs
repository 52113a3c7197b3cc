//! In-memory `VersionStore` for tests. Mirrors the schema's behavior:
//! duplicate version indexes and second pins conflict, missing jobs fail the
//! foreign key, and locked rows are never written through. Flag writes can
//! be made to fail on demand to exercise the retry path.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::version::{DocumentKind, DocumentVersionRow};
use crate::versions::store::{NewVersionRow, StoreError, VersionChanges, VersionStore};

#[derive(Default)]
struct MemJob {
    has_resume: bool,
    has_cover_letter: bool,
}

#[derive(Default)]
struct MemState {
    jobs: HashMap<Uuid, MemJob>,
    versions: HashMap<Uuid, DocumentVersionRow>,
    flag_failures_left: u32,
}

#[derive(Default)]
pub(crate) struct MemoryVersionStore {
    state: Mutex<MemState>,
}

impl MemoryVersionStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert_job(&self, id: Uuid) {
        self.state
            .lock()
            .unwrap()
            .jobs
            .insert(id, MemJob::default());
    }

    pub(crate) fn remove_job(&self, id: Uuid) {
        let mut state = self.state.lock().unwrap();
        state.jobs.remove(&id);
        state.versions.retain(|_, v| v.job_id != id);
    }

    pub(crate) fn job_flag(&self, id: Uuid, kind: DocumentKind) -> Option<bool> {
        let state = self.state.lock().unwrap();
        state.jobs.get(&id).map(|job| match kind {
            DocumentKind::Resume => job.has_resume,
            DocumentKind::CoverLetter => job.has_cover_letter,
        })
    }

    /// The next `n` calls to `set_job_flag` fail with `Unavailable`.
    pub(crate) fn fail_next_flag_writes(&self, n: u32) {
        self.state.lock().unwrap().flag_failures_left = n;
    }
}

#[async_trait]
impl VersionStore for MemoryVersionStore {
    async fn job_exists(&self, job_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.state.lock().unwrap().jobs.contains_key(&job_id))
    }

    async fn set_job_flag(
        &self,
        job_id: Uuid,
        kind: DocumentKind,
        value: bool,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.flag_failures_left > 0 {
            state.flag_failures_left -= 1;
            return Err(StoreError::Unavailable(
                "injected flag write failure".to_string(),
            ));
        }
        if let Some(job) = state.jobs.get_mut(&job_id) {
            match kind {
                DocumentKind::Resume => job.has_resume = value,
                DocumentKind::CoverLetter => job.has_cover_letter = value,
            }
        }
        Ok(())
    }

    async fn insert_version(
        &self,
        new: NewVersionRow,
    ) -> Result<DocumentVersionRow, StoreError> {
        let mut state = self.state.lock().unwrap();
        if !state.jobs.contains_key(&new.job_id) {
            return Err(StoreError::ForeignKey);
        }
        let duplicate = state.versions.values().any(|v| {
            v.job_id == new.job_id
                && v.document_kind == new.document_kind
                && v.version_index == new.version_index
        });
        if duplicate {
            return Err(StoreError::Conflict);
        }
        let now = Utc::now();
        let row = DocumentVersionRow {
            id: new.id,
            job_id: new.job_id,
            document_kind: new.document_kind,
            version_index: new.version_index,
            content: new.content,
            template_name: new.template_name,
            is_pinned: false,
            locked: false,
            metadata: new.metadata,
            created_at: now,
            updated_at: now,
        };
        state.versions.insert(row.id, row.clone());
        Ok(row)
    }

    async fn fetch_version(&self, id: Uuid) -> Result<Option<DocumentVersionRow>, StoreError> {
        Ok(self.state.lock().unwrap().versions.get(&id).cloned())
    }

    async fn list_versions(
        &self,
        job_id: Uuid,
        kind: DocumentKind,
    ) -> Result<Vec<DocumentVersionRow>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<DocumentVersionRow> = state
            .versions
            .values()
            .filter(|v| v.job_id == job_id && v.document_kind == kind)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.version_index
                .cmp(&a.version_index)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(rows)
    }

    async fn fetch_pinned(
        &self,
        job_id: Uuid,
        kind: DocumentKind,
    ) -> Result<Option<DocumentVersionRow>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .versions
            .values()
            .find(|v| v.job_id == job_id && v.document_kind == kind && v.is_pinned)
            .cloned())
    }

    async fn max_version_index(
        &self,
        job_id: Uuid,
        kind: DocumentKind,
    ) -> Result<Option<i32>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .versions
            .values()
            .filter(|v| v.job_id == job_id && v.document_kind == kind)
            .map(|v| v.version_index)
            .max())
    }

    async fn update_fields(
        &self,
        id: Uuid,
        changes: VersionChanges,
    ) -> Result<Option<DocumentVersionRow>, StoreError> {
        let mut state = self.state.lock().unwrap();
        let Some(row) = state.versions.get_mut(&id) else {
            return Ok(None);
        };
        if row.locked {
            return Ok(None);
        }
        if let Some(content) = changes.content {
            row.content = content;
        }
        if let Some(template_name) = changes.template_name {
            row.template_name = Some(template_name);
        }
        if let Some(locked) = changes.locked {
            row.locked = locked;
        }
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn set_pinned(
        &self,
        id: Uuid,
        pinned: bool,
    ) -> Result<Option<DocumentVersionRow>, StoreError> {
        let mut state = self.state.lock().unwrap();
        let Some(current) = state.versions.get(&id).cloned() else {
            return Ok(None);
        };
        if current.locked {
            return Ok(None);
        }
        if pinned {
            let other_pinned = state.versions.values().any(|v| {
                v.id != id
                    && v.job_id == current.job_id
                    && v.document_kind == current.document_kind
                    && v.is_pinned
            });
            if other_pinned {
                return Err(StoreError::Conflict);
            }
        }
        let row = state.versions.get_mut(&id).unwrap();
        row.is_pinned = pinned;
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn clear_pins(
        &self,
        job_id: Uuid,
        kind: DocumentKind,
        except: Option<Uuid>,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.lock().unwrap();
        let mut cleared = 0u64;
        for row in state.versions.values_mut() {
            if row.job_id == job_id
                && row.document_kind == kind
                && row.is_pinned
                && !row.locked
                && except.map_or(true, |e| row.id != e)
            {
                row.is_pinned = false;
                row.updated_at = Utc::now();
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    async fn delete_version(
        &self,
        id: Uuid,
    ) -> Result<Option<DocumentVersionRow>, StoreError> {
        Ok(self.state.lock().unwrap().versions.remove(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft(job_id: Uuid, kind: DocumentKind, index: i32) -> NewVersionRow {
        NewVersionRow {
            id: Uuid::new_v4(),
            job_id,
            document_kind: kind,
            version_index: index,
            content: json!({"body": "draft"}),
            template_name: None,
            metadata: json!({}),
        }
    }

    #[tokio::test]
    async fn test_duplicate_version_index_conflicts() {
        let store = MemoryVersionStore::new();
        let job_id = Uuid::new_v4();
        store.insert_job(job_id);

        store
            .insert_version(draft(job_id, DocumentKind::Resume, 1))
            .await
            .unwrap();
        let err = store
            .insert_version(draft(job_id, DocumentKind::Resume, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict));

        // Same index under the other kind is a different pair.
        store
            .insert_version(draft(job_id, DocumentKind::CoverLetter, 1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_job_fails_foreign_key() {
        let store = MemoryVersionStore::new();
        let err = store
            .insert_version(draft(Uuid::new_v4(), DocumentKind::Resume, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKey));
    }

    #[tokio::test]
    async fn test_second_pin_conflicts() {
        let store = MemoryVersionStore::new();
        let job_id = Uuid::new_v4();
        store.insert_job(job_id);

        let first = store
            .insert_version(draft(job_id, DocumentKind::Resume, 1))
            .await
            .unwrap();
        let second = store
            .insert_version(draft(job_id, DocumentKind::Resume, 2))
            .await
            .unwrap();

        store.set_pinned(first.id, true).await.unwrap().unwrap();
        let err = store.set_pinned(second.id, true).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict));

        store.clear_pins(job_id, DocumentKind::Resume, None).await.unwrap();
        store.set_pinned(second.id, true).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_locked_rows_are_never_written() {
        let store = MemoryVersionStore::new();
        let job_id = Uuid::new_v4();
        store.insert_job(job_id);

        let row = store
            .insert_version(draft(job_id, DocumentKind::CoverLetter, 1))
            .await
            .unwrap();
        store.set_pinned(row.id, true).await.unwrap().unwrap();
        store
            .update_fields(
                row.id,
                VersionChanges {
                    locked: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        let changes = VersionChanges {
            content: Some(json!({"body": "rewrite"})),
            ..Default::default()
        };
        assert!(store.update_fields(row.id, changes).await.unwrap().is_none());
        assert!(store.set_pinned(row.id, false).await.unwrap().is_none());

        let cleared = store
            .clear_pins(job_id, DocumentKind::CoverLetter, None)
            .await
            .unwrap();
        assert_eq!(cleared, 0);
        let pinned = store
            .fetch_pinned(job_id, DocumentKind::CoverLetter)
            .await
            .unwrap();
        assert_eq!(pinned.unwrap().id, row.id);
    }

    #[tokio::test]
    async fn test_flag_failure_injection_is_consumed() {
        let store = MemoryVersionStore::new();
        let job_id = Uuid::new_v4();
        store.insert_job(job_id);

        store.fail_next_flag_writes(1);
        let err = store
            .set_job_flag(job_id, DocumentKind::Resume, true)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        store
            .set_job_flag(job_id, DocumentKind::Resume, true)
            .await
            .unwrap();
        assert_eq!(store.job_flag(job_id, DocumentKind::Resume), Some(true));
    }

    #[tokio::test]
    async fn test_flag_write_on_missing_job_is_a_no_op() {
        let store = MemoryVersionStore::new();
        store
            .set_job_flag(Uuid::new_v4(), DocumentKind::Resume, true)
            .await
            .unwrap();
    }
}
