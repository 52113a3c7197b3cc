//! Derived job flags. `has_resume` / `has_cover_letter` mean "this job has a
//! pinned version of that kind"; they are recomputed from the versions table,
//! never toggled directly.

use uuid::Uuid;

use crate::models::version::DocumentKind;
use crate::versions::store::{StoreError, VersionStore};

/// Recomputes the job's flag for `kind` from whether a pinned version
/// exists, and writes it. Idempotent, so it both applies a just-made pin
/// change and heals drift left by an earlier failed write. Returns the value
/// written.
pub async fn reconcile(
    store: &dyn VersionStore,
    job_id: Uuid,
    kind: DocumentKind,
) -> Result<bool, StoreError> {
    let pinned = store.fetch_pinned(job_id, kind).await?.is_some();
    store.set_job_flag(job_id, kind, pinned).await?;
    Ok(pinned)
}
