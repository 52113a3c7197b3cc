//! Version index allocation.

use uuid::Uuid;

use crate::models::version::DocumentKind;
use crate::versions::store::{StoreError, VersionStore};

/// Next `version_index` for the pair: 1 + the highest existing index, 1 for
/// the first version. Indexes are unique per pair but not gapless; deleting
/// the newest version frees its index for reuse. Two concurrent allocations
/// can hand out the same index, in which case the insert's uniqueness
/// constraint decides and the loser re-allocates.
pub async fn next_index(
    store: &dyn VersionStore,
    job_id: Uuid,
    kind: DocumentKind,
) -> Result<i32, StoreError> {
    let max = store.max_version_index(job_id, kind).await?;
    Ok(max.unwrap_or(0) + 1)
}
