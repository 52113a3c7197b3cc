//! Pin coordination: at most one pinned version per (job, document kind).

use tracing::debug;

use crate::errors::AppError;
use crate::models::version::DocumentVersionRow;
use crate::versions::store::VersionStore;

/// Makes `target` the single pinned version of its pair.
///
/// Pinning an already-pinned version is a no-op. A locked target, or a pair
/// whose current pinned version is locked, cannot change pin state. The
/// clear-then-set sequence is not atomic; if a concurrent writer pins
/// another version in between, the set trips the single-pin constraint and
/// the `Conflict` is returned for the caller to retry against fresh state.
pub async fn ensure_exclusive_pin(
    store: &dyn VersionStore,
    target: &DocumentVersionRow,
) -> Result<DocumentVersionRow, AppError> {
    if target.is_pinned {
        return Ok(target.clone());
    }
    if target.locked {
        return Err(AppError::Locked(
            "Locked versions cannot change pin state".to_string(),
        ));
    }

    if let Some(current) = store.fetch_pinned(target.job_id, target.document_kind).await? {
        if current.locked {
            return Err(AppError::Locked(
                "The pinned version is locked and cannot be unpinned".to_string(),
            ));
        }
    }

    let cleared = store
        .clear_pins(target.job_id, target.document_kind, Some(target.id))
        .await?;
    if cleared > 0 {
        debug!(
            "unpinned {cleared} {} version(s) of job {} before promoting {}",
            target.document_kind, target.job_id, target.id
        );
    }

    match store.set_pinned(target.id, true).await {
        Ok(Some(row)) => Ok(row),
        Ok(None) => match store.fetch_version(target.id).await? {
            // The row got locked under us. If it also ended up pinned the
            // promotion already holds; otherwise its pin state is frozen.
            Some(row) if row.is_pinned => Ok(row),
            Some(_) => Err(AppError::Locked(
                "Locked versions cannot change pin state".to_string(),
            )),
            None => Err(AppError::NotFound("Version not found".to_string())),
        },
        // A Conflict here maps to AppError::Conflict, which the caller
        // treats as retryable.
        Err(err) => Err(err.into()),
    }
}
