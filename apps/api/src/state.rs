use axum::extract::FromRef;
use sqlx::PgPool;

use crate::versions::service::VersionLifecycleService;

/// Shared application state injected into route handlers via Axum extractors.
///
/// `FromRef` lets handlers extract the substate they need: job CRUD glue
/// takes `State<PgPool>`, version handlers take `State<VersionLifecycleService>`.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub db: PgPool,
    pub versions: VersionLifecycleService,
}
