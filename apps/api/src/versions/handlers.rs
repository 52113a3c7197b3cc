//! HTTP surface for document versions. The resume and cover-letter families
//! share these handlers; `kind_routes` stamps out one router per kind with
//! the kind injected as an extension, so the two families cannot drift.

use axum::{
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::version::{DocumentKind, DocumentVersionRow};
use crate::versions::service::{CreateVersion, VersionLifecycleService, VersionPatch};

#[derive(Deserialize)]
pub struct JobIdQuery {
    pub job_id: Uuid,
}

#[derive(Deserialize)]
pub struct CreateVersionRequest {
    pub job_id: Uuid,
    pub content: Option<Value>,
    pub template_name: Option<String>,
    #[serde(default)]
    pub is_pinned: bool,
    /// Kind-specific extras (e.g. `parent_version_id`, `event_type`) ride
    /// along untouched as version metadata.
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

#[derive(Deserialize, Default)]
pub struct UpdateVersionRequest {
    pub job_id: Option<Uuid>,
    pub document_kind: Option<DocumentKind>,
    pub version_index: Option<i32>,
    pub content: Option<Value>,
    pub template_name: Option<String>,
    pub is_pinned: Option<bool>,
    pub locked: Option<bool>,
}

#[derive(Serialize)]
pub struct CurrentVersionResponse {
    /// `null` when nothing is pinned for the pair.
    pub version: Option<DocumentVersionRow>,
}

/// Routes for one document kind rooted at `base`. Both families mount the
/// same handlers; the kind arrives as an extension.
pub fn kind_routes<S>(base: &str, kind: DocumentKind) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    VersionLifecycleService: FromRef<S>,
{
    Router::new()
        .route(base, get(handle_list_versions).post(handle_create_version))
        .route(
            &format!("{base}/current"),
            get(handle_get_current_version),
        )
        .route(
            &format!("{base}/:id"),
            get(handle_get_version)
                .patch(handle_update_version)
                .delete(handle_delete_version),
        )
        .layer(Extension(kind))
}

/// GET /api/v1/{kind}-versions?job_id=
pub async fn handle_list_versions(
    State(service): State<VersionLifecycleService>,
    Extension(kind): Extension<DocumentKind>,
    Query(params): Query<JobIdQuery>,
) -> Result<Json<Vec<DocumentVersionRow>>, AppError> {
    let versions = service.list(kind, params.job_id).await?;
    Ok(Json(versions))
}

/// GET /api/v1/{kind}-versions/current?job_id=
pub async fn handle_get_current_version(
    State(service): State<VersionLifecycleService>,
    Extension(kind): Extension<DocumentKind>,
    Query(params): Query<JobIdQuery>,
) -> Result<Json<CurrentVersionResponse>, AppError> {
    let version = service.get_current(kind, params.job_id).await?;
    Ok(Json(CurrentVersionResponse { version }))
}

/// GET /api/v1/{kind}-versions/:id
pub async fn handle_get_version(
    State(service): State<VersionLifecycleService>,
    Extension(kind): Extension<DocumentKind>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentVersionRow>, AppError> {
    let version = service.get(kind, id).await?;
    Ok(Json(version))
}

/// POST /api/v1/{kind}-versions
pub async fn handle_create_version(
    State(service): State<VersionLifecycleService>,
    Extension(kind): Extension<DocumentKind>,
    Json(req): Json<CreateVersionRequest>,
) -> Result<(StatusCode, Json<DocumentVersionRow>), AppError> {
    let content = req
        .content
        .ok_or_else(|| AppError::Validation("content is required".to_string()))?;

    let version = service
        .create(
            kind,
            CreateVersion {
                job_id: req.job_id,
                content,
                template_name: req.template_name,
                metadata: Value::Object(req.metadata),
                pin: req.is_pinned,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(version)))
}

/// PATCH /api/v1/{kind}-versions/:id
pub async fn handle_update_version(
    State(service): State<VersionLifecycleService>,
    Extension(kind): Extension<DocumentKind>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateVersionRequest>,
) -> Result<Json<DocumentVersionRow>, AppError> {
    let patch = VersionPatch {
        job_id: req.job_id,
        document_kind: req.document_kind,
        version_index: req.version_index,
        content: req.content,
        template_name: req.template_name,
        is_pinned: req.is_pinned,
        locked: req.locked,
    };
    let version = service.update(kind, id, patch).await?;
    Ok(Json(version))
}

/// DELETE /api/v1/{kind}-versions/:id
pub async fn handle_delete_version(
    State(service): State<VersionLifecycleService>,
    Extension(kind): Extension<DocumentKind>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    service.delete(kind, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
