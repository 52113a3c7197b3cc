//! Job CRUD. Jobs are the parent aggregate that document versions hang off.
//! The derived `has_resume`/`has_cover_letter` flags are owned by the version
//! store's flag synchronizer and cannot be written through this surface.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::job::JobRow;

#[derive(Deserialize)]
pub struct CreateJobRequest {
    pub title: String,
    pub company: String,
    pub status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct UpdateJobRequest {
    pub title: Option<String>,
    pub company: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

/// POST /api/v1/jobs
pub async fn handle_create_job(
    State(db): State<PgPool>,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<JobRow>), AppError> {
    if req.title.trim().is_empty() {
        return Err(AppError::Validation("title is required".to_string()));
    }
    if req.company.trim().is_empty() {
        return Err(AppError::Validation("company is required".to_string()));
    }

    let job: JobRow = sqlx::query_as(
        r#"
        INSERT INTO jobs (id, title, company, status, notes)
        VALUES ($1, $2, $3, COALESCE($4, 'saved'), $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.title.trim())
    .bind(req.company.trim())
    .bind(&req.status)
    .bind(&req.notes)
    .fetch_one(&db)
    .await?;

    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /api/v1/jobs
pub async fn handle_list_jobs(State(db): State<PgPool>) -> Result<Json<Vec<JobRow>>, AppError> {
    let jobs: Vec<JobRow> = sqlx::query_as("SELECT * FROM jobs ORDER BY created_at DESC")
        .fetch_all(&db)
        .await?;
    Ok(Json(jobs))
}

/// GET /api/v1/jobs/:id
pub async fn handle_get_job(
    State(db): State<PgPool>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobRow>, AppError> {
    let job: Option<JobRow> = sqlx::query_as("SELECT * FROM jobs WHERE id = $1")
        .bind(id)
        .fetch_optional(&db)
        .await?;

    let job = job.ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))?;
    Ok(Json(job))
}

/// PATCH /api/v1/jobs/:id
pub async fn handle_update_job(
    State(db): State<PgPool>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateJobRequest>,
) -> Result<Json<JobRow>, AppError> {
    let job: Option<JobRow> = sqlx::query_as(
        r#"
        UPDATE jobs
        SET title = COALESCE($2, title),
            company = COALESCE($3, company),
            status = COALESCE($4, status),
            notes = COALESCE($5, notes),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&req.title)
    .bind(&req.company)
    .bind(&req.status)
    .bind(&req.notes)
    .fetch_optional(&db)
    .await?;

    let job = job.ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))?;
    Ok(Json(job))
}

/// DELETE /api/v1/jobs/:id
pub async fn handle_delete_job(
    State(db): State<PgPool>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    // All document versions of the job go with it (FK cascade).
    let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
        .bind(id)
        .execute(&db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Job {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}
