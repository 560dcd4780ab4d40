use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde_json::Value;

use super::parse_student_id;
use crate::app::AppState;
use crate::error::ApiError;
use crate::types::{Student, StudentDraft};

/// GET /api/students/:id
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Student>, ApiError> {
    let id = parse_student_id(&id)?;
    Ok(Json(state.students.get(id).await?))
}

/// PATCH /api/students/:id - partial merge. Supplied nested objects
/// replace the stored ones wholesale.
pub async fn patch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Json<Student>, ApiError> {
    let id = parse_student_id(&id)?;
    let patch = StudentDraft::from_value(payload)?.into_patch()?;
    let student = state.students.update(id, &patch).await?;
    tracing::info!(id = %student.id, "student updated");
    Ok(Json(student))
}

/// DELETE /api/students/:id - hard delete
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_student_id(&id)?;
    state.students.delete(id).await?;
    tracing::info!(%id, "student deleted");
    Ok(StatusCode::NO_CONTENT)
}
