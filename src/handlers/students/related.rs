use axum::{
    extract::{Path, State},
    response::Json,
};

use super::parse_student_id;
use crate::app::AppState;
use crate::error::ApiError;
use crate::store::compute_stats;
use crate::types::{Assignment, Course, StudentFilters, StudentStats};

/// GET /api/students/:id/courses
pub async fn courses(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Course>>, ApiError> {
    let id = parse_student_id(&id)?;
    Ok(Json(state.students.courses(id).await?))
}

/// GET /api/students/:id/schedule - the course list again; the schedule
/// view is a projection of enrolled courses.
pub async fn schedule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Course>>, ApiError> {
    let id = parse_student_id(&id)?;
    Ok(Json(state.students.courses(id).await?))
}

/// GET /api/students/:id/assignments
pub async fn assignments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Assignment>>, ApiError> {
    let id = parse_student_id(&id)?;
    Ok(Json(state.students.assignments(id).await?))
}

/// GET /api/students/:id/stats - population-wide aggregates, keyed under
/// a student path for the dashboard. Unknown ids still 404.
pub async fn stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StudentStats>, ApiError> {
    let id = parse_student_id(&id)?;
    state.students.get(id).await?;

    let all = state.students.find_all(&StudentFilters::default()).await?;
    Ok(Json(compute_stats(&all)))
}
