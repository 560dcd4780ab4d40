use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use serde_json::Value;

use crate::app::AppState;
use crate::auth;
use crate::error::ApiError;
use crate::store::NewCredential;
use crate::types::{ListParams, Student, StudentDraft, StudentsListResponse};

/// GET /api/students - one page of the filtered set.
///
/// `total` counts the whole filtered set so the client can render a
/// pager; `page`/`limit` echo back the values actually used.
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<StudentsListResponse>, ApiError> {
    let page = params.page();
    let limit = params.limit();
    let (students, total) = state.students.list(page, limit, &params.filters()).await?;

    Ok(Json(StudentsListResponse {
        students,
        total,
        page,
        limit,
    }))
}

/// POST /api/students - validate, create the login credential when a
/// password was supplied, then persist the record.
pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<Student>), ApiError> {
    let new = StudentDraft::from_value(payload)?.into_new()?;

    // Hash before any write so the only step needing compensation is the
    // credential insert. The password never touches the student record.
    let password_hash = match &new.password {
        Some(password) => Some(auth::hash_password(password)?),
        None => None,
    };

    let student = state.students.create(&new).await?;

    if let Some(password_hash) = password_hash {
        let credential = NewCredential {
            email: new.email.clone(),
            password_hash,
            remember_me: false,
            first_name: new.first_name.clone(),
            last_name: new.last_name.clone(),
            role: "student".to_string(),
        };
        if let Err(e) = state.credentials.insert(&credential).await {
            // Roll the student back; a failed create must leave no row,
            // or retrying the same payload would start conflicting.
            if let Err(rollback) = state.students.delete(student.id).await {
                tracing::error!(id = %student.id, "rollback after credential failure: {}", rollback);
            }
            return Err(e.into());
        }
    }

    tracing::info!(id = %student.id, "student created");
    Ok((StatusCode::CREATED, Json(student)))
}
