use axum::{
    extract::{Multipart, Query, State},
    http::header,
    response::{IntoResponse, Json},
};
use axum::body::Bytes;

use crate::app::AppState;
use crate::error::ApiError;
use crate::io;
use crate::types::{ImportResult, ImportRowError, ListParams};

/// POST /api/students/import - multipart CSV upload. Rows are processed
/// independently; a failing row is recorded with its 1-based index and
/// never aborts the batch.
pub async fn import(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ImportResult>, ApiError> {
    let data = read_upload(&mut multipart).await?;
    let rows = io::parse_students_csv(&data)?;

    let mut imported = 0usize;
    let mut errors: Vec<ImportRowError> = Vec::new();
    for row in rows {
        match row.result {
            Ok(new) => match state.students.create(&new).await {
                Ok(_) => imported += 1,
                Err(e) => errors.push(ImportRowError {
                    row: row.row,
                    error: ApiError::from(e).detail(),
                }),
            },
            Err(error) => errors.push(ImportRowError {
                row: row.row,
                error,
            }),
        }
    }

    tracing::info!(imported, failed = errors.len(), "bulk import finished");
    Ok(Json(ImportResult {
        imported,
        failed: errors.len(),
        errors,
    }))
}

/// Prefer the field named "file" (what the browser client sends), fall
/// back to the first uploaded part.
async fn read_upload(multipart: &mut Multipart) -> Result<Bytes, ApiError> {
    let bad = |e: axum::extract::multipart::MultipartError| {
        ApiError::bad_request(format!("Invalid multipart body: {}", e))
    };

    let mut first: Option<Bytes> = None;
    while let Some(field) = multipart.next_field().await.map_err(bad)? {
        let is_file = field.name() == Some("file");
        let bytes = field.bytes().await.map_err(bad)?;
        if is_file {
            return Ok(bytes);
        }
        if first.is_none() {
            first = Some(bytes);
        }
    }
    first.ok_or_else(|| ApiError::bad_request("Missing file upload"))
}

/// GET /api/students/export - the whole filtered set as CSV, unpaginated.
pub async fn export(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let students = state.students.find_all(&params.filters()).await?;
    let body = io::students_to_csv(&students)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"students.csv\"",
            ),
        ],
        body,
    ))
}
