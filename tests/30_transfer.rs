mod common;

use axum::http::{header, StatusCode};
use common::*;

const CSV_HEADER: &str =
    "firstName,lastName,email,studentId,dateOfBirth,enrollmentDate,grade,status,phoneNumber";

#[tokio::test]
async fn import_creates_every_valid_row() {
    let app = test_app().await;
    let token = login(&app).await;

    let csv = format!(
        "{CSV_HEADER}\n\
         Ada,Lovelace,ada@example.com,S-1,2006-12-10,2024-09-01,10,active,555-0100\n\
         Brian,Kernighan,brian@example.com,S-2,2005-01-01,2024-09-02,11,pending,555-0101\n"
    );
    let response = send(&app, csv_upload(&csv, &token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["imported"], 2);
    assert_eq!(body["failed"], 0);
    assert_eq!(body["errors"].as_array().unwrap().len(), 0);

    let list = body_json(send(&app, get("/api/students", Some(&token))).await).await;
    assert_eq!(list["total"], 2);
}

#[tokio::test]
async fn bad_row_is_reported_and_skipped() {
    let app = test_app().await;
    let token = login(&app).await;

    let csv = format!(
        "{CSV_HEADER}\n\
         Ada,Lovelace,ada@example.com,S-1,2006-12-10,2024-09-01,10,active,555-0100\n\
         Brian,Kernighan,brian@example.com,S-2,2005-01-01,2024-09-02,11,pending,555-0101\n\
         Carol,Shaw,not-an-email,S-3,2004-06-06,2024-09-03,12,active,555-0102\n"
    );
    let response = send(&app, csv_upload(&csv, &token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["imported"], 2);
    assert_eq!(body["failed"], 1);

    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["row"], 3);
    assert!(errors[0]["error"].as_str().unwrap().contains("email"));

    let list = body_json(send(&app, get("/api/students", Some(&token))).await).await;
    assert_eq!(list["total"], 2);
}

#[tokio::test]
async fn import_requires_a_file_part() {
    let app = test_app().await;
    let token = login(&app).await;

    let boundary = "empty-upload";
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/students/import")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(axum::body::Body::from(format!("--{}--\r\n", boundary)))
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn export_returns_the_whole_set_as_csv() {
    let app = test_app().await;
    let token = login(&app).await;

    for i in 0..12 {
        create_student(
            &app,
            &token,
            student_payload(
                &format!("Bulk{}", i),
                "Export",
                &format!("bulk{}@example.com", i),
                &format!("S-{}", i),
            ),
        )
        .await;
    }

    let response = send(&app, get("/api/students/export", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    assert!(response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .contains("students.csv"));

    let text = body_text(response).await;
    let lines: Vec<&str> = text.lines().collect();
    // header plus every record, not one page
    assert_eq!(lines.len(), 13);
    assert!(lines[0].starts_with("id,firstName,lastName"));
}

#[tokio::test]
async fn export_applies_list_filters() {
    let app = test_app().await;
    let token = login(&app).await;

    create_student(
        &app,
        &token,
        student_payload("Keep", "Me", "keep@example.com", "S-100"),
    )
    .await;
    create_student(
        &app,
        &token,
        student_payload("Drop", "Me", "drop@example.com", "S-101"),
    )
    .await;

    let response = send(&app, get("/api/students/export?search=keep", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let text = body_text(response).await;
    assert!(text.contains("keep@example.com"));
    assert!(!text.contains("drop@example.com"));
    assert_eq!(text.lines().count(), 2);
}

#[tokio::test]
async fn transfer_routes_are_gated() {
    let app = test_app().await;

    let import = send(&app, csv_upload(CSV_HEADER, "not-a-real-token")).await;
    assert_eq!(import.status(), StatusCode::UNAUTHORIZED);

    let export = send(&app, get("/api/students/export", None)).await;
    assert_eq!(export.status(), StatusCode::UNAUTHORIZED);
}
