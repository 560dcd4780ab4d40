use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use student_api::app::{app, AppState};
use student_api::store::memory::{MemoryCredentialStore, MemoryStudentStore};
use student_api::store::ensure_admin_seed;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin123";

/// Router over fresh in-memory stores with the admin account seeded.
pub async fn test_app() -> Router {
    let state = AppState::new(
        Arc::new(MemoryStudentStore::new()),
        Arc::new(MemoryCredentialStore::new()),
    );
    ensure_admin_seed(state.credentials.as_ref())
        .await
        .expect("seed admin");
    app(state)
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is JSON")
}

pub async fn body_text(response: Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("body is utf-8")
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.expect("request")
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).expect("request")
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn delete(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("DELETE").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).expect("request")
}

/// Log in as the seeded admin and return a bearer token.
pub async fn login(app: &Router) -> String {
    let response = send(
        app,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    body["token"].as_str().expect("token in response").to_string()
}

/// Minimal valid create payload; callers override fields as needed.
pub fn student_payload(first: &str, last: &str, email: &str, student_id: &str) -> Value {
    json!({
        "firstName": first,
        "lastName": last,
        "email": email,
        "studentId": student_id,
        "dateOfBirth": "2008-04-12",
        "enrollmentDate": "2024-09-01",
        "grade": "10",
        "status": "active",
        "phoneNumber": "555-0100"
    })
}

/// Create a student through the API and return its JSON record.
pub async fn create_student(app: &Router, token: &str, payload: Value) -> Value {
    let response = send(app, json_request("POST", "/api/students", Some(token), payload)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

const BOUNDARY: &str = "sms-test-boundary";

/// Single-part multipart body carrying a CSV file under the "file" field.
pub fn csv_upload(csv: &str, token: &str) -> Request<Body> {
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"students.csv\"\r\nContent-Type: text/csv\r\n\r\n{csv}\r\n--{b}--\r\n",
        b = BOUNDARY,
        csv = csv
    );
    Request::builder()
        .method("POST")
        .uri("/api/students/import")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .expect("request")
}
