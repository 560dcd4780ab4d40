use std::sync::Arc;

use axum::{
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::config;
use crate::handlers;
use crate::middleware::require_bearer;
use crate::store::{CredentialStore, StudentStore};

/// Shared handler state. Both stores sit behind trait objects so the
/// same router runs against Postgres or the in-memory variant.
#[derive(Clone)]
pub struct AppState {
    pub students: Arc<dyn StudentStore>,
    pub credentials: Arc<dyn CredentialStore>,
}

impl AppState {
    pub fn new(students: Arc<dyn StudentStore>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            students,
            credentials,
        }
    }
}

async fn root() -> Json<Value> {
    Json(json!({
        "name": "student-api",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "auth": "/api/auth",
            "students": "/api/students",
            "health": "/health"
        }
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Login stays open; the session endpoints require a bearer token.
fn auth_routes() -> Router<AppState> {
    let open = Router::new().route("/login", post(handlers::auth::login));

    let gated = Router::new()
        .route("/me", get(handlers::auth::me))
        .route("/logout", post(handlers::auth::logout))
        .route_layer(middleware::from_fn(require_bearer));

    open.merge(gated)
}

/// Every student route sits behind the auth gate. Fixed segments are
/// registered before the :id routes so "import"/"export" never parse
/// as ids.
fn student_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::students::list).post(handlers::students::create),
        )
        .route("/import", post(handlers::students::import))
        .route("/export", get(handlers::students::export))
        .route(
            "/:id",
            get(handlers::students::record_get)
                .patch(handlers::students::record_patch)
                .delete(handlers::students::record_delete),
        )
        .route("/:id/courses", get(handlers::students::courses))
        .route("/:id/schedule", get(handlers::students::schedule))
        .route("/:id/assignments", get(handlers::students::assignments))
        .route("/:id/stats", get(handlers::students::stats))
        .route_layer(middleware::from_fn(require_bearer))
}

pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/auth", auth_routes())
        .nest("/api/students", student_routes())
        .with_state(state);

    if config().server.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    if config().security.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    router
}
