use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use student_api::app::{app, AppState};
use student_api::config::config;
use student_api::store::{self, memory, postgres};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "student_api=info,tower_http=info".into()),
        )
        .init();

    let config = config();
    info!(environment = ?config.environment, "starting student-api");

    let state = match &config.database.url {
        Some(_) => {
            let pool = postgres::connect(&config.database).await?;
            postgres::migrate(&pool).await?;
            info!("using postgres store");
            AppState::new(
                Arc::new(postgres::PgStudentStore::new(pool.clone())),
                Arc::new(postgres::PgCredentialStore::new(pool)),
            )
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory store");
            AppState::new(
                Arc::new(memory::MemoryStudentStore::new()),
                Arc::new(memory::MemoryCredentialStore::new()),
            )
        }
    };

    if store::ensure_admin_seed(state.credentials.as_ref()).await? {
        info!("seeded default admin account");
    }

    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app(state)).await?;
    Ok(())
}
