// SME FinHealth - Web Server
// POST /upload plus read-only history endpoints

use anyhow::{Context, Result};
use rusqlite::Connection;

use finhealth::api::{build_router, AppState};
use finhealth::{setup_database, verify_count, Config, StatementAnalyzer};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;

    // Open database
    let conn = Connection::open(&config.database_path)
        .with_context(|| format!("Failed to open database {:?}", config.database_path))?;
    setup_database(&conn)?;
    log::info!(
        "✓ Database opened: {:?} ({} assessments)",
        config.database_path,
        verify_count(&conn)?
    );

    let analysis_config = config.load_analysis_config()?;
    log::info!(
        "✓ {} industry benchmarks loaded (default target {}%)",
        analysis_config.benchmarks.len(),
        analysis_config.benchmarks.default_target_margin
    );

    // Create shared state
    let state = AppState::new(conn, StatementAnalyzer::new(analysis_config));
    let app = build_router(state, config.max_upload_bytes);

    // Start server
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    log::info!("🚀 Server running on http://{}", addr);
    log::info!("   Upload: POST http://{}/upload?industry=General", addr);

    axum::serve(listener, app)
        .await
        .context("Server terminated")?;

    Ok(())
}
