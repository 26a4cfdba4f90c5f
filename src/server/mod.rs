//! HTTP surface: upload a track, poll its job, download the stems.

mod api;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Router, extract::DefaultBodyLimit};
use tower_http::cors::CorsLayer;

pub use api::{ApiError, AppState, CreateJobResponse, SharedState, new_job_id, sanitize_filename};

use crate::config::StemsplitConfig;
use crate::jobs::JobRegistry;
use crate::separator::{JobSupervisor, SeparationRunner};

/// Build the application router with body limit and, in dev mode, CORS.
pub fn build_router(state: SharedState) -> Router {
    let limit = state.server.max_upload_mb.saturating_mul(1024 * 1024);
    let dev_mode = state.server.dev_mode;

    let mut app = api::api_router()
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state);

    if dev_mode {
        app = app.layer(CorsLayer::permissive());
    }
    app
}

/// Start the HTTP service and run until Ctrl-C.
pub async fn start_server(config: StemsplitConfig) -> Result<()> {
    std::fs::create_dir_all(&config.server.storage_dir).with_context(|| {
        format!(
            "Failed to create storage directory {}",
            config.server.storage_dir.display()
        )
    })?;
    std::fs::create_dir_all(&config.server.tmp_dir).with_context(|| {
        format!(
            "Failed to create upload directory {}",
            config.server.tmp_dir.display()
        )
    })?;

    let supervisor = JobSupervisor::new(
        JobRegistry::new(),
        SeparationRunner::new(config.separator.clone()),
    );
    let addr = config.server.bind_addr();
    let state = Arc::new(AppState {
        supervisor,
        server: config.server,
    });
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(
        addr = %local_addr,
        program = %config.separator.program,
        model = %config.separator.model,
        "stemsplit listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
