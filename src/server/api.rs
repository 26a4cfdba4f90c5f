use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::config::{SeparatorConfig, ServerConfig};
use crate::jobs::{JobRegistry, JobState, JobUpdate};
use crate::progress::Stage;
use crate::separator::{JobSpec, JobSupervisor};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub supervisor: JobSupervisor,
    pub server: ServerConfig,
}

impl AppState {
    pub fn registry(&self) -> &JobRegistry {
        self.supervisor.registry()
    }

    fn separator(&self) -> &SeparatorConfig {
        self.supervisor.runner().config()
    }
}

pub type SharedState = Arc<AppState>;

// ── Response payload types ────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
    pub job_id: String,
    pub status_url: String,
    pub vocals_url: String,
    pub instrumental_url: String,
}

impl CreateJobResponse {
    fn for_job(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            status_url: format!("/api/jobs/{}", job_id),
            vocals_url: format!("/api/download/{}/vocals", job_id),
            instrumental_url: format!("/api/download/{}/instrumental", job_id),
        }
    }
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/jobs", post(create_job))
        .route("/api/jobs/{id}", get(get_job))
        .route("/api/download/{id}/{stem}", get(download_stem))
        .route("/health", get(health_check))
}

// ── Helpers ───────────────────────────────────────────────────────────

/// Reduce an uploaded file name to characters safe for a local path.
///
/// Keeps alphanumerics, space, `.`, `_` and `-`, trims, then turns spaces
/// into underscores. Falls back to `audio` when nothing survives.
pub fn sanitize_filename(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-'))
        .collect();
    let safe = kept.trim().replace(' ', "_");
    if safe.is_empty() || safe.chars().all(|c| c == '.') {
        "audio".to_string()
    } else {
        safe
    }
}

/// Short random id: the first 8 hex characters of a v4 UUID.
pub fn new_job_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Ids are only ever generated by [`new_job_id`]; anything else can't name
/// a job directory.
fn is_valid_job_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric())
}

fn internal(context: &str, e: impl std::fmt::Display) -> ApiError {
    ApiError::Internal(format!("{}: {}", context, e))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn create_job(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid upload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let original_name = field.file_name().unwrap_or_default().to_string();
        if original_name.is_empty() {
            return Err(ApiError::BadRequest("No file uploaded".into()));
        }

        let job_id = new_job_id();
        state.registry().create(&job_id);

        let job_dir = state.server.storage_dir.join(&job_id);
        let input_path = state
            .server
            .tmp_dir
            .join(format!("{}_{}", job_id, sanitize_filename(&original_name)));

        let saved = async {
            tokio::fs::create_dir_all(&job_dir)
                .await
                .map_err(|e| internal("Failed to create job directory", e))?;
            tokio::fs::create_dir_all(&state.server.tmp_dir)
                .await
                .map_err(|e| internal("Failed to create upload directory", e))?;
            let mut file = tokio::fs::File::create(&input_path)
                .await
                .map_err(|e| internal("Failed to store upload", e))?;
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Upload interrupted: {}", e)))?
            {
                file.write_all(&chunk)
                    .await
                    .map_err(|e| internal("Failed to store upload", e))?;
            }
            file.flush()
                .await
                .map_err(|e| internal("Failed to store upload", e))
        }
        .await;

        if let Err(err) = saved {
            let reason = match &err {
                ApiError::NotFound(m) | ApiError::BadRequest(m) | ApiError::Internal(m) => {
                    m.clone()
                }
            };
            tracing::warn!(job_id = %job_id, error = %reason, "upload rejected");
            let _ = std::fs::remove_file(&input_path);
            state.registry().update(
                &job_id,
                JobUpdate::new()
                    .state(JobState::Error)
                    .stage(Stage::Error)
                    .message("Failed")
                    .error(reason),
            );
            return Err(err);
        }

        tracing::info!(job_id = %job_id, file = %original_name, "job accepted");
        state.supervisor.submit(JobSpec {
            job_id: job_id.clone(),
            input_path,
            job_dir,
        });

        return Ok(Json(CreateJobResponse::for_job(&job_id)));
    }

    Err(ApiError::BadRequest("No file uploaded".into()))
}

async fn get_job(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .registry()
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Job not found".into()))
}

async fn download_stem(
    State(state): State<SharedState>,
    Path((id, stem)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    if !is_valid_job_id(&id) {
        return Err(ApiError::NotFound("Job not found".into()));
    }
    let job_dir = state.server.storage_dir.join(&id);
    if !job_dir.is_dir() {
        return Err(ApiError::NotFound("Job not found".into()));
    }

    let file_name = match stem.as_str() {
        "vocals" => state.separator().vocals_file_name(),
        "instrumental" => state.separator().instrumental_file_name(),
        _ => return Err(ApiError::BadRequest("Invalid stem".into())),
    };
    let path: PathBuf = job_dir.join(&file_name);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound("File not ready".into()));
        }
        Err(e) => return Err(internal("Failed to read stem", e)),
    };

    Ok((
        [
            (header::CONTENT_TYPE, "audio/mpeg".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        Body::from(bytes),
    )
        .into_response())
}
