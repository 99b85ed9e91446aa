//! Document upload endpoint
//!
//! Files land in `<uploads>/<project_id or "general">/<base>_<unix-ms><ext>`
//! and are served back under `/uploads/...`.

use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use tracing::info;

use crate::{ApiError, ApiResult, AppState};

/// Folder used when no project id accompanies the file
pub const GENERAL_FOLDER: &str = "general";

#[derive(Debug, Serialize)]
pub struct UploadedFile {
    /// Name as sent by the client
    pub name: String,
    pub url: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub file: UploadedFile,
}

/// Replace everything outside `[A-Za-z0-9_-]` with `_`
pub fn sanitize_component(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Stored file name for `original`, uploaded at `timestamp_ms`
pub fn stored_file_name(original: &str, timestamp_ms: i64) -> String {
    // Clients may send a full path; only the last component counts
    let file_name = original.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(original);
    let path = Path::new(file_name);

    let base = path
        .file_stem()
        .map(|s| sanitize_component(&s.to_string_lossy()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "file".to_string());
    let extension = path
        .extension()
        .map(|e| format!(".{}", sanitize_component(&e.to_string_lossy())))
        .unwrap_or_default();

    format!("{}_{}{}", base, timestamp_ms, extension)
}

fn folder_for(project_id: Option<&str>) -> String {
    project_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(sanitize_component)
        .unwrap_or_else(|| GENERAL_FOLDER.to_string())
}

/// POST /api/upload
///
/// **Request:** multipart form with a `file` part and an optional
/// `project_id` text part.
///
/// **Errors:**
/// - 400: no `file` part, or a malformed multipart body
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut project_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?;
                file = Some((name, bytes.to_vec()));
            }
            Some("project_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid project_id: {}", e)))?;
                project_id = Some(text);
            }
            _ => {}
        }
    }

    let (original_name, bytes) =
        file.ok_or_else(|| ApiError::BadRequest("No file provided".to_string()))?;

    let uploaded_at = Utc::now();
    let folder = folder_for(project_id.as_deref());
    let stored_name = stored_file_name(&original_name, uploaded_at.timestamp_millis());

    let dir = state.uploads_dir.join(&folder);
    tokio::fs::create_dir_all(&dir).await?;
    tokio::fs::write(dir.join(&stored_name), &bytes).await?;

    info!(
        folder = %folder,
        file = %stored_name,
        bytes = bytes.len(),
        "Stored uploaded file"
    );

    Ok(Json(UploadResponse {
        success: true,
        file: UploadedFile {
            name: original_name,
            url: format!("/uploads/{}/{}", folder, stored_name),
            uploaded_at,
        },
    }))
}

pub fn upload_routes() -> Router<AppState> {
    Router::new().route("/api/upload", post(upload_file))
}
