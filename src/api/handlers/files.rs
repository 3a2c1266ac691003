//! File upload, download and deletion.

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::FileUrlParams;
use crate::api::extractors::AppQuery;
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::file::StoredFile;
use crate::error::{AppError, ErrorResponse};

/// `POST /files`: Multipart upload with fields `file` and `folder`.
///
/// The body is read chunk by chunk and rejected as soon as it passes the
/// configured size limit.
///
/// # Errors
///
/// Returns [`AppError::InvalidRequest`] for a missing file, unknown folder
/// or disallowed extension and [`AppError::PayloadTooLarge`] above the limit.
#[utoipa::path(
    post,
    path = "/api/v1/files",
    tag = "Files",
    summary = "Upload a file",
    description = "Multipart form with `file` and optional `folder` (avatars, cvs, logos, certificates, general).",
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Stored", body = StoredFile),
        (status = 400, description = "Invalid upload", body = ErrorResponse),
        (status = 413, description = "Too large", body = ErrorResponse),
    )
)]
pub async fn upload(
    State(state): State<AppState>,
    caller: AuthUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let limit = state.files.max_bytes();
    let mut folder: Option<String> = None;
    let mut file: Option<(String, Option<String>, Vec<u8>)> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("folder") => {
                folder = Some(field.text().await.map_err(multipart_error)?);
            }
            Some("file") => {
                let name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let mut bytes = Vec::new();
                while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                    if bytes.len() + chunk.len() > limit {
                        return Err(AppError::PayloadTooLarge(format!(
                            "file exceeds the {limit} byte limit"
                        )));
                    }
                    bytes.extend_from_slice(&chunk);
                }
                file = Some((name, content_type, bytes));
            }
            _ => {}
        }
    }

    let (name, content_type, bytes) =
        file.ok_or_else(|| AppError::invalid("multipart field `file` is required"))?;
    let stored = state
        .files
        .upload(&caller, folder.as_deref(), &name, content_type, &bytes)
        .await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// `GET /files/download?url=`: Download a stored file.
///
/// # Errors
///
/// Returns [`AppError::InvalidRequest`] for URLs outside the upload root
/// and [`AppError::NotFound`] for missing files.
#[utoipa::path(
    get,
    path = "/api/v1/files/download",
    tag = "Files",
    summary = "Download a file",
    params(FileUrlParams),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "File contents"),
        (status = 404, description = "Unknown file", body = ErrorResponse),
    )
)]
pub async fn download(
    State(state): State<AppState>,
    _caller: AuthUser,
    AppQuery(params): AppQuery<FileUrlParams>,
) -> Result<impl IntoResponse, AppError> {
    let file = state.files.download(&params.url).await?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        file.file_name.replace(['"', '\\', '\r', '\n'], "_")
    );
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.bytes,
    ))
}

/// `DELETE /files?url=`: Delete a stored file.
///
/// # Errors
///
/// Returns [`AppError::Forbidden`] unless the caller uploaded the file or
/// is an administrator.
#[utoipa::path(
    delete,
    path = "/api/v1/files",
    tag = "Files",
    summary = "Delete a file",
    params(FileUrlParams),
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the uploader", body = ErrorResponse),
        (status = 404, description = "Unknown file", body = ErrorResponse),
    )
)]
pub async fn delete_file(
    State(state): State<AppState>,
    caller: AuthUser,
    AppQuery(params): AppQuery<FileUrlParams>,
) -> Result<impl IntoResponse, AppError> {
    state.files.delete(&params.url, &caller).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::invalid(err.body_text())
    }
}

/// File routes. The upload route lifts axum's default body limit; the
/// handler enforces the configured one.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/files",
            post(upload)
                .delete(delete_file)
                .layer(DefaultBodyLimit::disable()),
        )
        .route("/files/download", get(download))
}
