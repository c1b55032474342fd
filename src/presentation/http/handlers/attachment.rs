//! Attachment Handlers
//!
//! Uploads arrive as `multipart/form-data` with the file in a `file` field.

use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::application::dto::response::AttachmentResponse;
use crate::application::services::UploadedFile;
use crate::presentation::http::extractors::{AuthUser, Path};
use crate::shared::error::AppError;
use crate::shared::validation::parse_id;
use crate::startup::AppState;

const FILE_FIELD: &str = "file";

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::BadRequest(e.body_text())
    }
}

/// Read the `file` field; other fields are skipped
async fn read_file(mut multipart: Multipart) -> Result<UploadedFile, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;

        return Ok(UploadedFile {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    Err(AppError::invalid_field(FILE_FIELD, "A file field is required"))
}

pub async fn upload_attachment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(task_id): Path<String>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<AttachmentResponse>), AppError> {
    let task_id = parse_id(&task_id, "task")?;
    let file = read_file(multipart).await?;

    let attachment = state.attachments.upload(auth.user_id, task_id, file).await?;
    Ok((StatusCode::CREATED, Json(AttachmentResponse::from(attachment))))
}

pub async fn list_attachments(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(task_id): Path<String>,
) -> Result<Json<Vec<AttachmentResponse>>, AppError> {
    let task_id = parse_id(&task_id, "task")?;
    let attachments = state.attachments.list(auth.user_id, task_id).await?;
    Ok(Json(
        attachments.into_iter().map(AttachmentResponse::from).collect(),
    ))
}

/// Stored bytes with the original content type and filename
pub async fn download_attachment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(attachment_id): Path<String>,
) -> Result<Response, AppError> {
    let attachment_id = parse_id(&attachment_id, "attachment")?;
    let (attachment, bytes) = state.attachments.download(auth.user_id, attachment_id).await?;

    let content_type = HeaderValue::from_str(&attachment.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&attachment.content_disposition())
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(bytes),
    )
        .into_response())
}

pub async fn delete_attachment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(attachment_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let attachment_id = parse_id(&attachment_id, "attachment")?;
    state.attachments.delete(auth.user_id, attachment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
