//! Request handlers.
//!
//! Each handler validates the path segments, performs exactly one store operation and turns the
//! outcome into a plain-text response.

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, Path as AxumPath, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use imgstore_files::{DeleteOutcome, FileName, FilesError, FolderName, UpsertOutcome};

use crate::error::ApiError;
use crate::health::{HealthRes, HealthService};
use crate::openapi::{ApiDoc, UploadForm};
use crate::AppState;

/// Multipart field carrying the file content.
pub const IMAGE_FIELD: &str = "image";

/// Fallback `Content-Type` when the content type cannot be sniffed.
const OCTET_STREAM: &str = "application/octet-stream";

struct ImagePart {
    file_name: Option<String>,
    data: Bytes,
}

/// Reads the first `image` field, skipping any other fields. `None` if there is none.
async fn read_image_part(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Option<ImagePart>, ApiError> {
    let mut multipart = multipart.map_err(ApiError::from_multipart_rejection)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(ApiError::from_multipart)?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(str::to_owned);
        let data = field.bytes().await.map_err(ApiError::from_multipart)?;
        return Ok(Some(ImagePart { file_name, data }));
    }

    Ok(None)
}

fn parse_folder(folder: &str) -> Result<FolderName, ApiError> {
    FolderName::parse(folder).map_err(|e| FilesError::from(e).into())
}

fn parse_file(filename: &str) -> Result<FileName, ApiError> {
    FileName::parse(filename).map_err(|e| FilesError::from(e).into())
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
pub(crate) async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

/// Serves the generated OpenAPI document
pub(crate) async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    use utoipa::OpenApi;
    Json(ApiDoc::openapi())
}

#[utoipa::path(
    post,
    path = "/upload/{folder}",
    params(("folder" = String, Path, description = "Target folder")),
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File stored, replacing any previous one", body = String),
        (status = 400, description = "Missing file part or filename, empty file, unsafe name"),
        (status = 500, description = "Storage error")
    )
)]
/// Upload a new file into a folder
///
/// The stored filename is the multipart filename of the `image` part. The folder is created if
/// needed and an existing file of the same name is overwritten.
pub(crate) async fn upload(
    State(state): State<AppState>,
    AxumPath(folder): AxumPath<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<String, ApiError> {
    let folder = parse_folder(&folder)?;
    let part = read_image_part(multipart)
        .await?
        .ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    let filename = part
        .file_name
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("Uploaded file has no filename"))
        .and_then(parse_file)?;

    let stored = state.store.create(&folder, &filename, &part.data).await?;

    Ok(format!(
        "File \"{}\" uploaded to folder \"{}\"",
        stored.filename, stored.folder
    ))
}

#[utoipa::path(
    put,
    path = "/upload/{folder}/{filename}",
    params(
        ("folder" = String, Path, description = "Target folder"),
        ("filename" = String, Path, description = "Target filename")
    ),
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Created if absent, else reported as updated", body = String),
        (status = 400, description = "Absent entry with no or empty file part, or unsafe name"),
        (status = 500, description = "Storage error")
    )
)]
/// Create a file if it does not exist yet
///
/// An existing file is reported as updated but its content is left exactly as it was, and the
/// `image` part is only required when the file is absent.
pub(crate) async fn replace(
    State(state): State<AppState>,
    AxumPath((folder, filename)): AxumPath<(String, String)>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<String, ApiError> {
    let folder = parse_folder(&folder)?;
    let filename = parse_file(&filename)?;
    let part = read_image_part(multipart).await?;
    let data = part.as_ref().map(|part| part.data.as_ref());

    let message = match state.store.upsert(&folder, &filename, data).await? {
        UpsertOutcome::Created => {
            format!("File \"{filename}\" in folder \"{folder}\" created")
        }
        UpsertOutcome::Updated => {
            format!("File \"{filename}\" in folder \"{folder}\" updated")
        }
    };
    Ok(message)
}

#[utoipa::path(
    delete,
    path = "/upload/{folder}/{filename}",
    params(
        ("folder" = String, Path, description = "Folder"),
        ("filename" = String, Path, description = "Filename")
    ),
    responses(
        (status = 200, description = "Deleted, or already absent", body = String),
        (status = 400, description = "Unsafe name"),
        (status = 500, description = "Storage error")
    )
)]
/// Delete a single file
pub(crate) async fn delete_entry(
    State(state): State<AppState>,
    AxumPath((folder, filename)): AxumPath<(String, String)>,
) -> Result<String, ApiError> {
    let folder = parse_folder(&folder)?;
    let filename = parse_file(&filename)?;

    let message = match state.store.delete(&folder, &filename).await? {
        DeleteOutcome::Deleted => format!("File \"{filename}\" in folder \"{folder}\" deleted"),
        DeleteOutcome::AlreadyAbsent => {
            format!("File \"{filename}\" in folder \"{folder}\" not found, nothing to delete")
        }
    };
    Ok(message)
}

#[utoipa::path(
    delete,
    path = "/images/{folder}",
    params(("folder" = String, Path, description = "Folder to remove")),
    responses(
        (status = 200, description = "Folder and all of its files removed", body = String),
        (status = 400, description = "Unsafe name"),
        (status = 404, description = "Folder not found"),
        (status = 500, description = "Folder could not be fully removed")
    )
)]
/// Delete a folder and everything in it
pub(crate) async fn delete_folder(
    State(state): State<AppState>,
    AxumPath(folder): AxumPath<String>,
) -> Result<String, ApiError> {
    let folder = parse_folder(&folder)?;

    let removed = state.store.delete_all(&folder).await.map_err(|e| match e {
        FilesError::NotFound(_) => ApiError::not_found("Folder not found"),
        other => other.into(),
    })?;

    Ok(format!(
        "Folder \"{folder}\" and all its files deleted ({removed} files)"
    ))
}

#[utoipa::path(
    get,
    path = "/images/{folder}/{filename}",
    params(
        ("folder" = String, Path, description = "Folder"),
        ("filename" = String, Path, description = "Filename")
    ),
    responses(
        (status = 200, description = "Raw file bytes"),
        (status = 400, description = "Unsafe name"),
        (status = 404, description = "Image not found")
    )
)]
/// Fetch a file's raw bytes
pub(crate) async fn fetch(
    State(state): State<AppState>,
    AxumPath((folder, filename)): AxumPath<(String, String)>,
) -> Result<Response, ApiError> {
    let folder = parse_folder(&folder)?;
    let filename = parse_file(&filename)?;

    let entry = state
        .store
        .fetch(&folder, &filename)
        .await
        .map_err(|e| match e {
            FilesError::NotFound(_) => ApiError::not_found("Image not found"),
            other => other.into(),
        })?;

    let content_type = entry.media_type.unwrap_or(OCTET_STREAM);
    Ok(([(header::CONTENT_TYPE, content_type)], entry.data).into_response())
}

#[utoipa::path(
    get,
    path = "/images/{folder}/count",
    params(("folder" = String, Path, description = "Folder")),
    responses(
        (status = 200, description = "Number of files in the folder, 0 if absent", body = String),
        (status = 400, description = "Unsafe name"),
        (status = 500, description = "Folder could not be listed; body is still \"0\"")
    )
)]
/// Count the files in a folder
pub(crate) async fn count(
    State(state): State<AppState>,
    AxumPath(folder): AxumPath<String>,
) -> Result<Response, ApiError> {
    let folder = parse_folder(&folder)?;

    match state.store.count(&folder).await {
        Ok(n) => Ok(n.to_string().into_response()),
        Err(e) => {
            tracing::error!(error = %e, folder = %folder, "failed to count folder");
            Ok((StatusCode::INTERNAL_SERVER_ERROR, "0").into_response())
        }
    }
}
