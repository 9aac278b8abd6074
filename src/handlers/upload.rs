use axum::{
    extract::{multipart::Field, Multipart, Path, Query, State},
    Json,
};
use std::path::{Path as FsPath, PathBuf};
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::error::{ApiResponse, AppError, Result};
use crate::handlers::AppJson;
use crate::models::{
    parse_tags, BatchMetadata, MediaDetail, MediaListResponse, MediaQuery, UpdateMediaRequest,
    UploadResponse,
};
use crate::services::{IncomingFile, MediaService};
use crate::storage::UploadPolicy;
use crate::AppState;

/// Upload a batch of files
/// POST /api/upload/upload
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let temp_dir = PathBuf::from(&state.config.storage.temp_dir);
    fs::create_dir_all(&temp_dir).await?;

    let mut files = Vec::new();
    let mut meta = BatchMetadata::default();
    if let Err(e) = read_batch(&mut multipart, &temp_dir, &mut files, &mut meta).await {
        for file in &files {
            let _ = fs::remove_file(&file.temp_path).await;
        }
        return Err(e);
    }

    tracing::debug!("Received {} file(s) for upload", files.len());
    let policy = UploadPolicy::from_config(&state.config);
    let outcome = MediaService::upload_batch(
        &state.db,
        state.media_host.as_ref(),
        &policy,
        state.config.upload.max_file_bytes,
        files,
        meta,
    )
    .await?;

    Ok(Json(UploadResponse {
        success: true,
        files: outcome.uploaded,
        failed: outcome.failed,
    }))
}

/// Spool file parts to the temp dir and collect the batch-wide title/tags
async fn read_batch(
    multipart: &mut Multipart,
    temp_dir: &FsPath,
    files: &mut Vec<IncomingFile>,
    meta: &mut BatchMetadata,
) -> Result<()> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to process multipart: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "files" | "files[]" | "file" => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|n| !n.is_empty());
                let file = spool_field(field, temp_dir, file_name.clone()).await?;
                // Browsers send an empty part when no file was picked
                if file.size == 0 && file_name.is_none() {
                    let _ = fs::remove_file(&file.temp_path).await;
                    continue;
                }
                files.push(file);
            }
            "title" => {
                let title = read_text(field).await?;
                let title = title.trim();
                if !title.is_empty() {
                    meta.title = Some(title.to_string());
                }
            }
            "tags" | "tags[]" => {
                let raw = read_text(field).await?;
                let mut joined = meta.tags.join(",");
                joined.push(',');
                joined.push_str(&raw);
                meta.tags = parse_tags(&joined);
            }
            other => tracing::debug!("Ignoring multipart field {:?}", other),
        }
    }
    Ok(())
}

async fn read_text(field: Field<'_>) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read field: {}", e)))
}

async fn spool_field(
    mut field: Field<'_>,
    temp_dir: &FsPath,
    file_name: Option<String>,
) -> Result<IncomingFile> {
    let temp_path = temp_dir.join(format!("{}.part", Uuid::new_v4().simple()));

    match write_chunks(&mut field, &temp_path).await {
        Ok(size) => Ok(IncomingFile {
            temp_path,
            file_name: file_name.unwrap_or_else(|| "upload".to_string()),
            size,
        }),
        Err(e) => {
            let _ = fs::remove_file(&temp_path).await;
            Err(e)
        }
    }
}

async fn write_chunks(field: &mut Field<'_>, path: &FsPath) -> Result<u64> {
    let mut file = fs::File::create(path).await?;
    let mut size = 0u64;

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read upload: {}", e)))?
    {
        size += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(size)
}

/// List media, newest first
/// GET /api/upload/all
pub async fn list_media(
    State(state): State<AppState>,
    Query(query): Query<MediaQuery>,
) -> Result<Json<MediaListResponse>> {
    let params = query.normalize(state.config.upload.default_limit, state.config.upload.max_limit);
    let (data, pagination) = MediaService::list(&state.db, &params).await?;

    Ok(Json(MediaListResponse {
        success: true,
        data,
        pagination,
    }))
}

/// Get one media record
/// GET /api/upload/:id
pub async fn get_media(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<MediaDetail>>> {
    let media = MediaService::get(&state.db, &id).await?;
    Ok(Json(ApiResponse::success(MediaDetail::from(media))))
}

/// Edit title/tags
/// PATCH /api/upload/:id
pub async fn update_media(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(req): AppJson<UpdateMediaRequest>,
) -> Result<Json<ApiResponse<MediaDetail>>> {
    let media = MediaService::update(&state.db, &id, req).await?;
    Ok(Json(ApiResponse::success(MediaDetail::from(media))))
}

/// Delete by host public id (may contain slashes)
/// DELETE /api/upload/delete/*public_id
pub async fn delete_media(
    State(state): State<AppState>,
    Path(public_id): Path<String>,
) -> Result<Json<ApiResponse<()>>> {
    MediaService::delete(&state.db, state.media_host.as_ref(), &public_id).await?;
    Ok(Json(ApiResponse::<()>::success_message(
        "File deleted successfully",
    )))
}
