use chrono::{SecondsFormat, Utc};
use futures::future::join_all;
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{
    parse_tags, BatchMetadata, ListParams, Media, MediaListItem, Pagination, UpdateMediaRequest,
};
use crate::storage::{HostedAsset, MediaHost, UploadPolicy};

/// A multipart file already spooled to a temporary local copy
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub temp_path: PathBuf,
    pub file_name: String,
    pub size: u64,
}

/// Outcome of a batch upload: stored assets and per-file failure reasons
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub uploaded: Vec<HostedAsset>,
    pub failed: Vec<String>,
}

/// Media service
pub struct MediaService;

impl MediaService {
    /// Forward every file to the host concurrently, then record the ones that made it.
    /// Temporary copies are removed whatever the outcome.
    pub async fn upload_batch(
        db: &Database,
        host: &dyn MediaHost,
        policy: &UploadPolicy,
        max_file_bytes: u64,
        files: Vec<IncomingFile>,
        meta: BatchMetadata,
    ) -> Result<BatchOutcome> {
        if files.is_empty() {
            return Err(AppError::Validation("No files were uploaded".to_string()));
        }

        let forwards = files.into_iter().map(|file| async move {
            let result = if file.size > max_file_bytes {
                Err(AppError::Validation(format!(
                    "File exceeds the {} byte limit",
                    max_file_bytes
                )))
            } else {
                host.upload(&file.temp_path, &file.file_name, policy).await
            };
            discard_temp_file(&file.temp_path).await;
            result.map_err(|e| {
                tracing::debug!("Forwarding {} failed: {:?}", file.file_name, e);
                format!("{}: {}", file.file_name, failure_reason(&e))
            })
        });

        let mut outcome = BatchOutcome::default();
        for result in join_all(forwards).await {
            match result {
                Ok(asset) => outcome.uploaded.push(asset),
                Err(reason) => {
                    tracing::warn!("Upload failed: {}", reason);
                    outcome.failed.push(reason);
                }
            }
        }

        if outcome.uploaded.is_empty() {
            return Ok(outcome);
        }

        if let Err(e) = Self::insert_records(db, &outcome.uploaded, &meta).await {
            tracing::error!("Failed to record uploaded media: {}", e);
            // Nothing was committed, so take the hosted copies back down
            for asset in outcome.uploaded.drain(..) {
                if let Err(err) = host.destroy(&asset.public_id).await {
                    tracing::error!("Failed to remove orphaned {}: {}", asset.public_id, err);
                }
                outcome
                    .failed
                    .push(format!("{}: Failed to save media record", asset.public_id));
            }
        }

        Ok(outcome)
    }

    /// Insert all records of a batch in one transaction
    async fn insert_records(
        db: &Database,
        assets: &[HostedAsset],
        meta: &BatchMetadata,
    ) -> Result<()> {
        let mut tx = db.pool().begin().await?;

        for asset in assets {
            sqlx::query(
                r#"
                INSERT INTO media (id, url, public_id, format, width, height, bytes, title, tags, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&asset.url)
            .bind(&asset.public_id)
            .bind(&asset.format)
            .bind(asset.width)
            .bind(asset.height)
            .bind(asset.bytes)
            .bind(&meta.title)
            .bind(Json(meta.tags.clone()))
            .bind(timestamp())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Newest-first page of media matching the filters
    pub async fn list(db: &Database, params: &ListParams) -> Result<(Vec<MediaListItem>, Pagination)> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM media");
        push_filters(&mut count, params);
        let total: i64 = count.build_query_scalar().fetch_one(db.pool()).await?;

        let offset = (params.page - 1).saturating_mul(params.limit);
        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM media");
        push_filters(&mut select, params);
        select
            .push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(params.limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let media: Vec<Media> = select.build_query_as().fetch_all(db.pool()).await?;

        let pagination = Pagination {
            page: params.page,
            limit: params.limit,
            total,
            total_pages: ((total + params.limit - 1) / params.limit).max(1),
        };

        Ok((media.into_iter().map(MediaListItem::from).collect(), pagination))
    }

    /// Get a media record by ID
    pub async fn get(db: &Database, id: &str) -> Result<Media> {
        let media: Media = sqlx::query_as("SELECT * FROM media WHERE id = ?")
            .bind(id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("Media not found".to_string()))?;

        Ok(media)
    }

    /// Edit title and/or tags
    pub async fn update(db: &Database, id: &str, req: UpdateMediaRequest) -> Result<Media> {
        let media = Self::get(db, id).await?;

        let title = match req.title {
            Some(title) => Some(title.trim().to_string()).filter(|t| !t.is_empty()),
            None => media.title,
        };
        let tags = match req.tags {
            Some(tags) => parse_tags(&tags.join(",")),
            None => media.tags.0,
        };

        sqlx::query("UPDATE media SET title = ?, tags = ? WHERE id = ?")
            .bind(&title)
            .bind(Json(tags))
            .bind(id)
            .execute(db.pool())
            .await?;

        Self::get(db, id).await
    }

    /// Remove the hosted object, then the local record.
    /// A retry after a failed record removal is safe because hosts treat absent objects as deleted.
    pub async fn delete(db: &Database, host: &dyn MediaHost, public_id: &str) -> Result<u64> {
        let public_id = public_id.trim_matches('/');
        if public_id.is_empty() {
            return Err(AppError::Validation("Missing public_id".to_string()));
        }

        host.destroy(public_id).await?;

        let removed = sqlx::query("DELETE FROM media WHERE public_id = ?")
            .bind(public_id)
            .execute(db.pool())
            .await?
            .rows_affected();

        tracing::info!(
            "Deleted {} from {} host ({} record(s))",
            public_id,
            host.host_type(),
            removed
        );
        Ok(removed)
    }
}

fn timestamp() -> String {
    // Fixed-width UTC so lexical order is chronological order
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, params: &ListParams) {
    let mut glue = " WHERE ";

    if let Some(search) = &params.search {
        qb.push(glue)
            .push("title LIKE ")
            .push_bind(format!("%{}%", escape_like(search)))
            .push(" ESCAPE '\\'");
        glue = " AND ";
    }

    if !params.tags.is_empty() {
        qb.push(glue)
            .push("EXISTS (SELECT 1 FROM json_each(media.tags) WHERE json_each.value IN (");
        let mut values = qb.separated(", ");
        for tag in &params.tags {
            values.push_bind(tag.clone());
        }
        values.push_unseparated("))");
    }
}

/// Per-file reason shown in the upload manifest
fn failure_reason(err: &AppError) -> String {
    match err {
        AppError::Request(e) if e.is_timeout() => "Media host timed out".to_string(),
        AppError::Request(_) => "Media host unreachable".to_string(),
        AppError::Io(_) => "Could not read uploaded file".to_string(),
        other => other.public_message(),
    }
}

fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

async fn discard_temp_file(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::error!("Failed to remove temp file {:?}: {}", path, e);
        }
    }
}
