use async_trait::async_trait;
use image::{imageops::FilterType, ImageReader};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::storage::{HostedAsset, MediaHost, UploadPolicy};

/// Filesystem media host used for development; files are served under `/media`
pub struct LocalHost {
    base_path: PathBuf,
    public_base_url: String,
}

impl LocalHost {
    pub fn new(base_path: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a public id inside the base directory, refusing anything that escapes it
    fn resolve(&self, public_id: &str) -> Result<PathBuf> {
        let relative = Path::new(public_id);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if public_id.is_empty() || escapes {
            return Err(AppError::Validation("Invalid public_id".to_string()));
        }
        Ok(self.base_path.join(relative))
    }
}

/// Decode, check and store one image. Runs on the blocking pool.
fn store_image(
    source: &Path,
    base_path: &Path,
    policy: &UploadPolicy,
) -> Result<(String, String, u32, u32, PathBuf)> {
    let reader = ImageReader::open(source)?.with_guessed_format()?;
    let format = reader
        .format()
        .ok_or_else(|| AppError::Validation("Unrecognized image format".to_string()))?;
    let ext = format.extensions_str().first().copied().unwrap_or("bin");
    if !policy.allows_format(ext) {
        return Err(AppError::Validation(format!(
            "Image format {} is not allowed",
            ext
        )));
    }

    let img = reader
        .decode()
        .map_err(|e| AppError::Validation(format!("Invalid image file: {}", e)))?;

    let id = Uuid::new_v4().simple().to_string();
    let folder = policy.folder.trim_matches('/');
    let public_id = if folder.is_empty() {
        id
    } else {
        format!("{}/{}", folder, id)
    };

    let dest = base_path.join(format!("{}.{}", public_id, ext));
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let (width, height) = if img.width() > policy.max_width || img.height() > policy.max_height {
        // Fit inside the box, keeping the aspect ratio
        let resized = img.resize(policy.max_width, policy.max_height, FilterType::Lanczos3);
        resized
            .save_with_format(&dest, format)
            .map_err(|e| AppError::Storage(format!("Failed to write image: {}", e)))?;
        (resized.width(), resized.height())
    } else {
        std::fs::copy(source, &dest)?;
        (img.width(), img.height())
    };

    Ok((public_id, ext.to_string(), width, height, dest))
}

#[async_trait]
impl MediaHost for LocalHost {
    async fn upload(
        &self,
        local_path: &Path,
        file_name: &str,
        policy: &UploadPolicy,
    ) -> Result<HostedAsset> {
        let source = local_path.to_path_buf();
        let base_path = self.base_path.clone();
        let task_policy = policy.clone();

        let (public_id, format, width, height, dest) =
            tokio::task::spawn_blocking(move || store_image(&source, &base_path, &task_policy))
                .await
                .map_err(|e| AppError::Internal(format!("Image task failed: {}", e)))??;

        let bytes = fs::metadata(&dest).await?.len();
        tracing::debug!("Stored {} as {:?}", file_name, dest);

        Ok(HostedAsset {
            url: format!("{}/media/{}.{}", self.public_base_url, public_id, format),
            public_id,
            format,
            width: width as i64,
            height: height as i64,
            bytes: bytes as i64,
        })
    }

    async fn destroy(&self, public_id: &str) -> Result<()> {
        let target = self.resolve(public_id)?;
        let (Some(dir), Some(stem)) = (target.parent(), target.file_name()) else {
            return Ok(());
        };

        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            // A folder sharing the id's name is not a stored object
            if path.file_stem() == Some(stem) && entry.file_type().await?.is_file() {
                fs::remove_file(&path).await?;
                tracing::debug!("Deleted file {:?}", path);
            }
        }

        Ok(())
    }

    fn host_type(&self) -> &'static str {
        "local"
    }
}
