use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::Config;
use crate::error::Result;

/// Server-side policy applied to every forwarded upload
#[derive(Debug, Clone, PartialEq)]
pub struct UploadPolicy {
    pub folder: String,
    pub max_width: u32,
    pub max_height: u32,
    pub allowed_formats: Vec<String>,
}

impl UploadPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            folder: config.cloudinary.folder.clone(),
            max_width: config.upload.max_width,
            max_height: config.upload.max_height,
            allowed_formats: config
                .upload
                .allowed_formats
                .iter()
                .map(|f| f.to_lowercase())
                .collect(),
        }
    }

    pub fn allows_format(&self, format: &str) -> bool {
        let format = format.to_lowercase();
        self.allowed_formats.iter().any(|f| *f == format)
    }
}

/// Metadata returned by the host for a stored object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostedAsset {
    pub url: String,
    pub public_id: String,
    pub format: String,
    pub width: i64,
    pub height: i64,
    pub bytes: i64,
}

/// External media host
#[async_trait]
pub trait MediaHost: Send + Sync {
    /// Store the file at `local_path` under `policy`. `file_name` is the client-side name.
    async fn upload(
        &self,
        local_path: &Path,
        file_name: &str,
        policy: &UploadPolicy,
    ) -> Result<HostedAsset>;

    /// Remove an object. Removing an object that does not exist succeeds.
    async fn destroy(&self, public_id: &str) -> Result<()>;

    /// Get the host type name
    fn host_type(&self) -> &'static str;
}
