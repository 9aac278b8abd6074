pub mod cloudinary;
pub mod host;
pub mod local;

pub use cloudinary::CloudinaryHost;
pub use host::*;
pub use local::LocalHost;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, HostKind};
use crate::error::Result;

/// Create the media host selected by the storage configuration
pub fn build_media_host(config: &Config) -> Result<Arc<dyn MediaHost>> {
    match config.storage.provider {
        HostKind::Local => Ok(Arc::new(LocalHost::new(
            &config.storage.local_path,
            &config.storage.public_base_url,
        ))),
        HostKind::Cloudinary => {
            let timeout = Duration::from_secs(config.storage.request_timeout_secs);
            Ok(Arc::new(CloudinaryHost::new(&config.cloudinary, timeout)?))
        }
    }
}
