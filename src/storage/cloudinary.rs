//! Cloudinary media host.
//!
//! Uses the signed upload API directly over HTTPS: every request carries the
//! API key, a unix timestamp and a SHA-1 signature over the sorted parameters.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::path::Path;
use std::time::Duration;

use crate::config::CloudinaryConfig;
use crate::error::{AppError, Result};
use crate::storage::{HostedAsset, MediaHost, UploadPolicy};

const DEFAULT_API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Cloudinary storage provider
pub struct CloudinaryHost {
    client: reqwest::Client,
    api_base: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

#[derive(Debug, Deserialize)]
struct UploadResult {
    secure_url: String,
    public_id: String,
    #[serde(default)]
    format: String,
    #[serde(default)]
    width: i64,
    #[serde(default)]
    height: i64,
    #[serde(default)]
    bytes: i64,
}

#[derive(Debug, Deserialize)]
struct DestroyResult {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl CloudinaryHost {
    pub fn new(config: &CloudinaryConfig, timeout: Duration) -> Result<Self> {
        if config.cloud_name.is_empty() || config.api_key.is_empty() || config.api_secret.is_empty()
        {
            return Err(AppError::Internal(
                "Cloudinary credentials are not configured".to_string(),
            ));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        })
    }

    /// Point the host at another API root (e.g. a local stub)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, resource_type: &str, action: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.api_base, self.cloud_name, resource_type, action
        )
    }

    /// Turn a non-success response into a storage error carrying Cloudinary's message
    async fn failure(response: reqwest::Response) -> AppError {
        let status = response.status();
        let message = match response.json::<ErrorEnvelope>().await {
            Ok(envelope) => envelope.error.message,
            Err(_) => format!("Cloudinary request failed with status {}", status),
        };
        AppError::Storage(message)
    }
}

/// Incoming transformation that caps dimensions and lets Cloudinary pick the quality
pub fn transformation(policy: &UploadPolicy) -> String {
    format!(
        "c_limit,w_{},h_{}/q_auto",
        policy.max_width, policy.max_height
    )
}

/// Cloudinary request signature: SHA-1 hex of `k=v&...` (sorted, empty values skipped) + secret
pub fn sign_params(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl MediaHost for CloudinaryHost {
    async fn upload(
        &self,
        local_path: &Path,
        file_name: &str,
        policy: &UploadPolicy,
    ) -> Result<HostedAsset> {
        let data = tokio::fs::read(local_path).await?;
        let mime = mime_guess::from_path(file_name).first_or_octet_stream();

        let params = vec![
            ("allowed_formats", policy.allowed_formats.join(",")),
            ("folder", policy.folder.clone()),
            ("timestamp", Utc::now().timestamp().to_string()),
            ("transformation", transformation(policy)),
        ];
        let signature = sign_params(&params, &self.api_secret);

        let part = Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str(mime.as_ref())?;
        let mut form = Form::new()
            .part("file", part)
            .text("api_key", self.api_key.clone())
            .text("signature", signature);
        for (key, value) in params {
            if !value.is_empty() {
                form = form.text(key, value);
            }
        }

        tracing::info!("Uploading {} to Cloudinary", file_name);
        let response = self
            .client
            .post(self.endpoint("auto", "upload"))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }

        let result: UploadResult = response.json().await?;
        tracing::info!("Successfully uploaded to Cloudinary: {}", result.public_id);

        Ok(HostedAsset {
            url: result.secure_url,
            public_id: result.public_id,
            format: result.format,
            width: result.width,
            height: result.height,
            bytes: result.bytes,
        })
    }

    async fn destroy(&self, public_id: &str) -> Result<()> {
        let params = vec![
            ("public_id", public_id.to_string()),
            ("timestamp", Utc::now().timestamp().to_string()),
        ];
        let signature = sign_params(&params, &self.api_secret);

        let mut form: Vec<(&str, String)> = params;
        form.push(("api_key", self.api_key.clone()));
        form.push(("signature", signature));

        let response = self
            .client
            .post(self.endpoint("image", "destroy"))
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }

        let result: DestroyResult = response.json().await?;
        match result.result.as_str() {
            "ok" => tracing::debug!("Deleted from Cloudinary: {}", public_id),
            // Absent objects count as deleted
            "not found" => tracing::debug!("Cloudinary object already absent: {}", public_id),
            other => {
                return Err(AppError::Storage(format!(
                    "Cloudinary destroy returned {}",
                    other
                )))
            }
        }
        Ok(())
    }

    fn host_type(&self) -> &'static str {
        "cloudinary"
    }
}
