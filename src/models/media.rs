use chrono::DateTime;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use crate::storage::HostedAsset;

/// Media asset row
#[derive(Debug, Clone, FromRow)]
pub struct Media {
    pub id: String,
    pub url: String,
    pub public_id: String,
    pub format: String,
    pub width: i64,
    pub height: i64,
    pub bytes: i64,
    pub title: Option<String>,
    pub tags: Json<Vec<String>>,
    pub created_at: String,
}

/// Full media record returned by the detail endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaDetail {
    pub id: String,
    pub url: String,
    pub public_id: String,
    pub format: String,
    pub width: i64,
    pub height: i64,
    pub bytes: i64,
    pub title: Option<String>,
    pub tags: Vec<String>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

impl From<Media> for MediaDetail {
    fn from(media: Media) -> Self {
        Self {
            id: media.id,
            url: media.url,
            public_id: media.public_id,
            format: media.format,
            width: media.width,
            height: media.height,
            bytes: media.bytes,
            title: media.title,
            tags: media.tags.0,
            created_at: media.created_at,
        }
    }
}

/// Gallery list entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaListItem {
    pub id: String,
    pub url: String,
    pub title: String,
    pub tags: Vec<String>,
    pub date: String,
}

impl From<Media> for MediaListItem {
    fn from(media: Media) -> Self {
        let date = DateTime::parse_from_rfc3339(&media.created_at)
            .map(|dt| dt.date_naive().format("%Y-%m-%d").to_string())
            .unwrap_or_else(|_| media.created_at.chars().take(10).collect());
        let title = media
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "Untitled".to_string());

        Self {
            id: media.id,
            url: media.url,
            title,
            tags: media.tags.0,
            date,
        }
    }
}

/// Raw list query. Values stay strings so a bad `limit` falls back to the default instead of rejecting.
#[derive(Debug, Default, Deserialize)]
pub struct MediaQuery {
    pub limit: Option<String>,
    pub page: Option<String>,
    pub search: Option<String>,
    pub tags: Option<String>,
}

/// Normalized list parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ListParams {
    pub limit: i64,
    pub page: i64,
    pub search: Option<String>,
    pub tags: Vec<String>,
}

impl MediaQuery {
    pub fn normalize(&self, default_limit: i64, max_limit: i64) -> ListParams {
        let limit = self
            .limit
            .as_deref()
            .and_then(|l| l.trim().parse::<i64>().ok())
            .filter(|l| *l > 0)
            .unwrap_or(default_limit)
            .min(max_limit);
        let page = self
            .page
            .as_deref()
            .and_then(|p| p.trim().parse::<i64>().ok())
            .filter(|p| *p > 0)
            .unwrap_or(1);
        let search = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        ListParams {
            limit,
            page,
            search,
            tags: self.tags.as_deref().map(parse_tags).unwrap_or_default(),
        }
    }
}

/// Split a comma separated tag list, dropping blanks and duplicates
pub fn parse_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MediaListResponse {
    pub success: bool,
    pub data: Vec<MediaListItem>,
    pub pagination: Pagination,
}

/// Manifest of a batch upload
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub files: Vec<HostedAsset>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<String>,
}

/// Title/tags applied to every file of an upload batch
#[derive(Debug, Clone, Default)]
pub struct BatchMetadata {
    pub title: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateMediaRequest {
    pub title: Option<String>,
    pub tags: Option<Vec<String>>,
}
