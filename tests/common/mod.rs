#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

use media_gallery::config::Config;
use media_gallery::db::Database;
use media_gallery::error::{AppError, Result};
use media_gallery::storage::{HostedAsset, MediaHost, UploadPolicy};
use media_gallery::AppState;

/// Media host double: files whose name contains "fail" are rejected, destroys are recorded
#[derive(Default)]
pub struct ScriptedHost {
    counter: AtomicUsize,
    destroyed: Mutex<Vec<String>>,
}

impl ScriptedHost {
    pub fn destroyed(&self) -> Vec<String> {
        self.destroyed.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaHost for ScriptedHost {
    async fn upload(
        &self,
        local_path: &Path,
        file_name: &str,
        policy: &UploadPolicy,
    ) -> Result<HostedAsset> {
        let bytes = tokio::fs::metadata(local_path).await?.len();
        if file_name.contains("fail") {
            return Err(AppError::Storage("Upload rejected by host".to_string()));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(HostedAsset {
            url: format!("https://cdn.test/{}/asset-{}.png", policy.folder, n),
            public_id: format!("{}/asset-{}", policy.folder, n),
            format: "png".to_string(),
            width: 10,
            height: 10,
            bytes: bytes as i64,
        })
    }

    async fn destroy(&self, public_id: &str) -> Result<()> {
        self.destroyed.lock().unwrap().push(public_id.to_string());
        Ok(())
    }

    fn host_type(&self) -> &'static str {
        "scripted"
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub host: Arc<ScriptedHost>,
    pub dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.auth.bcrypt_cost = 4;
        config.jwt.secret = "integration-test-secret".to_string();
        config.storage.temp_dir = dir.path().join("uploads").to_string_lossy().into_owned();
        config.storage.local_path = dir.path().join("media").to_string_lossy().into_owned();
        adjust(&mut config);

        let db = Database::in_memory().await.unwrap();
        db.run_migrations().await.unwrap();

        let host = Arc::new(ScriptedHost::default());
        let state = AppState {
            db,
            config: Arc::new(config),
            media_host: host.clone(),
        };

        Self {
            router: media_gallery::create_router(state.clone()),
            state,
            host,
            dir,
        }
    }

    pub fn temp_dir(&self) -> &Path {
        Path::new(&self.state.config.storage.temp_dir)
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, body)
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(self.state.db.pool())
            .await
            .unwrap()
    }

    /// Sign up and sign in, returning the session token
    pub async fn signed_in(&self, username: &str, email: &str) -> String {
        let (status, _, _) = self
            .send(json_request(
                Method::POST,
                "/api/auth/signup",
                serde_json::json!({ "username": username, "email": email, "password": "secret1" }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, headers, _) = self
            .send(json_request(
                Method::POST,
                "/api/auth/signin",
                serde_json::json!({ "email": email, "password": "secret1" }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        session_token(&headers).unwrap()
    }
}

pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn with_session(mut request: Request<Body>, token: &str) -> Request<Body> {
    request.headers_mut().insert(
        header::COOKIE,
        format!("access_token={}", token).parse().unwrap(),
    );
    request
}

const BOUNDARY: &str = "media-gallery-test-boundary";

/// Multipart upload with `files` parts and extra text fields
pub fn multipart_request(uri: &str, files: &[(&str, &[u8])], fields: &[(&str, &str)]) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    for (file_name, bytes) in files {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\n",
                file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Raw `Set-Cookie` header for the session cookie
pub fn session_set_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("access_token="))
        .map(str::to_string)
}

pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let raw = session_set_cookie(headers)?;
    let pair = raw.split(';').next()?;
    pair.strip_prefix("access_token=")
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
