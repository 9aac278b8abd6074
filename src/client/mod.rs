//! Typed HTTP client for the gallery API.
//!
//! Every call decodes either the endpoint's payload or the uniform failure
//! envelope into [`ApiFailure`]. The session cookie returned by signin is kept
//! in a [`SessionContext`] and replayed on later calls.

mod session;

pub use session::{Session, SessionContext};

use axum_extra::extract::cookie::Cookie;
use reqwest::{
    header::{COOKIE, SET_COOKIE},
    multipart::{Form, Part},
    RequestBuilder, StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

use crate::error::ErrorBody;
use crate::middleware::auth::SESSION_COOKIE;
use crate::models::{
    ContactRequest, DashboardStats, GoogleAuthRequest, MediaDetail, MediaListResponse,
    SigninRequest, SignupRequest, UpdateMediaRequest, UpdateProfileRequest, UploadResponse,
    UserResponse,
};

/// Failure reported by the API
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{status_code}: {error}")]
pub struct ApiFailure {
    pub status_code: u16,
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("API error: {0}")]
    Api(#[from] ApiFailure),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ClientError {
    /// The API failure, if the server answered with one
    pub fn api(&self) -> Option<&ApiFailure> {
        match self {
            ClientError::Api(failure) => Some(failure),
            ClientError::Transport(_) => None,
        }
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// One file of an upload batch
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Filters for the gallery listing
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", serialize_with = "comma_joined")]
    pub tags: Vec<String>,
}

fn comma_joined<S: serde::Serializer>(tags: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&tags.join(","))
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct DataBody<T> {
    data: T,
}

#[derive(Debug, Clone)]
pub struct GalleryClient {
    http: reqwest::Client,
    base_url: String,
    session: SessionContext,
}

impl GalleryClient {
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session: SessionContext::default(),
        })
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send with the session cookie attached and split success from the failure envelope
    async fn execute(&self, request: RequestBuilder) -> ClientResult<reqwest::Response> {
        let request = match self.session.token() {
            Some(token) => request.header(COOKIE, format!("{}={}", SESSION_COOKIE, token)),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            self.session.invalidate();
        }

        let text = response.text().await.unwrap_or_default();
        let failure = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => ApiFailure {
                status_code: body.status_code,
                error: body.error,
            },
            Err(_) => ApiFailure {
                status_code: status.as_u16(),
                error: status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string(),
            },
        };
        Err(failure.into())
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        Ok(self.execute(request).await?.json().await?)
    }

    async fn message(&self, request: RequestBuilder) -> ClientResult<String> {
        Ok(self.json::<MessageBody>(request).await?.message)
    }

    async fn data<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        Ok(self.json::<DataBody<T>>(request).await?.data)
    }

    /// Read the account and the issued cookie, then open the session
    async fn open_session(&self, request: RequestBuilder) -> ClientResult<UserResponse> {
        let response = self.execute(request).await?;
        let token = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| Cookie::parse(value.to_string()).ok())
            .find(|cookie| cookie.name() == SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string());
        let user: UserResponse = response.json().await?;

        match token {
            Some(token) => self.session.establish(Session {
                user: user.clone(),
                token,
            }),
            None => tracing::warn!("Signin response carried no session cookie"),
        }
        Ok(user)
    }

    pub async fn signup(&self, req: &SignupRequest) -> ClientResult<String> {
        self.message(self.http.post(self.url("/api/auth/signup")).json(req))
            .await
    }

    pub async fn signin(&self, req: &SigninRequest) -> ClientResult<UserResponse> {
        self.open_session(self.http.post(self.url("/api/auth/signin")).json(req))
            .await
    }

    pub async fn google(&self, req: &GoogleAuthRequest) -> ClientResult<UserResponse> {
        self.open_session(self.http.post(self.url("/api/auth/google")).json(req))
            .await
    }

    /// Sign out; the local session is dropped even when the call fails
    pub async fn signout(&self) -> ClientResult<String> {
        let result = self
            .message(self.http.post(self.url("/api/auth/signout")))
            .await;
        self.session.invalidate();
        result
    }

    pub async fn me(&self) -> ClientResult<UserResponse> {
        let user: UserResponse = self.json(self.http.get(self.url("/api/user/me"))).await?;
        self.session.refresh_user(user.clone());
        Ok(user)
    }

    pub async fn update_profile(&self, req: &UpdateProfileRequest) -> ClientResult<UserResponse> {
        let user: UserResponse = self
            .json(self.http.patch(self.url("/api/user/profile")).json(req))
            .await?;
        self.session.refresh_user(user.clone());
        Ok(user)
    }

    pub async fn upload(
        &self,
        files: Vec<UploadFile>,
        title: Option<&str>,
        tags: &[String],
    ) -> ClientResult<UploadResponse> {
        let mut form = Form::new();
        for file in files {
            form = form.part("files", Part::bytes(file.bytes).file_name(file.file_name));
        }
        if let Some(title) = title {
            form = form.text("title", title.to_string());
        }
        if !tags.is_empty() {
            form = form.text("tags", tags.join(","));
        }

        self.json(self.http.post(self.url("/api/upload/upload")).multipart(form))
            .await
    }

    pub async fn list(&self, options: &ListOptions) -> ClientResult<MediaListResponse> {
        self.json(self.http.get(self.url("/api/upload/all")).query(options))
            .await
    }

    pub async fn get_media(&self, id: &str) -> ClientResult<MediaDetail> {
        let path = format!("/api/upload/{}", urlencoding::encode(id));
        self.data(self.http.get(self.url(&path))).await
    }

    pub async fn update_media(
        &self,
        id: &str,
        req: &UpdateMediaRequest,
    ) -> ClientResult<MediaDetail> {
        let path = format!("/api/upload/{}", urlencoding::encode(id));
        self.data(self.http.patch(self.url(&path)).json(req)).await
    }

    /// Delete by public id; folder separators are kept as path segments
    pub async fn delete_media(&self, public_id: &str) -> ClientResult<String> {
        let encoded = public_id
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let path = format!("/api/upload/delete/{}", encoded);
        self.message(self.http.delete(self.url(&path))).await
    }

    pub async fn stats(&self) -> ClientResult<DashboardStats> {
        self.data(self.http.get(self.url("/api/dashboard/stats")))
            .await
    }

    pub async fn contact(&self, req: &ContactRequest) -> ClientResult<String> {
        self.message(self.http.post(self.url("/api/contact")).json(req))
            .await
    }
}
