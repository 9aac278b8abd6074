pub mod auth;
pub mod contact;
pub mod dashboard;
pub mod health;
pub mod upload;
pub mod user;

use axum::extract::FromRequest;

use crate::error::AppError;

/// JSON body extractor whose rejections render through [`AppError`]
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
