//! Request and response bodies
//!
//! Successful JSON responses share the `{success: true, data}` envelope.

pub mod billing;
pub mod claims;
pub mod insurance;
pub mod pharmacy;

use axum::{http::StatusCode, Json};
use serde::Serialize;

use crate::error::ApiError;

/// Success envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self { success: true, data: Some(data), message: None })
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self { success: true, data: Some(data), message: Some(message.into()) })
    }
}

impl ApiResponse<()> {
    /// A body with only a message
    pub fn message(message: impl Into<String>) -> Json<Self> {
        Json(Self { success: true, data: None, message: Some(message.into()) })
    }
}

/// `201 Created` with the envelope
pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, ApiResponse::ok(data))
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;
pub type CreatedResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;
