/// Success envelope
///
/// ```json
/// { "success": true, "message": "Success", "data": {...}, "metadata": null }
/// ```
///
/// `metadata` carries pagination details for list endpoints.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use taskmm_shared::pagination::{CursorPage, Page};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
    pub metadata: Option<serde_json::Value>,

    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    /// 200 with the default message
    pub fn ok(data: T) -> Self {
        Self::with_message(data, "Success")
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            metadata: None,
            status: StatusCode::OK,
        }
    }

    /// 201
    pub fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..Self::with_message(data, "Created")
        }
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

impl ApiResponse<serde_json::Value> {
    /// 200 with no payload
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            metadata: None,
            status: StatusCode::OK,
        }
    }
}

impl<T: Serialize> ApiResponse<Vec<T>> {
    pub fn page(page: Page<T>) -> Self {
        let metadata = page.metadata();
        Self::ok(page.items).metadata(metadata)
    }

    pub fn cursor_page(page: CursorPage<T>) -> Self {
        let metadata = page.metadata();
        Self::ok(page.items).metadata(metadata)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}
