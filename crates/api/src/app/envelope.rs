//! The `{success, message, data?, pagination?}` wrapper every endpoint returns.

use std::borrow::Cow;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use flame_core::{Page, Pagination};

use super::errors::ApiError;

pub type ApiResult = Result<Response, ApiError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub success: bool,
    pub message: Cow<'static, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unread_count: Option<u64>,
}

impl<T> Envelope<T> {
    pub fn success(message: &'static str, data: Option<T>) -> Self {
        Self {
            success: true,
            message: Cow::Borrowed(message),
            data,
            pagination: None,
            unread_count: None,
        }
    }

    pub fn failure(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            pagination: None,
            unread_count: None,
        }
    }
}

impl<T> Envelope<Vec<T>> {
    pub fn page(message: &'static str, page: Page<T>) -> Self {
        Self {
            pagination: Some(page.pagination),
            ..Self::success(message, Some(page.items))
        }
    }
}

fn respond<T: Serialize>(status: StatusCode, body: Envelope<T>) -> Response {
    (status, Json(body)).into_response()
}

pub fn ok<T: Serialize>(message: &'static str, data: T) -> ApiResult {
    Ok(respond(StatusCode::OK, Envelope::success(message, Some(data))))
}

pub fn created<T: Serialize>(message: &'static str, data: T) -> ApiResult {
    Ok(respond(StatusCode::CREATED, Envelope::success(message, Some(data))))
}

pub fn paged<T: Serialize>(message: &'static str, page: Page<T>) -> ApiResult {
    Ok(respond(StatusCode::OK, Envelope::page(message, page)))
}

/// Success with nothing but a message.
pub fn done(message: &'static str) -> ApiResult {
    Ok(respond(StatusCode::OK, Envelope::<()>::success(message, None)))
}

pub fn with_status(status: StatusCode, body: Envelope<impl Serialize>) -> ApiResult {
    Ok(respond(status, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flame_core::PageRequest;
    use serde_json::json;

    #[test]
    fn empty_fields_are_left_out() {
        let body = serde_json::to_value(Envelope::<()>::success("Product deleted successfully", None)).unwrap();
        assert_eq!(body, json!({"success": true, "message": "Product deleted successfully"}));

        let body = serde_json::to_value(Envelope::<()>::failure("Route not found")).unwrap();
        assert_eq!(body, json!({"success": false, "message": "Route not found"}));
    }

    #[test]
    fn pages_carry_their_pagination_block() {
        let page = Page::from_sorted(vec![1, 2, 3], &PageRequest::new(Some(2), Some(2), 10));
        let mut env = Envelope::page("Orders fetched successfully", page);
        env.unread_count = Some(4);
        let body = serde_json::to_value(env).unwrap();
        assert_eq!(body["data"], json!([3]));
        assert_eq!(body["pagination"], json!({"page": 2, "limit": 2, "total": 3, "pages": 2}));
        assert_eq!(body["unreadCount"], 4);
    }
}
