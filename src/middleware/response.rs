use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::query::Page;

/// Wrapper for API responses that adds the success envelope. List
/// responses additionally carry pagination metadata.
#[derive(Debug)]
pub enum ApiResponse<T: Serialize> {
    Single {
        data: T,
        status_code: StatusCode,
    },
    List {
        items: Vec<T>,
        total: i64,
        page: i64,
        limit: i64,
        total_pages: i64,
    },
}

impl<T: Serialize> ApiResponse<T> {
    /// Successful response with default 200 status
    pub fn success(data: T) -> Self {
        Self::Single { data, status_code: StatusCode::OK }
    }

    /// 201 Created response
    pub fn created(data: T) -> Self {
        Self::Single { data, status_code: StatusCode::CREATED }
    }

    /// Paginated list response: `{success, data, total, page, limit, totalPages}`
    pub fn list(page: Page<T>) -> Self {
        let total_pages = page.total_pages();
        Self::List {
            items: page.items,
            total: page.total,
            page: page.page,
            limit: page.limit,
            total_pages,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match self {
            ApiResponse::Single { data, status_code } => {
                let data_value = match serde_json::to_value(&data) {
                    Ok(value) => value,
                    Err(e) => return serialization_failure(e),
                };
                let envelope = json!({ "success": true, "data": data_value });
                (status_code, Json(envelope)).into_response()
            }
            ApiResponse::List { items, total, page, limit, total_pages } => {
                let items_value = match serde_json::to_value(&items) {
                    Ok(value) => value,
                    Err(e) => return serialization_failure(e),
                };
                let envelope = json!({
                    "success": true,
                    "data": items_value,
                    "total": total,
                    "page": page,
                    "limit": limit,
                    "totalPages": total_pages,
                });
                (StatusCode::OK, Json(envelope)).into_response()
            }
        }
    }
}

fn serialization_failure(e: serde_json::Error) -> Response {
    tracing::error!("Failed to serialize response data: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "success": false,
            "error": "Failed to serialize response data"
        })),
    )
        .into_response()
}

pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::PageRequest;
    use serde_json::Value;

    #[test]
    fn list_response_carries_pagination_metadata() {
        let page = Page::new(
            vec![Value::from("a"), Value::from("b")],
            15,
            PageRequest { page: 2, limit: 10 },
        );
        let response = ApiResponse::list(page);
        match response {
            ApiResponse::List { total, page, limit, total_pages, ref items } => {
                assert_eq!((total, page, limit, total_pages), (15, 2, 10, 2));
                assert_eq!(items.len(), 2);
            }
            _ => panic!("expected list response"),
        }
    }
}
