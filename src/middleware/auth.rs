use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::auth::{self, Claims};
use crate::config;
use crate::error::ApiError;

/// Verified tenant context extracted from JWT claims and injected into
/// the request. Resource services take the tenant id from here and
/// nowhere else — a client-supplied `schoolId` is never trusted.
#[derive(Clone, Debug)]
pub struct TenantContext {
    pub school_id: Uuid,
    pub admin_id: Uuid,
    pub email: String,
    pub role: String,
}

impl TenantContext {
    pub fn is_root(&self) -> bool {
        self.role == auth::ROLE_ROOT
    }
}

impl From<Claims> for TenantContext {
    fn from(claims: Claims) -> Self {
        Self {
            school_id: claims.school_id,
            admin_id: claims.admin_id,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// JWT authentication middleware: validates the bearer token and injects
/// the tenant context for downstream handlers.
pub async fn jwt_auth_middleware(
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer_token(&headers)
        .map_err(|msg| ApiError::unauthorized(msg).into_response())?;

    let secret = &config::config().security.jwt_secret;
    let claims = auth::verify_token(&token, secret)
        .map_err(|e| ApiError::from(e).into_response())?;

    request.extensions_mut().insert(TenantContext::from(claims));

    Ok(next.run(request).await)
}

/// Extract the token from the Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get("authorization")
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty bearer token".to_string());
        }
        Ok(token.to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}
