use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::ROLE_ADMIN;
use crate::database::manager::DatabaseManager;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::AdminService;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// POST /auth/register - create a super admin and provision its school.
/// Registration always yields the plain admin role; root accounts are
/// minted from the CLI only.
pub async fn register(Json(payload): Json<RegisterRequest>) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let service = AdminService::new(pool);

    let (admin, token) = service
        .register(&payload.name, &payload.email, &payload.password, ROLE_ADMIN)
        .await?;

    Ok(ApiResponse::created(json!({
        "admin": admin.to_api_value(),
        "token": token,
    })))
}

/// POST /auth/login - verify credentials, issue a tenant-bearing token
pub async fn login(Json(payload): Json<LoginRequest>) -> ApiResult<Value> {
    let pool = DatabaseManager::pool().await?;
    let service = AdminService::new(pool);

    let (admin, token) = service.login(&payload.email, &payload.password).await?;

    Ok(ApiResponse::success(json!({
        "admin": admin.to_api_value(),
        "token": token,
    })))
}
