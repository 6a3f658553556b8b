use axum::extract::{Multipart, Path};
use axum::Extension;
use serde_json::Value;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, TenantContext};
use crate::storage::SharedGateway;

use super::resources::{open, parse_id, parse_multipart};

/// POST /api/:resource/:id/attachments - upload additional files onto an
/// existing document (multipart only)
pub async fn add(
    Path((resource, id)): Path<(String, String)>,
    Extension(tenant): Extension<TenantContext>,
    Extension(SharedGateway(gateway)): Extension<SharedGateway>,
    multipart: Multipart,
) -> ApiResult<Value> {
    let (service, _) = open(&resource, gateway).await?;
    let id = parse_id(&id)?;

    let (_, files) = parse_multipart(multipart).await?;
    if files.is_empty() {
        return Err(ApiError::validation("no files supplied"));
    }

    let updated = service.add_attachments(tenant.school_id, id, files).await?;
    Ok(ApiResponse::success(updated))
}

/// DELETE /api/:resource/:id/attachments/:attachment_id - detach one
/// attachment and delete its backing object
pub async fn remove(
    Path((resource, id, attachment_id)): Path<(String, String, String)>,
    Extension(tenant): Extension<TenantContext>,
    Extension(SharedGateway(gateway)): Extension<SharedGateway>,
) -> ApiResult<Value> {
    let (service, _) = open(&resource, gateway).await?;
    let id = parse_id(&id)?;
    let attachment_id = uuid::Uuid::parse_str(&attachment_id)
        .map_err(|_| ApiError::validation_field("Invalid attachment id", "attachmentId"))?;

    let updated = service
        .remove_attachment(tenant.school_id, id, attachment_id)
        .await?;
    Ok(ApiResponse::success(updated))
}
