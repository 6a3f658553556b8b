use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{FromRequest, Multipart, Path, Query, Request};
use axum::http::header::CONTENT_TYPE;
use axum::Extension;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::database::manager::DatabaseManager;
use crate::database::record::parse_date;
use crate::database::schema::ResourceSpec;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, TenantContext};
use crate::query::{Condition, Direction, ListQuery, PageRequest, Sort};
use crate::registry;
use crate::services::ResourceService;
use crate::storage::{IncomingFile, ObjectGateway, SharedGateway};

/// GET /api/:resource - tenant-scoped, filtered, paginated listing
pub async fn list(
    Path(resource): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(SharedGateway(gateway)): Extension<SharedGateway>,
) -> ApiResult<Value> {
    let (service, spec) = open(&resource, gateway).await?;
    let query = build_list_query(spec, &params)?;
    let page = service.list(tenant.school_id, &query).await?;
    Ok(ApiResponse::list(page))
}

/// GET /api/:resource/all-unfiltered - cross-tenant listing, root only.
/// A deliberately separate route: tenant scoping is never silently
/// bypassed on the default listing.
pub async fn list_unfiltered(
    Path(resource): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(SharedGateway(gateway)): Extension<SharedGateway>,
) -> ApiResult<Value> {
    if !tenant.is_root() {
        return Err(ApiError::forbidden("cross-tenant listing requires the root role"));
    }
    let (service, spec) = open(&resource, gateway).await?;
    let query = build_list_query(spec, &params)?;
    let page = service.list_across_tenants(&query).await?;
    Ok(ApiResponse::list(page))
}

/// POST /api/:resource - create; accepts JSON, or multipart form data
/// when the resource carries attachments
pub async fn create(
    Path(resource): Path<String>,
    Extension(tenant): Extension<TenantContext>,
    Extension(SharedGateway(gateway)): Extension<SharedGateway>,
    request: Request,
) -> ApiResult<Value> {
    let (service, _) = open(&resource, gateway).await?;
    let (body, files) = parse_body(request).await?;
    let created = service.create(tenant.school_id, &body, files).await?;
    Ok(ApiResponse::created(created))
}

/// GET /api/:resource/:id - single fetch, tenant-scoped
pub async fn show(
    Path((resource, id)): Path<(String, String)>,
    Extension(tenant): Extension<TenantContext>,
    Extension(SharedGateway(gateway)): Extension<SharedGateway>,
) -> ApiResult<Value> {
    let (service, _) = open(&resource, gateway).await?;
    let id = parse_id(&id)?;
    let found = service.get(tenant.school_id, id).await?;
    Ok(ApiResponse::success(found))
}

/// PUT /api/:resource/:id - partial update, tenant-scoped
pub async fn update(
    Path((resource, id)): Path<(String, String)>,
    Extension(tenant): Extension<TenantContext>,
    Extension(SharedGateway(gateway)): Extension<SharedGateway>,
    axum::Json(body): axum::Json<Value>,
) -> ApiResult<Value> {
    let (service, _) = open(&resource, gateway).await?;
    let id = parse_id(&id)?;
    let updated = service.update(tenant.school_id, id, &body).await?;
    Ok(ApiResponse::success(updated))
}

/// DELETE /api/:resource/:id - delete with attachment cascade. The
/// tenant comes from the authenticated context, same as every verb.
pub async fn destroy(
    Path((resource, id)): Path<(String, String)>,
    Extension(tenant): Extension<TenantContext>,
    Extension(SharedGateway(gateway)): Extension<SharedGateway>,
) -> ApiResult<Value> {
    let (service, _) = open(&resource, gateway).await?;
    let id = parse_id(&id)?;
    let deleted = service.delete(tenant.school_id, id).await?;
    Ok(ApiResponse::success(deleted))
}

/// Resolve the route segment and build a service for it.
pub(super) async fn open(
    resource: &str,
    gateway: Arc<dyn ObjectGateway>,
) -> Result<(ResourceService, &'static ResourceSpec), ApiError> {
    let spec = registry::find(resource)
        .ok_or_else(|| ApiError::not_found(format!("unknown resource: {}", resource)))?;
    let pool = DatabaseManager::pool().await?;
    Ok((ResourceService::new(spec, pool, gateway), spec))
}

pub(super) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::validation_field("Invalid resource id", "id"))
}

/// Translate query-string parameters into a typed listing request:
/// pagination, the spec's equality filters, from/to on the range field
/// and an optional sort override.
fn build_list_query(
    spec: &'static ResourceSpec,
    params: &HashMap<String, String>,
) -> Result<ListQuery, ApiError> {
    let page = PageRequest::from_params(
        params.get("page").and_then(|v| v.parse().ok()),
        params.get("limit").and_then(|v| v.parse().ok()),
    );
    let mut query = ListQuery::new(page);

    for field in spec.filterable {
        if let Some(value) = params.get(*field) {
            if !value.is_empty() {
                query.conditions.push(Condition::eq(*field, value.clone()));
            }
        }
    }

    if let Some(range_field) = spec.range_field {
        for (param, build) in [
            ("from", Condition::gte as fn(String, String) -> Condition),
            ("to", Condition::lte as fn(String, String) -> Condition),
        ] {
            if let Some(value) = params.get(param) {
                if value.is_empty() {
                    continue;
                }
                if spec.is_date_field(range_field) && parse_date(value).is_none() {
                    return Err(ApiError::validation_field(
                        format!("Invalid date for '{}': {}", param, value),
                        param,
                    ));
                }
                query
                    .conditions
                    .push(build(range_field.to_string(), value.clone()));
            }
        }
    }

    if let Some(field) = params.get("sort") {
        if !is_sortable(spec, field) {
            return Err(ApiError::validation_field(
                format!("Cannot sort by '{}'", field),
                "sort",
            ));
        }
        let direction = match params.get("dir") {
            Some(dir) => Direction::parse(dir)
                .map_err(|e| ApiError::validation_field(e.to_string(), "dir"))?,
            None => Direction::Asc,
        };
        query.sort = Some(Sort::new(field.clone(), direction));
    }

    Ok(query)
}

fn is_sortable(spec: &ResourceSpec, field: &str) -> bool {
    field == "created_at"
        || field == "updated_at"
        || field == spec.default_sort.0
        || spec.filterable.contains(&field)
        || spec.is_date_field(field)
}

/// Read the request body as a document plus incoming files. Multipart
/// text parts become string fields; parts carrying a filename become
/// uploads. JSON bodies carry no files.
pub(super) async fn parse_body(request: Request) -> Result<(Value, Vec<IncomingFile>), ApiError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ApiError::validation(format!("Invalid multipart body: {}", e)))?;
        parse_multipart(multipart).await
    } else {
        let bytes = axum::body::to_bytes(
            request.into_body(),
            crate::config::config().api.max_request_size_bytes,
        )
        .await
        .map_err(|e| ApiError::validation(format!("Unreadable request body: {}", e)))?;

        if bytes.is_empty() {
            return Ok((Value::Object(Map::new()), vec![]));
        }
        let body: Value = serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::validation(format!("Invalid JSON body: {}", e)))?;
        Ok((body, vec![]))
    }
}

pub(super) async fn parse_multipart(
    mut multipart: Multipart,
) -> Result<(Value, Vec<IncomingFile>), ApiError> {
    let mut fields = Map::new();
    let mut files = Vec::new();
    let max_upload = crate::config::config().storage.max_upload_bytes;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if let Some(file_name) = field.file_name().map(str::to_string) {
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::validation(format!("Unreadable file part: {}", e)))?;
            if bytes.len() > max_upload {
                return Err(ApiError::validation_field(
                    format!("File exceeds upload limit of {} bytes", max_upload),
                    name,
                ));
            }
            files.push(IncomingFile { file_name, content_type, bytes });
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::validation(format!("Unreadable form field: {}", e)))?;
            fields.insert(name, Value::String(text));
        }
    }

    Ok((Value::Object(fields), files))
}
