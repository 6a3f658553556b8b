use std::sync::Arc;

use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::attachments;
use crate::database::record;
use crate::database::repository::TenantRepository;
use crate::database::schema::{AttachmentPolicy, ResourceSpec};
use crate::error::ApiError;
use crate::query::{ListQuery, Page};
use crate::storage::{IncomingFile, ObjectGateway};

/// Generic resource service: tenant-scoped repository plus the
/// attachment lifecycle, driven entirely by the resource spec. Every
/// entity-specific rule (required fields, enums, unique keys, cover
/// policy) is configuration, not code.
pub struct ResourceService {
    repo: TenantRepository,
    gateway: Arc<dyn ObjectGateway>,
}

impl ResourceService {
    pub fn new(
        spec: &'static ResourceSpec,
        pool: sqlx::PgPool,
        gateway: Arc<dyn ObjectGateway>,
    ) -> Self {
        Self {
            repo: TenantRepository::new(spec, pool),
            gateway,
        }
    }

    fn spec(&self) -> &'static ResourceSpec {
        self.repo.spec()
    }

    /// Create a document, uploading any incoming files first. If an
    /// upload fails the create fails outright; if the insert fails after
    /// uploads succeeded, the stored objects are orphaned — logged, not
    /// fatal to anything else.
    pub async fn create(
        &self,
        tenant: Uuid,
        body: &Value,
        files: Vec<IncomingFile>,
    ) -> Result<Value, ApiError> {
        let spec = self.spec();
        let mut data = record::validate_create(body, spec)?;

        let policy = spec.attachments;
        if policy.is_none() && !files.is_empty() {
            return Err(ApiError::validation(format!(
                "{} does not accept file attachments",
                spec.name
            )));
        }

        let mut attached_count = 0;
        if let Some(policy) = policy {
            let attached = attachments::attach(self.gateway.as_ref(), &files, policy.folder).await?;
            attached_count = attached.len();
            if policy.cover {
                data.insert(
                    "cover".to_string(),
                    Value::String(attachments::elect_cover(None, &attached)),
                );
            }
            data.insert(policy.field.to_string(), attachments::to_value(&attached));
        }

        match self.repo.create_with_data(tenant, data).await {
            Ok(row) => Ok(row.to_api_value()),
            Err(e) => {
                if attached_count > 0 {
                    warn!(
                        resource = spec.name,
                        count = attached_count,
                        "create failed after uploads; stored objects orphaned"
                    );
                }
                Err(e.into())
            }
        }
    }

    pub async fn list(&self, tenant: Uuid, query: &ListQuery) -> Result<Page<Value>, ApiError> {
        let page = self.repo.find_many(tenant, query).await?;
        Ok(page.map(|row| row.to_api_value()))
    }

    /// Administrative cross-tenant listing; the caller is responsible
    /// for gating this behind the root role.
    pub async fn list_across_tenants(&self, query: &ListQuery) -> Result<Page<Value>, ApiError> {
        let page = self.repo.find_many_across_tenants(query).await?;
        Ok(page.map(|row| row.to_api_value()))
    }

    pub async fn get(&self, tenant: Uuid, id: Uuid) -> Result<Value, ApiError> {
        Ok(self.repo.find_one(tenant, id).await?.to_api_value())
    }

    pub async fn update(&self, tenant: Uuid, id: Uuid, body: &Value) -> Result<Value, ApiError> {
        Ok(self.repo.update(tenant, id, body).await?.to_api_value())
    }

    /// Delete the document and cascade deletion of its attachment
    /// objects. Storage failures during the cascade are logged inside
    /// `detach_all` and never abort the delete.
    pub async fn delete(&self, tenant: Uuid, id: Uuid) -> Result<Value, ApiError> {
        let row = self.repo.delete(tenant, id).await?;

        if let Some(policy) = self.spec().attachments {
            let list = attachments::from_value(row.data.get(policy.field));
            let failures = attachments::detach_all(self.gateway.as_ref(), &list).await;
            if failures > 0 {
                warn!(
                    resource = self.spec().name,
                    id = %id,
                    failures,
                    "attachment cascade completed with failures"
                );
            }
        }

        Ok(row.to_api_value())
    }

    /// Upload additional files onto an existing document.
    pub async fn add_attachments(
        &self,
        tenant: Uuid,
        id: Uuid,
        files: Vec<IncomingFile>,
    ) -> Result<Value, ApiError> {
        let policy = self.require_attachments()?;
        if files.is_empty() {
            return Err(ApiError::validation("no files supplied"));
        }

        let row = self.repo.find_one(tenant, id).await?;
        let mut data = row.data_object();
        let mut list = attachments::from_value(data.get(policy.field));

        let added = attachments::attach(self.gateway.as_ref(), &files, policy.folder).await?;
        list.extend(added);

        self.write_attachments(policy, &mut data, list);
        Ok(self.repo.overwrite_data(tenant, id, data).await?.to_api_value())
    }

    /// Remove one attachment by id, re-electing the cover if needed.
    pub async fn remove_attachment(
        &self,
        tenant: Uuid,
        id: Uuid,
        attachment_id: Uuid,
    ) -> Result<Value, ApiError> {
        let policy = self.require_attachments()?;

        let row = self.repo.find_one(tenant, id).await?;
        let mut data = row.data_object();
        let mut list = attachments::from_value(data.get(policy.field));

        attachments::detach_one(self.gateway.as_ref(), &mut list, attachment_id).await?;

        self.write_attachments(policy, &mut data, list);
        Ok(self.repo.overwrite_data(tenant, id, data).await?.to_api_value())
    }

    fn write_attachments(
        &self,
        policy: AttachmentPolicy,
        data: &mut serde_json::Map<String, Value>,
        list: Vec<attachments::Attachment>,
    ) {
        if policy.cover {
            let current = data.get("cover").and_then(Value::as_str).map(str::to_string);
            data.insert(
                "cover".to_string(),
                Value::String(attachments::elect_cover(current.as_deref(), &list)),
            );
        }
        data.insert(policy.field.to_string(), attachments::to_value(&list));
    }

    fn require_attachments(&self) -> Result<AttachmentPolicy, ApiError> {
        self.spec().attachments.ok_or_else(|| {
            ApiError::validation(format!("{} does not accept file attachments", self.spec().name))
        })
    }
}
