use serde_json::{Map, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::query::{ListQuery, Page, QueryError, Sort};
use super::record::{self, RecordError, ResourceRow};
use super::schema::ResourceSpec;

/// Errors from repository operations, classified before they reach the
/// handler boundary.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("{resource} not found")]
    NotFound { resource: &'static str },

    #[error("{resource} violates its unique key")]
    UniqueViolation {
        resource: &'static str,
        fields: Vec<String>,
    },

    #[error("Query error: {0}")]
    Query(String),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<QueryError> for RepositoryError {
    fn from(err: QueryError) -> Self {
        RepositoryError::Query(err.to_string())
    }
}

/// Generic tenant-scoped data access, parameterized by a resource spec.
///
/// Every statement this type emits carries the tenant predicate; the only
/// way to read across tenants is the separately named
/// [`find_many_across_tenants`](Self::find_many_across_tenants).
pub struct TenantRepository {
    spec: &'static ResourceSpec,
    pool: PgPool,
}

const ROW_COLUMNS: &str = "id, school_id, data, created_at, updated_at";

impl TenantRepository {
    pub fn new(spec: &'static ResourceSpec, pool: PgPool) -> Self {
        Self { spec, pool }
    }

    pub fn spec(&self) -> &'static ResourceSpec {
        self.spec
    }

    /// Validate and insert a new document, stamped with the tenant id.
    pub async fn create(&self, tenant: Uuid, input: &Value) -> Result<ResourceRow, RepositoryError> {
        let data = record::validate_create(input, self.spec)?;
        self.create_with_data(tenant, data).await
    }

    /// Insert a pre-validated document (used by the attachment path,
    /// where the lifecycle manager injects the attachment list first).
    pub async fn create_with_data(
        &self,
        tenant: Uuid,
        data: Map<String, Value>,
    ) -> Result<ResourceRow, RepositoryError> {
        let sql = insert_sql(self.spec.table);
        let row = sqlx::query_as::<_, ResourceRow>(&sql)
            .bind(tenant)
            .bind(Value::Object(data))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| self.classify(e))?;
        Ok(row)
    }

    /// Fetch one document within the tenant. An id that exists under a
    /// different tenant is NotFound, indistinguishable from true absence.
    pub async fn find_one(&self, tenant: Uuid, id: Uuid) -> Result<ResourceRow, RepositoryError> {
        let sql = select_one_sql(self.spec.table);
        sqlx::query_as::<_, ResourceRow>(&sql)
            .bind(tenant)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| self.classify(e))?
            .ok_or(RepositoryError::NotFound { resource: self.spec.name })
    }

    /// Tenant-scoped listing with filters, sort and pagination. `total`
    /// counts the filtered set irrespective of pagination.
    pub async fn find_many(
        &self,
        tenant: Uuid,
        query: &ListQuery,
    ) -> Result<Page<ResourceRow>, RepositoryError> {
        let (select, count, params) = build_list_sql(self.spec, query, Some(tenant))?;
        self.run_list(select, count, params, query).await
    }

    /// Cross-tenant listing for administrative use. Deliberately a
    /// separate operation: tenant scoping is never bypassed by accident.
    pub async fn find_many_across_tenants(
        &self,
        query: &ListQuery,
    ) -> Result<Page<ResourceRow>, RepositoryError> {
        let (select, count, params) = build_list_sql(self.spec, query, None)?;
        self.run_list(select, count, params, query).await
    }

    async fn run_list(
        &self,
        select: String,
        count: String,
        params: Vec<String>,
        query: &ListQuery,
    ) -> Result<Page<ResourceRow>, RepositoryError> {
        let mut count_query = sqlx::query_scalar::<_, i64>(&count);
        for param in &params {
            count_query = count_query.bind(param);
        }
        let total = count_query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| self.classify(e))?;

        let mut select_query = sqlx::query_as::<_, ResourceRow>(&select);
        for param in &params {
            select_query = select_query.bind(param);
        }
        let items = select_query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.classify(e))?;

        Ok(Page::new(items, total, query.page))
    }

    /// Partial update: merge the validated patch over the stored document
    /// and write it back. `schoolId` can never change — it is not
    /// accepted in the patch and the write stays tenant-predicated.
    pub async fn update(
        &self,
        tenant: Uuid,
        id: Uuid,
        input: &Value,
    ) -> Result<ResourceRow, RepositoryError> {
        let patch = record::validate_patch(input, self.spec)?;
        let existing = self.find_one(tenant, id).await?;
        let merged = record::apply_patch(&existing.data_object(), patch, self.spec)?;
        self.overwrite_data(tenant, id, merged).await
    }

    /// Replace the stored document wholesale. System-managed writes
    /// (attachment bookkeeping) come through here after the service has
    /// mutated the document it read.
    pub async fn overwrite_data(
        &self,
        tenant: Uuid,
        id: Uuid,
        data: Map<String, Value>,
    ) -> Result<ResourceRow, RepositoryError> {
        let sql = update_sql(self.spec.table);
        sqlx::query_as::<_, ResourceRow>(&sql)
            .bind(tenant)
            .bind(id)
            .bind(Value::Object(data))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| self.classify(e))?
            .ok_or(RepositoryError::NotFound { resource: self.spec.name })
    }

    /// Delete within the tenant, returning the deleted document so the
    /// caller can cascade attachment cleanup.
    pub async fn delete(&self, tenant: Uuid, id: Uuid) -> Result<ResourceRow, RepositoryError> {
        let sql = delete_sql(self.spec.table);
        sqlx::query_as::<_, ResourceRow>(&sql)
            .bind(tenant)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| self.classify(e))?
            .ok_or(RepositoryError::NotFound { resource: self.spec.name })
    }

    fn classify(&self, err: sqlx::Error) -> RepositoryError {
        classify_sqlx_error(err, self.spec)
    }
}

/// Map database errors into the taxonomy. Unique-index violations
/// (SQLSTATE 23505) become conflicts naming the declared key; everything
/// else stays an upstream error.
pub fn classify_sqlx_error(err: sqlx::Error, spec: &'static ResourceSpec) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if let Some(code) = db_err.code() {
            if is_unique_violation(&code) {
                return RepositoryError::UniqueViolation {
                    resource: spec.name,
                    fields: spec.unique_key.iter().map(|f| f.to_string()).collect(),
                };
            }
        }
    }
    RepositoryError::Sqlx(err)
}

pub(crate) fn is_unique_violation(code: &str) -> bool {
    code == "23505"
}

fn insert_sql(table: &str) -> String {
    format!(
        "INSERT INTO \"{table}\" (school_id, data) VALUES ($1, $2) RETURNING {ROW_COLUMNS}"
    )
}

fn select_one_sql(table: &str) -> String {
    format!("SELECT {ROW_COLUMNS} FROM \"{table}\" WHERE school_id = $1 AND id = $2")
}

fn update_sql(table: &str) -> String {
    format!(
        "UPDATE \"{table}\" SET data = $3, updated_at = now() \
         WHERE school_id = $1 AND id = $2 RETURNING {ROW_COLUMNS}"
    )
}

fn delete_sql(table: &str) -> String {
    format!(
        "DELETE FROM \"{table}\" WHERE school_id = $1 AND id = $2 RETURNING {ROW_COLUMNS}"
    )
}

/// Build the SELECT and COUNT statements for a listing. When `tenant` is
/// set, the tenant predicate is always the first condition and parameter;
/// text parameters for filter values follow.
fn build_list_sql(
    spec: &'static ResourceSpec,
    query: &ListQuery,
    tenant: Option<Uuid>,
) -> Result<(String, String, Vec<String>), QueryError> {
    let mut params: Vec<String> = Vec::new();
    let mut predicates: Vec<String> = Vec::new();

    if let Some(tenant) = tenant {
        params.push(tenant.to_string());
        predicates.push(format!("school_id = ${}::uuid", params.len()));
    }

    for condition in &query.conditions {
        predicates.push(condition.to_sql(&mut params)?);
    }

    let where_clause = if predicates.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", predicates.join(" AND "))
    };

    let sort = query
        .sort
        .clone()
        .unwrap_or_else(|| Sort::new(spec.default_sort.0, spec.default_sort.1));
    let order_clause = sort.to_sql()?;

    let select = format!(
        "SELECT {ROW_COLUMNS} FROM \"{table}\"{where_clause} {order_clause} LIMIT {limit} OFFSET {offset}",
        table = spec.table,
        limit = query.page.limit,
        offset = query.page.offset(),
    );
    let count = format!(
        "SELECT COUNT(*) FROM \"{table}\"{where_clause}",
        table = spec.table,
    );

    Ok((select, count, params))
}
