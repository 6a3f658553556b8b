use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{self, Claims};
use crate::config;
use crate::error::ApiError;

/// Super-admin account. One admin administers one school; the school id
/// minted at registration is the tenant key for everything the admin
/// later creates.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SuperAdmin {
    pub id: Uuid,
    pub school_id: Uuid,
    pub name: String,
    pub email: String,
    pub password_digest: String,
    pub salt: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SuperAdmin {
    /// API shape; credentials never leave the service.
    pub fn to_api_value(&self) -> Value {
        json!({
            "id": self.id,
            "schoolId": self.school_id,
            "name": self.name,
            "email": self.email,
            "role": self.role,
            "createdAt": self.created_at,
            "updatedAt": self.updated_at,
        })
    }
}

pub struct AdminService {
    pool: PgPool,
}

impl AdminService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Register a super admin, provisioning a fresh school (tenant) id.
    /// Returns the account plus a signed token for immediate use.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: &str,
    ) -> Result<(SuperAdmin, String), ApiError> {
        if name.trim().is_empty() {
            return Err(ApiError::validation_field("Missing required field: name", "name"));
        }
        if email.trim().is_empty() || !email.contains('@') {
            return Err(ApiError::validation_field("Invalid email address", "email"));
        }
        if password.len() < 8 {
            return Err(ApiError::validation_field(
                "Password must be at least 8 characters",
                "password",
            ));
        }

        let salt = auth::make_salt();
        let digest = auth::digest_password(&salt, password);
        let school_id = Uuid::new_v4();

        let admin = sqlx::query_as::<_, SuperAdmin>(
            "INSERT INTO super_admins (school_id, name, email, password_digest, salt, role) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, school_id, name, email, password_digest, salt, role, created_at, updated_at",
        )
        .bind(school_id)
        .bind(name.trim())
        .bind(email.trim().to_ascii_lowercase())
        .bind(&digest)
        .bind(&salt)
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .map_err(classify_register_error)?;

        let token = self.issue_token(&admin)?;
        Ok((admin, token))
    }

    /// Verify credentials and issue a token carrying the tenant id.
    pub async fn login(&self, email: &str, password: &str) -> Result<(SuperAdmin, String), ApiError> {
        let admin = sqlx::query_as::<_, SuperAdmin>(
            "SELECT id, school_id, name, email, password_digest, salt, role, created_at, updated_at \
             FROM super_admins WHERE email = $1",
        )
        .bind(email.trim().to_ascii_lowercase())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("super admin lookup failed: {}", e);
            ApiError::upstream("An error occurred while processing your request")
        })?;

        // Deliberately the same failure for unknown email and bad password
        let admin = admin.ok_or_else(invalid_credentials)?;
        if !auth::verify_password(&admin.salt, password, &admin.password_digest) {
            return Err(invalid_credentials());
        }

        let token = self.issue_token(&admin)?;
        Ok((admin, token))
    }

    fn issue_token(&self, admin: &SuperAdmin) -> Result<String, ApiError> {
        let claims = Claims::new(
            admin.id,
            admin.email.clone(),
            admin.school_id,
            admin.role.clone(),
        );
        let secret = &config::config().security.jwt_secret;
        Ok(auth::generate_token(&claims, secret)?)
    }
}

fn invalid_credentials() -> ApiError {
    ApiError::unauthorized("Invalid email or password")
}

fn classify_register_error(err: sqlx::Error) -> ApiError {
    if let sqlx::Error::Database(db_err) = &err {
        if let Some(code) = db_err.code() {
            if crate::database::repository::is_unique_violation(&code) {
                return ApiError::conflict(
                    "A super admin with this email already exists",
                    vec!["email".to_string()],
                );
            }
        }
    }
    tracing::error!("super admin insert failed: {}", err);
    ApiError::upstream("An error occurred while processing your request")
}
