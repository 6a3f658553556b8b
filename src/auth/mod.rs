use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Super-admin role names. `root` additionally unlocks the cross-tenant
/// listing endpoints.
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_ROOT: &str = "root";

/// JWT claims for an authenticated super admin. The tenant id travels
/// here and only here; request bodies never carry it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub admin_id: Uuid,
    pub email: String,
    pub school_id: Uuid,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(admin_id: Uuid, email: String, school_id: Uuid, role: String) -> Self {
        let now = Utc::now();
        let expiry_hours = crate::config::config().security.jwt_expiry_hours;
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            admin_id,
            email,
            school_id,
            role,
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),

    #[error("JWT secret not configured")]
    InvalidSecret,
}

pub fn generate_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }
    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key)
        .map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let data = decode::<Claims>(token, &decoding_key, &Validation::default())
        .map_err(|e| JwtError::InvalidToken(e.to_string()))?;
    Ok(data.claims)
}

/// Password seam. Salted SHA-256 digests keep the storage format simple;
/// the scheme is isolated here so it can be swapped without touching the
/// admin service.
pub fn make_salt() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn digest_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn verify_password(salt: &str, password: &str, digest: &str) -> bool {
    digest_password(salt, password) == digest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_claims() {
        let claims = Claims {
            admin_id: Uuid::new_v4(),
            email: "head@school.test".to_string(),
            school_id: Uuid::new_v4(),
            role: ROLE_ADMIN.to_string(),
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
            iat: Utc::now().timestamp(),
        };

        let token = generate_token(&claims, "test-secret").unwrap();
        let decoded = verify_token(&token, "test-secret").unwrap();
        assert_eq!(decoded.admin_id, claims.admin_id);
        assert_eq!(decoded.school_id, claims.school_id);
        assert_eq!(decoded.role, ROLE_ADMIN);
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let claims = Claims {
            admin_id: Uuid::new_v4(),
            email: "head@school.test".to_string(),
            school_id: Uuid::new_v4(),
            role: ROLE_ADMIN.to_string(),
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
            iat: Utc::now().timestamp(),
        };

        let token = generate_token(&claims, "secret-a").unwrap();
        assert!(matches!(
            verify_token(&token, "secret-b"),
            Err(JwtError::InvalidToken(_))
        ));
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(matches!(
            verify_token("whatever", ""),
            Err(JwtError::InvalidSecret)
        ));
    }

    #[test]
    fn password_digest_depends_on_salt() {
        let digest_a = digest_password("salt-a", "hunter2");
        let digest_b = digest_password("salt-b", "hunter2");
        assert_ne!(digest_a, digest_b);
        assert!(verify_password("salt-a", "hunter2", &digest_a));
        assert!(!verify_password("salt-a", "wrong", &digest_a));
    }
}
