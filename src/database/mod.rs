pub mod manager;
pub mod record;
pub mod repository;
pub mod schema;

pub use manager::{DatabaseError, DatabaseManager};
pub use record::ResourceRow;
pub use repository::{RepositoryError, TenantRepository};
pub use schema::{AttachmentPolicy, EnumField, ResourceSpec};
