pub mod admin_service;
pub mod resource_service;

pub use admin_service::AdminService;
pub use resource_service::ResourceService;
