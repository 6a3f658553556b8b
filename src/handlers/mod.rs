use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::{Extension, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::storage::{ObjectGateway, SharedGateway};

pub mod attachments;
pub mod auth;
pub mod resources;

/// Build the application router. Everything under /api is resolved
/// against the resource registry and sits behind JWT authentication;
/// auth endpoints and the service card are public.
pub fn app(gateway: Arc<dyn ObjectGateway>) -> Router {
    let protected = Router::new()
        .route(
            "/api/:resource",
            get(resources::list).post(resources::create),
        )
        .route("/api/:resource/all-unfiltered", get(resources::list_unfiltered))
        .route(
            "/api/:resource/:id",
            get(resources::show)
                .put(resources::update)
                .delete(resources::destroy),
        )
        .route("/api/:resource/:id/attachments", post(attachments::add))
        .route(
            "/api/:resource/:id/attachments/:attachment_id",
            delete(attachments::remove),
        )
        .layer(axum::middleware::from_fn(
            crate::middleware::jwt_auth_middleware,
        ));

    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .merge(protected)
        // Global middleware
        .layer(Extension(SharedGateway(gateway)))
        .layer(DefaultBodyLimit::max(
            crate::config::config().api.max_request_size_bytes,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind and run the server. Port resolution: explicit override, then
/// CAMPUS_API_PORT / PORT env vars, then 3000.
pub async fn serve(port_override: Option<u16>) -> anyhow::Result<()> {
    let gateway: Arc<dyn ObjectGateway> = Arc::new(crate::storage::RemoteStore::s3_from_env()?);
    let app = app(gateway);

    let port = port_override
        .or_else(|| {
            std::env::var("CAMPUS_API_PORT")
                .ok()
                .or_else(|| std::env::var("PORT").ok())
                .and_then(|s| s.parse::<u16>().ok())
        })
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Campus API listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "Campus API (Rust)",
            "version": version,
            "description": "Multi-tenant school administration backend built with Rust (Axum)",
            "endpoints": {
                "home": "/ (public)",
                "auth": "/auth/register, /auth/login (public - token acquisition)",
                "resources": "/api/:resource[/:id] (protected, tenant-scoped)",
                "attachments": "/api/:resource/:id/attachments[/:attachment_id] (protected)",
                "admin": "/api/:resource/all-unfiltered (protected, root role)",
            },
            "resources": crate::registry::RESOURCES.iter().map(|s| s.name).collect::<Vec<_>>(),
        }
    }))
}

async fn health() -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match crate::database::manager::DatabaseManager::health_check().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
