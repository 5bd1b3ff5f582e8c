use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
};
use sqlx::SqlitePool;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::notify::{LogNotifier, Notifier, WebhookNotifier};
use crate::routes::{auth_routes, comments_routes, posts_routes, users_routes};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config) -> anyhow::Result<Self> {
        let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
            Some(url) => {
                tracing::info!(%url, "relaying notifications to webhook");
                Arc::new(WebhookNotifier::new(
                    url.clone(),
                    Duration::from_secs(config.notify_timeout_secs),
                )?)
            }
            None => Arc::new(LogNotifier),
        };
        Ok(Self {
            pool,
            config: Arc::new(config),
            notifier,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .nest("/api/auth", auth_routes())
        .nest("/api/users", users_routes())
        .nest("/api/posts", posts_routes())
        .nest("/api/posts", comments_routes())
        .route("/api/health", get(health_check));

    let assets = state.config.frontend_dist.join("assets");

    Router::new()
        .merge(api_routes)
        .nest_service("/assets", ServeDir::new(assets))
        .fallback(serve_spa)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({"status": "healthy"}))
}

async fn serve_spa(State(state): State<AppState>) -> impl IntoResponse {
    let index_path = state.config.frontend_dist.join("index.html");

    match tokio::fs::read_to_string(&index_path).await {
        Ok(html) => Html(html).into_response(),
        Err(_) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "Welcome to the Blogger API",
                "docs": "Frontend bundle not built"
            })),
        )
            .into_response(),
    }
}
