use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use politecrawl_scheduler::metrics;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use super::state::ServeState;

pub const NO_CRAWLER_BODY: &str = "No crawler registered for given name";
pub const CRAWL_FAILED_BODY: &str = "Error during crawl";

/// Crawlers under `public_base`, static files (if configured) everywhere else.
pub fn build_router(state: ServeState) -> Router {
    let crawl_route = format!("{}/:name", state.public_base);
    let router = Router::new()
        .route("/health", get(health_handler))
        .route(&crawl_route, get(crawl_handler));
    let router = match &state.static_root {
        Some(root) => router.fallback_service(ServeDir::new(root)),
        None => router.fallback(|| async { StatusCode::NOT_FOUND }),
    };
    router.layer(cors_layer()).with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
}

async fn health_handler() -> impl IntoResponse {
    let counters = metrics::snapshot();
    Json(json!({
        "status": "ok",
        "tasks": {
            "enqueued": counters.enqueued,
            "started": counters.started,
            "completed": counters.completed,
            "failed": counters.failed,
        }
    }))
}

async fn crawl_handler(State(state): State<ServeState>, Path(name): Path<String>) -> Response {
    let request = match state.catalog.request(&name).await {
        Ok(Some(request)) => request,
        Ok(None) => {
            info!(crawler = %name, "no crawler registered");
            return (StatusCode::NOT_FOUND, NO_CRAWLER_BODY).into_response();
        }
        Err(err) => {
            error!(crawler = %name, error = %format!("{err:#}"), "failed to load crawler");
            return (StatusCode::INTERNAL_SERVER_ERROR, CRAWL_FAILED_BODY).into_response();
        }
    };

    info!(crawler = %name, url = %request.url, "crawl requested");
    match state.dispatcher.crawl(request).await {
        Ok(value) => Json(value).into_response(),
        Err(err) => {
            warn!(crawler = %name, error = %err, "crawl failed");
            (StatusCode::INTERNAL_SERVER_ERROR, CRAWL_FAILED_BODY).into_response()
        }
    }
}
