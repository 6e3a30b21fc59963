use crate::cache;
use crate::models::{MediaKind, TitleDetailResponse};
use crate::ratings::{RatingsApi, RatingsClient};
use crate::store::Store;
use crate::tmdb::{TmdbApi, TmdbClient};
use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{env, net::SocketAddr, sync::Arc};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DATABASE_URL: &str = "sqlite:data/cinedex.db";

#[derive(Clone)]
pub struct AppState {
    pub tmdb: Arc<dyn TmdbApi>,
    pub ratings: Arc<dyn RatingsApi>,
    pub store: Store,
}

pub async fn run_server() -> Result<()> {
    let tmdb: Arc<dyn TmdbApi> = Arc::new(TmdbClient::from_env()?);
    let ratings: Arc<dyn RatingsApi> = Arc::new(RatingsClient::from_env()?);

    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
    let store = Store::connect(&database_url).await?;
    info!("Database ready at {}", database_url);

    let state = AppState {
        tmdb,
        ratings,
        store,
    };

    let app = build_router(state);

    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/search", get(handle_search))
        .route("/movie/:id", get(handle_detail))
        .route("/health", get(health))
        .fallback_service(ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> (StatusCode, Json<Value>) {
    let query = match params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => q.to_string(),
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"success": false, "error": "query parameter 'q' is required"})),
            )
        }
    };

    match state.tmdb.search_multi(&query).await {
        Ok(results) => {
            let total = results.len();
            (
                StatusCode::OK,
                Json(json!({"success": true, "results": results, "total": total})),
            )
        }
        Err(e) => {
            error!("Search for '{}' failed: {:#}", query, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "failed to search titles"})),
            )
        }
    }
}

#[derive(Deserialize)]
struct DetailParams {
    #[serde(rename = "type")]
    kind: Option<String>,
}

async fn handle_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<DetailParams>,
) -> (StatusCode, Json<Value>) {
    let tmdb_id: i64 = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"success": false, "error": "id must be numeric"})),
            )
        }
    };
    let kind = match params.kind.as_deref() {
        None => MediaKind::Movie,
        Some(raw) => match raw.parse() {
            Ok(kind) => kind,
            Err(_) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"success": false, "error": "type must be 'movie' or 'tv'"})),
                )
            }
        },
    };

    match cache::get_or_fetch(&state.store, &state.tmdb, &state.ratings, tmdb_id, kind).await {
        Ok(title) => (
            StatusCode::OK,
            Json(json!({"success": true, "movie": TitleDetailResponse::from(title)})),
        ),
        Err(e) => {
            error!("Detail lookup for {} {} failed: {:#}", kind, tmdb_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "failed to load title details"})),
            )
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        term.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
