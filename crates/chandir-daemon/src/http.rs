use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
    routing::{delete, get, post},
    Router,
};
use chandir_core::{DirectoryEvent, DirectoryManager, Record, RecordId};
use chrono::{DateTime, Utc};
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

#[derive(Clone)]
struct HttpState {
    manager: Arc<DirectoryManager>,
}

#[derive(Serialize)]
struct ApiState {
    rev: u64,
    loading: bool,
    error: Option<String>,
    search_term: String,
    last_refreshed: Option<DateTime<Utc>>,
    selected: Option<Record>,
    /// Size of the whole directory, before filtering.
    total: usize,
    channels: Vec<Record>,
}

#[derive(Deserialize)]
struct RefreshParams {
    url: Option<String>,
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

pub fn router(manager: Arc<DirectoryManager>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/refresh", post(refresh))
        .route("/api/search", get(search).post(search))
        .route("/api/select/:id", post(select))
        .route("/api/cache", delete(clear_cache))
        .route("/api/events", get(events))
        .layer(cors)
        .with_state(HttpState { manager })
}

pub async fn serve(
    bind_address: String,
    port: u16,
    manager: Arc<DirectoryManager>,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", bind_address, port);
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        error!("Failed to bind HTTP server to {}: {}", addr, e);
        e
    })?;

    info!("HTTP API server listening on http://{}", addr);
    eprintln!("chandir: serving on http://{}", addr);

    axum::serve(listener, router(manager)).await?;
    Ok(())
}

async fn get_state(State(state): State<HttpState>) -> Json<ApiState> {
    let snapshot = state.manager.snapshot().await;

    Json(ApiState {
        rev: snapshot.rev,
        loading: snapshot.is_loading(),
        error: snapshot.error().map(str::to_string),
        search_term: snapshot.search_term.clone(),
        last_refreshed: snapshot.last_refreshed,
        selected: snapshot.selected_record().cloned(),
        total: snapshot.records.len(),
        channels: snapshot.visible(),
    })
}

async fn refresh(
    State(state): State<HttpState>,
    Query(params): Query<RefreshParams>,
) -> StatusCode {
    info!(
        "HTTP API: Refresh from {}",
        params.url.as_deref().unwrap_or("default source")
    );
    let _task = state.manager.spawn_refresh(params.url);
    StatusCode::ACCEPTED
}

async fn search(
    State(state): State<HttpState>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<Record>> {
    info!("HTTP API: Search {:?}", params.q);
    state.manager.set_search_term(params.q).await;
    Json(state.manager.visible().await)
}

async fn select(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<Json<Record>, StatusCode> {
    let id: RecordId = id.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
    info!("HTTP API: Select {}", id);
    state
        .manager
        .select(id)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn clear_cache(State(state): State<HttpState>) -> StatusCode {
    info!("HTTP API: Clear cache");
    state.manager.clear_cache().await;
    StatusCode::NO_CONTENT
}

/// Server-sent `state` events carrying the new revision.
async fn events(
    State(state): State<HttpState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.manager.subscribe();
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(DirectoryEvent::StateUpdated { rev }) => {
                    let event = Event::default().event("state").data(rev.to_string());
                    return Some((Ok(event), rx));
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
