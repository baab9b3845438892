use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use isles_protocol::{routes, ErrorBody, Game, Island, ListResponse, SESSION_HEADER};
use serde::Deserialize;
use std::net::IpAddr;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

pub mod store;

pub use store::RecordStore;

#[derive(Clone)]
pub struct AppState {
    pub store: RecordStore,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorBody::new(message)))
}

fn internal(err: anyhow::Error) -> ApiError {
    tracing::error!(error = %format!("{err:#}"), "record store failure");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}

fn require_name(name: &str) -> Result<&str, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "name is required"));
    }
    Ok(name)
}

/// The session token sent with the request, if any.
fn session_owner(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn build_router(state: AppState) -> Router {
    let game_record = format!("{}/{{id}}", routes::GAMES);
    let island_record = format!("{}/{{id}}", routes::ISLANDS);
    Router::new()
        .route("/health", get(health))
        .route(routes::GAMES, get(api_games_list).post(api_games_create))
        .route(&game_record, put(api_games_update).delete(api_games_delete))
        .route(
            routes::ISLANDS,
            get(api_islands_list).post(api_islands_create),
        )
        .route(
            &island_record,
            put(api_islands_update).delete(api_islands_delete),
        )
        .with_state(Arc::new(state))
        // Local security: allow only loopback + Tailscale by default.
        .layer(middleware::from_fn(ip_allowlist))
        // Never use `Access-Control-Allow-Origin: *`: records are scoped by a
        // session token any page could otherwise replay from the browser.
        .layer(local_only_cors())
}

async fn health() -> &'static str {
    "ok"
}

async fn api_games_list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ListResponse<Game>>, ApiError> {
    let owner = session_owner(&headers);
    let results = state
        .store
        .list_games(owner.as_deref())
        .map_err(internal)?;
    Ok(Json(ListResponse { results }))
}

async fn api_games_create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(draft): Json<Game>,
) -> Result<(StatusCode, Json<Game>), ApiError> {
    let name = require_name(&draft.name)?;
    let owner = session_owner(&headers);
    let game = state
        .store
        .create_game(owner.as_deref(), name, &draft.islands)
        .map_err(internal)?;
    tracing::info!(game = ?game.object_id, "game created");
    Ok((StatusCode::CREATED, Json(game)))
}

async fn api_games_update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(game): Json<Game>,
) -> Result<Json<Game>, ApiError> {
    let name = require_name(&game.name)?;
    let owner = session_owner(&headers);
    state
        .store
        .update_game(owner.as_deref(), &id, name, &game.islands)
        .map_err(internal)?
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("game {id} not found")))
}

async fn api_games_delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let owner = session_owner(&headers);
    if state
        .store
        .delete_game(owner.as_deref(), &id)
        .map_err(internal)?
    {
        tracing::info!(game = %id, "game deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(api_error(StatusCode::NOT_FOUND, format!("game {id} not found")))
    }
}

#[derive(Debug, Deserialize)]
struct IslandQuery {
    game: String,
}

async fn api_islands_list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IslandQuery>,
    headers: HeaderMap,
) -> Result<Json<ListResponse<Island>>, ApiError> {
    let owner = session_owner(&headers);
    let results = state
        .store
        .list_islands(owner.as_deref(), &query.game)
        .map_err(internal)?;
    Ok(Json(ListResponse { results }))
}

async fn api_islands_create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(draft): Json<Island>,
) -> Result<(StatusCode, Json<Island>), ApiError> {
    let name = require_name(&draft.name)?;
    let owner = session_owner(&headers);
    let island = state
        .store
        .create_island(owner.as_deref(), &draft.game, name)
        .map_err(internal)?
        .ok_or_else(|| {
            api_error(
                StatusCode::BAD_REQUEST,
                format!("unknown game {}", draft.game),
            )
        })?;
    tracing::info!(island = ?island.object_id, game = %island.game, "island created");
    Ok((StatusCode::CREATED, Json(island)))
}

async fn api_islands_update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(island): Json<Island>,
) -> Result<Json<Island>, ApiError> {
    let name = require_name(&island.name)?;
    let owner = session_owner(&headers);
    state
        .store
        .update_island(owner.as_deref(), &id, name)
        .map_err(internal)?
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("island {id} not found")))
}

async fn api_islands_delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let owner = session_owner(&headers);
    if state
        .store
        .delete_island(owner.as_deref(), &id)
        .map_err(internal)?
    {
        tracing::info!(island = %id, "island deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(api_error(
            StatusCode::NOT_FOUND,
            format!("island {id} not found"),
        ))
    }
}

pub async fn serve(
    addr: SocketAddr,
    db_path: PathBuf,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, db = %db_path.display(), "record server listening");
    serve_listener(listener, db_path, shutdown).await?;
    Ok(())
}

pub async fn serve_listener(
    listener: tokio::net::TcpListener,
    db_path: PathBuf,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<SocketAddr> {
    let state = AppState {
        store: RecordStore::new(db_path),
    };
    // Fail fast on an unusable database instead of on the first request.
    state.store.open()?;
    let app = build_router(state);
    let addr = listener.local_addr()?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    Ok(addr)
}

async fn ip_allowlist(
    axum::extract::ConnectInfo(peer): axum::extract::ConnectInfo<SocketAddr>,
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let ip = peer.ip();
    if is_allowed_peer_ip(ip) {
        return next.run(req).await;
    }
    tracing::warn!(%ip, "rejected peer outside allowlist");
    (StatusCode::FORBIDDEN, "forbidden").into_response()
}

fn is_allowed_peer_ip(ip: IpAddr) -> bool {
    if ip.is_loopback() {
        return true;
    }

    // Tailscale CGNAT range (100.64.0.0/10).
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            o[0] == 100 && (64..=127).contains(&o[1])
        }
        IpAddr::V6(_v6) => false,
    }
}

fn local_only_cors() -> CorsLayer {
    use axum::http::header;
    use axum::http::HeaderName;
    use axum::http::HeaderValue;
    use axum::http::Method;

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(SESSION_HEADER)])
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _req| {
            is_allowed_local_origin(origin)
        }))
}

fn is_allowed_local_origin(origin: &axum::http::HeaderValue) -> bool {
    let Ok(s) = origin.to_str() else {
        return false;
    };
    is_http_origin_for_host(s, "localhost") || is_http_origin_for_host(s, "127.0.0.1")
}

fn is_http_origin_for_host(origin: &str, host: &str) -> bool {
    for scheme in ["http://", "https://"] {
        if let Some(rest) = origin.strip_prefix(scheme) {
            if let Some(after) = rest.strip_prefix(host) {
                // Origin is just scheme://host[:port]
                return after.is_empty() || after.starts_with(':');
            }
        }
    }
    false
}

#[cfg(test)]
mod tests;
