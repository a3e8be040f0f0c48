//! Access gating and request logging for file routes
//!
//! Private files require an access key. The key is taken from the lobby the
//! request came from (the `id=` in the Referer) or from a `?key=` parameter,
//! and must be unexpired with an allowed pattern matching the path.

use axum::{
    body::Body,
    extract::{ConnectInfo, Query, State},
    http::{header, Request, Response, StatusCode},
    middleware::Next,
};
use regex::Regex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, LazyLock};

use crate::access;
use crate::state::AppState;
use crate::types::now_millis;

static REFERER_LOBBY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"id=([0123456789ABCDEF]+)").expect("referer pattern is valid")
});

/// Percent-decoded query parameter; empty values count as absent
fn query_param(request: &Request<Body>, key: &str) -> Option<String> {
    let Query(mut params) = Query::<HashMap<String, String>>::try_from_uri(request.uri()).ok()?;
    params.remove(key).filter(|v| !v.is_empty())
}

/// Lobby id embedded in the Referer, if the request came from a lobby page
fn referer_lobby_id(request: &Request<Body>) -> Option<String> {
    let referer = request.headers().get(header::REFERER)?.to_str().ok()?;
    REFERER_LOBBY
        .captures(referer)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Pick the access key for a private file request: the referring lobby's key first
async fn resolve_access_key(
    state: &AppState,
    referer_lobby: Option<String>,
    query_key: Option<String>,
) -> Option<String> {
    if let Some(lobby_id) = referer_lobby {
        if let Some(key) = state.elevated_key(&lobby_id).await {
            return Some(key);
        }
    }
    query_key
}

fn log_file_request(kind: &str, request: &Request<Body>) {
    let from = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    tracing::info!(
        at = %chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        from = %from,
        to = %request.uri().path(),
        "Request made to {} file",
        kind
    );
}

fn forbidden() -> Response<Body> {
    Response::builder()
        .status(StatusCode::FORBIDDEN)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("403 Forbidden"))
        .unwrap_or_default()
}

/// Middleware logging requests to public files
pub async fn public_log_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    log_file_request("public", &request);
    next.run(request).await
}

/// Middleware gating private files behind an access key
pub async fn private_access_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    log_file_request("private", &request);

    // The request body is not Sync, so nothing borrowed from the request may live across an await
    let path = request.uri().path().to_string();
    let referer_lobby = referer_lobby_id(&request);
    let query_key = query_param(&request, "key");

    if let Some(key) = resolve_access_key(&state, referer_lobby, query_key).await {
        if access::can_access_path(state.access.as_ref(), &key, &path, now_millis()).await {
            tracing::info!(path = %path, "Serving private file");
            return next.run(request).await;
        }
    }

    tracing::info!(path = %path, "Serving 403");
    forbidden()
}
