//! HTTP routes around the lobby socket: lobby creation, static pages and file serving

use axum::{
    extract::{Request, State},
    http::{StatusCode, Uri},
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower::{ServiceBuilder, ServiceExt};
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::auth;
use crate::state::AppState;
use crate::ws;

/// Create a fresh lobby and send the browser into it.
///
/// GET /startlobby
pub async fn start_lobby(State(state): State<Arc<AppState>>) -> Redirect {
    let lobby_id = state.start_lobby().await;
    Redirect::to(&format!("/lobby/?id={}", lobby_id))
}

/// Rewrite a legacy prefix onto its replacement, keeping the rest of the path and query
fn rewrite_prefix(uri: &Uri, from: &str, to: &str) -> String {
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let rest = path_and_query.strip_prefix(from).unwrap_or(path_and_query);
    format!("{}{}", to, rest)
}

/// GET /lobby/* serves the frontend; the bare /lobby path is the socket
pub async fn lobby_frontend(State(state): State<Arc<AppState>>, mut request: Request) -> Response {
    let rest = rewrite_prefix(request.uri(), "/lobby", "");
    let Ok(uri) = rest.parse::<Uri>() else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    *request.uri_mut() = uri;

    match ServeDir::new(&state.config.frontend_dir)
        .oneshot(request)
        .await
    {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

/// GET /deposed/* (deprecated, now /public)
pub async fn legacy_deposed(uri: Uri) -> Redirect {
    tracing::info!("Request made to deprecated deposed route");
    Redirect::to(&rewrite_prefix(&uri, "/deposed", "/public"))
}

/// GET /elevated/* (deprecated, now /private)
pub async fn legacy_elevated(uri: Uri) -> Redirect {
    tracing::info!("Request made to deprecated elevated route");
    Redirect::to(&rewrite_prefix(&uri, "/elevated", "/private"))
}

/// Build the full application router
pub fn router(state: Arc<AppState>) -> Router {
    let config = state.config.clone();

    // CORS only covers the file routes and their legacy redirects
    let public_files = ServiceBuilder::new()
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(auth::public_log_middleware))
        .service(ServeDir::new(&config.public_dir));

    let private_files = ServiceBuilder::new()
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::private_access_middleware,
        ))
        .service(ServeDir::new(&config.private_dir));

    let legacy = Router::new()
        .route("/deposed", get(legacy_deposed))
        .route("/deposed/{*rest}", get(legacy_deposed))
        .route("/elevated", get(legacy_elevated))
        .route("/elevated/{*rest}", get(legacy_elevated))
        .layer(CorsLayer::permissive());

    Router::new()
        .route_service("/", ServeFile::new(&config.home_page))
        .route("/startlobby", get(start_lobby))
        .route("/lobby", get(ws::ws_handler))
        .route("/lobby/", get(lobby_frontend))
        .route("/lobby/{*path}", get(lobby_frontend))
        .nest_service("/public", public_files)
        .nest_service("/private", private_files)
        .merge(legacy)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
