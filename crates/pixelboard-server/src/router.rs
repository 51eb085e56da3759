//! Route table and middleware stack.

use std::sync::Arc;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::captcha::CaptchaVerifier;
use crate::error;
use crate::handlers;
use crate::sse;
use crate::state::AppState;
use crate::trace;

/// Build the application router.
///
/// Routes:
/// - `GET /tile` -- single pixel read
/// - `POST /tile` -- place one pixel
/// - `GET /group` -- raw group blob
/// - `GET /tiles` -- placement history for one day
/// - `GET /draw/events` -- live draw stream (SSE)
///
/// Static assets are the binary's concern; it attaches a fallback service
/// for them. CORS is wide open: the canvas is consumed cross-origin.
pub fn build_router<V: CaptchaVerifier>(state: Arc<AppState<V>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/tile",
            get(handlers::get_tile::<V>).post(handlers::post_tile::<V>),
        )
        .route("/group", get(handlers::get_group::<V>))
        .route("/tiles", get(handlers::get_tiles::<V>))
        .route("/draw/events", get(sse::draw_events::<V>))
        .layer(middleware::from_fn(trace::trace_middleware))
        .layer(CatchPanicLayer::custom(error::handle_panic))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
