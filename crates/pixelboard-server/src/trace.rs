//! Per-request trace ids.
//!
//! Every request carries a trace id: the inbound `trace` header when
//! present, otherwise a fresh UUID. The id is stored in request extensions
//! for handlers that hand work to background jobs, and a tracing span wraps
//! the rest of the request so every downstream log line carries it.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// Header clients may use to supply their own trace id.
pub const TRACE_HEADER: &str = "trace";

/// The request's trace id, available via `Extension<RequestTrace>`.
#[derive(Debug, Clone)]
pub struct RequestTrace(pub String);

/// Middleware attaching the trace id and its logging span.
pub async fn trace_middleware(mut request: Request, next: Next) -> Response {
    let trace = request
        .headers()
        .get(TRACE_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = info_span!(
        "request",
        trace = %trace,
        method = %request.method(),
        path = %request.uri().path(),
    );

    request.extensions_mut().insert(RequestTrace(trace));

    async move {
        info!("handling http request");
        next.run(request).await
    }
    .instrument(span)
    .await
}
