//! Route handlers for reads and placements.
//!
//! Read coherence policy: single-pixel reads and history go straight to
//! the store (a per-pixel cache would be pointless next to the group
//! cache); group reads are cache-aside with an asynchronous warm on miss.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use pixelboard_types::{Draw, Rgba, Tile, TileGroup};
use serde::Deserialize;
use tracing::{debug, info};

use crate::captcha::CaptchaVerifier;
use crate::error::ApiError;
use crate::jobs::Job;
use crate::pipeline;
use crate::state::AppState;
use crate::trace::RequestTrace;

/// Header carrying the CAPTCHA token on placements.
pub const RECAPTCHA_TOKEN_HEADER: &str = "X-Recaptcha-Request-Token";

// ---------------------------------------------------------------------------
// Query and body shapes
// ---------------------------------------------------------------------------

/// Raw coordinate query parameters, validated by [`parse_point`].
#[derive(Debug, Deserialize)]
pub struct PointQuery {
    x: Option<String>,
    y: Option<String>,
}

/// Query parameters for the history endpoint.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    after: Option<String>,
}

/// Body of a placement request.
#[derive(Debug, Deserialize)]
struct PostTileBody {
    x: i32,
    y: i32,
    rgb: Vec<u8>,
}

/// Parse `x` and `y` with explicit messages rather than extractor
/// rejections, so malformed input still gets the standard envelope.
fn parse_point(query: &PointQuery) -> Result<(i32, i32), ApiError> {
    let parse = |name: &str, value: Option<&str>| -> Result<i32, ApiError> {
        let raw = value.unwrap_or("");
        raw.parse().map_err(|_| {
            ApiError::BadInput(format!("{name} must be an integer, got {raw}"))
        })
    };
    Ok((
        parse("x", query.x.as_deref())?,
        parse("y", query.y.as_deref())?,
    ))
}

/// Resolve the client IP: `X-Forwarded-For` (first token), then
/// `X-Real-IP`, then the connection peer.
fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> Option<IpAddr> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        // May list several hops: client, proxy1, proxy2, ...
        let first = forwarded.split(',').next().unwrap_or("").trim();
        if !first.is_empty() {
            return first.parse().ok();
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let trimmed = real_ip.trim();
        if !trimmed.is_empty() {
            return trimmed.parse().ok();
        }
    }
    Some(peer.ip())
}

// ---------------------------------------------------------------------------
// GET /tile -- single pixel, store only
// ---------------------------------------------------------------------------

/// Read one pixel's current color and last placement time.
pub async fn get_tile<V: CaptchaVerifier>(
    State(state): State<Arc<AppState<V>>>,
    Query(query): Query<PointQuery>,
) -> Result<Json<Tile>, ApiError> {
    let (x, y) = parse_point(&query)?;
    info!(x, y, "handling get tile");

    let tile = state.tile_store().get_one_pixel(x, y).await?;
    Ok(Json(tile))
}

// ---------------------------------------------------------------------------
// GET /group -- group blob, cache-aside
// ---------------------------------------------------------------------------

/// Read the raw blob of the group owning `(x, y)`.
///
/// Cache hit returns the cached bytes; a miss rebuilds the blob from the
/// store, returns it, and warms the cache in the background. A cached
/// value with a bad length surfaces as a 500 and is left in place for
/// inspection.
pub async fn get_group<V: CaptchaVerifier>(
    State(state): State<Arc<AppState<V>>>,
    Extension(trace): Extension<RequestTrace>,
    Query(query): Query<PointQuery>,
) -> Result<Response, ApiError> {
    let (x, y) = parse_point(&query)?;
    let key = state.grid().key_for(x, y);
    info!(x, y, key = %key, "handling get group");

    if let Some(group) = state.cache.get_group(key).await? {
        return Ok(octets(group.into_bytes()));
    }

    info!(key = %key, "group not cached, rebuilding from store");
    let rows = state.tile_store().group_rows(key).await?;

    let grid = state.grid();
    let mut group = TileGroup::new();
    for row in &rows {
        group.set_at(grid, row.x, row.y, row.rgb());
    }

    if !group.is_empty() {
        // Best-effort: a full queue skips the warm, it never fails the read.
        if let Err(err) = state.jobs.enqueue(Job::WarmGroup {
            key,
            group: group.clone(),
            trace: trace.0.clone(),
        }) {
            debug!(key = %key, error = %err, "skipping cache warm");
        }
    }

    Ok(octets(group.into_bytes()))
}

fn octets(bytes: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "application/octet-stream")],
        bytes,
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// GET /tiles -- placement history, store only
// ---------------------------------------------------------------------------

/// Read the placement history for the day of `after` (default: now).
pub async fn get_tiles<V: CaptchaVerifier>(
    State(state): State<Arc<AppState<V>>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Tile>>, ApiError> {
    let after = match query.after.as_deref() {
        Some(raw) if !raw.is_empty() => DateTime::parse_from_rfc3339(raw)
            .map_err(|_| {
                ApiError::BadInput(format!(
                    "after must be a valid RFC3339 timestamp, got {raw}"
                ))
            })?
            .with_timezone(&Utc),
        _ => Utc::now(),
    };
    info!(after = %after, "handling get tiles");

    let tiles = state.tile_store().history(after).await?;
    Ok(Json(tiles))
}

// ---------------------------------------------------------------------------
// POST /tile -- place one pixel
// ---------------------------------------------------------------------------

/// Place one pixel, subject to CAPTCHA admission and the cooldown.
pub async fn post_tile<V: CaptchaVerifier>(
    State(state): State<Arc<AppState<V>>>,
    Extension(trace): Extension<RequestTrace>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let token = headers
        .get(RECAPTCHA_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let body: PostTileBody = serde_json::from_slice(&body).map_err(|_| {
        ApiError::BadInput(String::from(
            "failed to deserialize request body, expected {x, y, rgb}",
        ))
    })?;
    if body.rgb.len() != 3 {
        return Err(ApiError::BadInput(format!(
            "rgb color tuple must be of length 3, was {}",
            body.rgb.len()
        )));
    }

    let draw = Draw {
        x: body.x,
        y: body.y,
        rgb: Rgba::opaque(body.rgb[0], body.rgb[1], body.rgb[2]),
    };

    let ip = client_ip(&headers, peer)
        .ok_or_else(|| ApiError::BadInput(String::from("ip must be a valid IP address")))?;

    info!(x = draw.x, y = draw.y, ip = %ip, "handling post tile");

    pipeline::place_tile(&state, draw, token, ip, &trace).await?;
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                axum::http::HeaderName::try_from(*name).unwrap(),
                value.parse().unwrap(),
            );
        }
        map
    }

    fn peer() -> SocketAddr {
        "10.0.0.9:4242".parse().unwrap()
    }

    #[test]
    fn parse_point_accepts_negative_integers() {
        let query = PointQuery {
            x: Some(String::from("-3")),
            y: Some(String::from("7")),
        };
        assert_eq!(parse_point(&query).unwrap(), (-3, 7));
    }

    #[test]
    fn parse_point_rejects_non_integers() {
        let query = PointQuery {
            x: Some(String::from("nope")),
            y: Some(String::from("7")),
        };
        let err = parse_point(&query).unwrap_err();
        assert!(matches!(err, ApiError::BadInput(msg) if msg == "x must be an integer, got nope"));

        let missing = PointQuery { x: None, y: None };
        assert!(parse_point(&missing).is_err());
    }

    #[test]
    fn client_ip_prefers_forwarded_for_first_hop() {
        let map = headers(&[
            ("x-forwarded-for", "1.2.3.4, 5.6.7.8"),
            ("x-real-ip", "9.9.9.9"),
        ]);
        assert_eq!(client_ip(&map, peer()), Some("1.2.3.4".parse().unwrap()));
    }

    #[test]
    fn client_ip_falls_back_to_real_ip_then_peer() {
        let map = headers(&[("x-real-ip", " 9.9.9.9 ")]);
        assert_eq!(client_ip(&map, peer()), Some("9.9.9.9".parse().unwrap()));

        let empty = HeaderMap::new();
        assert_eq!(client_ip(&empty, peer()), Some("10.0.0.9".parse().unwrap()));
    }

    #[test]
    fn client_ip_rejects_malformed_forwarded_header() {
        let map = headers(&[("x-forwarded-for", "not-an-ip")]);
        assert_eq!(client_ip(&map, peer()), None);
    }
}
