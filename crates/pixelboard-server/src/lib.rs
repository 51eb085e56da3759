//! HTTP server for the pixelboard canvas.
//!
//! Exposes the read endpoints (single tile, group blob, placement
//! history), the placement endpoint, and a server-sent-events stream of
//! live draws. The placement path is the interesting one: admission and
//! the cooldown gate run first, the cache patch runs synchronously so the
//! write is immediately readable, and the durable double-write plus the
//! pub/sub publish are handed to a bounded background queue so response
//! latency is bounded by the cache, not the store.
//!
//! # Modules
//!
//! - [`captcha`] -- verifier seam and the reCAPTCHA client
//! - [`config`] -- environment-backed configuration
//! - [`error`] -- the HTTP error taxonomy and `{msg, code}` envelope
//! - [`handlers`] -- read and placement endpoint handlers
//! - [`jobs`] -- bounded background job queue
//! - [`pipeline`] -- the placement pipeline
//! - [`router`] -- route table and middleware stack
//! - [`server`] -- listener lifecycle
//! - [`sse`] -- the live draw-event stream
//! - [`state`] -- shared application state
//! - [`trace`] -- per-request trace ids

pub mod captcha;
pub mod config;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod pipeline;
pub mod router;
pub mod server;
pub mod sse;
pub mod state;
pub mod trace;

// Re-export primary types for convenience.
pub use captcha::{CaptchaVerifier, RecaptchaClient, StaticVerifier};
pub use config::Config;
pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
