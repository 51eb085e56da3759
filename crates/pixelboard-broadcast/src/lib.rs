//! Draw-event fan-out for the pixelboard canvas.
//!
//! Placements reach connected clients through three pieces:
//!
//! - [`wire`] -- the binary draw-event record carried on the pub/sub
//!   channel
//! - [`bridge`] -- the channel listener feeding decoded events into the
//!   hub, and the publish side used by the placement pipeline
//! - [`hub`] -- the single-task multiplexer that delivers each event to
//!   every connected subscriber
//!
//! The hub is strictly single-threaded cooperative: one task owns the
//! subscriber map and consumes its three input streams from a serial
//! `select!` loop, so the map needs no locking. Because every process
//! receives its own published events back off the channel, a client always
//! sees its own placement in its event stream.

pub mod bridge;
pub mod error;
pub mod hub;
pub mod wire;

// Re-export primary types for convenience.
pub use error::BroadcastError;
pub use hub::{HubHandle, Subscriber, SUBSCRIBER_CAPACITY};
pub use wire::DRAW_CHANNEL;
