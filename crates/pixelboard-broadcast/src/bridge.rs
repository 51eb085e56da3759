//! Pub/sub bridge between the broker channel and the local hub.
//!
//! Every process publishes its placements to the `draw-events` channel and
//! subscribes to the same channel, so a process fans out both its own
//! placements and everyone else's. There is no filtering or deduplication
//! on either side.

use fred::clients::SubscriberClient;
use fred::prelude::*;
use pixelboard_types::Draw;
use tracing::{debug, info, warn};

use crate::error::BroadcastError;
use crate::hub::HubHandle;
use crate::wire;
use crate::wire::DRAW_CHANNEL;

/// Build and connect a subscriber client for the broker at `url`.
///
/// # Errors
///
/// Returns [`BroadcastError::Config`] if the URL cannot be parsed.
/// Returns [`BroadcastError::Redis`] if the connection fails.
pub async fn subscriber_client(url: &str) -> Result<SubscriberClient, BroadcastError> {
    let config = Config::from_url(url)
        .map_err(|e| BroadcastError::Config(format!("invalid broker URL: {e}")))?;

    let client = Builder::from_config(config).build_subscriber_client()?;
    client.init().await?;
    Ok(client)
}

/// Consume the draw-event channel and feed every decoded draw into the hub.
///
/// Runs until the broker connection or the hub goes away. Messages that do
/// not decode are logged and skipped; they never stop the listener.
///
/// # Errors
///
/// Returns [`BroadcastError::Redis`] if subscribing fails, or
/// [`BroadcastError::HubClosed`] if the hub stopped while the listener was
/// still running.
pub async fn run_listener(
    client: SubscriberClient,
    hub: HubHandle,
) -> Result<(), BroadcastError> {
    client.subscribe(DRAW_CHANNEL).await?;
    info!(channel = DRAW_CHANNEL, "listening for draw events");

    // Only one channel is subscribed, so every message here is a draw.
    let mut messages = client.message_rx();
    while let Ok(message) = messages.recv().await {
        let Some(payload) = message.value.as_bytes() else {
            warn!("draw event payload was not a byte string, skipping");
            continue;
        };

        match wire::decode_draw(payload) {
            Ok(draw) => {
                debug!(x = draw.x, y = draw.y, "received draw event");
                hub.deliver(draw).await?;
            }
            Err(err) => warn!(error = %err, "failed to decode draw event, skipping"),
        }
    }

    info!(channel = DRAW_CHANNEL, "draw event stream closed");
    Ok(())
}

/// Encode and publish one draw on the draw-event channel.
///
/// # Errors
///
/// Returns [`BroadcastError::Redis`] if the publish fails.
pub async fn publish_draw(client: &Client, draw: Draw) -> Result<(), BroadcastError> {
    let payload = wire::encode_draw(draw);
    let _: i64 = client.publish(DRAW_CHANNEL, payload).await?;

    debug!(x = draw.x, y = draw.y, "published draw event");
    Ok(())
}
