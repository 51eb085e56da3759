//! The live draw-event stream.
//!
//! Each `GET /draw/events` connection registers one subscriber with the
//! fan-out hub and streams every delivered draw as a server-sent event
//! whose data is the draw's JSON. The subscription unregisters itself when
//! the response stream is dropped -- unsubscribe first, then drain and
//! discard whatever the hub managed to queue, then close -- so the hub
//! never delivers into a channel that vanished without notice.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use pixelboard_broadcast::{HubHandle, Subscriber, SUBSCRIBER_CAPACITY};
use pixelboard_types::Draw;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::captcha::CaptchaVerifier;
use crate::error::ApiError;
use crate::state::AppState;

/// Stream draws to the client for the lifetime of the request.
pub async fn draw_events<V: CaptchaVerifier>(
    State(state): State<Arc<AppState<V>>>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);

    state
        .hub
        .register(Subscriber { id, tx })
        .await
        .map_err(|_| ApiError::Invariant(String::from("broadcast hub is not running")))?;

    info!(subscriber = %id, "sse client connected");

    let events = Subscription {
        id,
        rx,
        hub: state.hub.clone(),
    }
    .map(|draw| Event::default().json_data(&draw));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// A hub subscription that cleans up after itself.
struct Subscription {
    id: Uuid,
    rx: mpsc::Receiver<Draw>,
    hub: HubHandle,
}

impl Stream for Subscription {
    type Item = Draw;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Draw>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.deregister(self.id);
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
        debug!(subscriber = %self.id, "sse client disconnected");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pixelboard_broadcast::hub;
    use pixelboard_types::Rgba;
    use tokio::time::timeout;

    use super::*;

    fn draw(x: i32) -> Draw {
        Draw {
            x,
            y: 1,
            rgb: Rgba::opaque(4, 5, 6),
        }
    }

    #[tokio::test]
    async fn subscription_streams_delivered_draws() {
        let (handle, _task) = hub::spawn();
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        handle.register(Subscriber { id, tx }).await.unwrap();

        let mut subscription = Subscription {
            id,
            rx,
            hub: handle.clone(),
        };

        handle.deliver(draw(3)).await.unwrap();
        let received = timeout(Duration::from_secs(1), subscription.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.x, 3);
    }

    #[tokio::test]
    async fn dropping_subscription_unregisters_from_hub() {
        let (handle, _task) = hub::spawn();
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        handle.register(Subscriber { id, tx }).await.unwrap();

        drop(Subscription {
            id,
            rx,
            hub: handle.clone(),
        });

        // Delivering after the drop must not panic and must still serve
        // other subscribers.
        let (live_tx, mut live_rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        handle
            .register(Subscriber {
                id: Uuid::new_v4(),
                tx: live_tx,
            })
            .await
            .unwrap();

        handle.deliver(draw(8)).await.unwrap();
        let received = timeout(Duration::from_secs(1), live_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.x, 8);
    }
}
