//! The process-wide fan-out hub.
//!
//! One task owns the subscriber map and consumes three bounded streams
//! from a serial `select!` loop: inbound draws from the pub/sub bridge,
//! subscribe requests, and unsubscribe requests. Nothing else ever touches
//! the map, so there is no locking.
//!
//! Delivery never blocks the loop on a slow subscriber: each subscriber
//! has a bounded channel, and an event that does not fit is dropped for
//! that subscriber (and logged) while delivery to the others continues.

use std::collections::HashMap;

use pixelboard_types::Draw;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::BroadcastError;

/// Capacity of each subscriber's delivery channel.
pub const SUBSCRIBER_CAPACITY: usize = 16;

/// Capacity of the inbound draw stream.
const INBOUND_CAPACITY: usize = 256;

/// Capacity of the subscribe and unsubscribe streams.
const CONTROL_CAPACITY: usize = 64;

/// A registered event consumer: its identity and delivery channel.
#[derive(Debug)]
pub struct Subscriber {
    pub id: Uuid,
    pub tx: mpsc::Sender<Draw>,
}

/// Cloneable handle for feeding the hub.
#[derive(Debug, Clone)]
pub struct HubHandle {
    inbound: mpsc::Sender<Draw>,
    subscribe: mpsc::Sender<Subscriber>,
    unsubscribe: mpsc::Sender<Uuid>,
}

impl HubHandle {
    /// Push a draw into the hub for delivery to every subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::HubClosed`] if the hub task has stopped.
    pub async fn deliver(&self, draw: Draw) -> Result<(), BroadcastError> {
        self.inbound
            .send(draw)
            .await
            .map_err(|_| BroadcastError::HubClosed)
    }

    /// Register a subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::HubClosed`] if the hub task has stopped.
    pub async fn register(&self, subscriber: Subscriber) -> Result<(), BroadcastError> {
        self.subscribe
            .send(subscriber)
            .await
            .map_err(|_| BroadcastError::HubClosed)
    }

    /// Remove a subscriber. Idempotent; unknown ids are ignored.
    ///
    /// Best-effort and non-blocking so it is callable from `Drop`: if the
    /// control stream is full the hub will still notice the closed delivery
    /// channel on its next delivery attempt.
    pub fn deregister(&self, id: Uuid) {
        if let Err(err) = self.unsubscribe.try_send(id) {
            warn!(subscriber = %id, error = %err, "could not queue unsubscribe");
        }
    }
}

/// Spawn the hub task.
///
/// The task runs until every [`HubHandle`] is dropped.
#[must_use]
pub fn spawn() -> (HubHandle, JoinHandle<()>) {
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
    let (subscribe_tx, subscribe_rx) = mpsc::channel(CONTROL_CAPACITY);
    let (unsubscribe_tx, unsubscribe_rx) = mpsc::channel(CONTROL_CAPACITY);

    let task = tokio::spawn(run(inbound_rx, subscribe_rx, unsubscribe_rx));

    (
        HubHandle {
            inbound: inbound_tx,
            subscribe: subscribe_tx,
            unsubscribe: unsubscribe_tx,
        },
        task,
    )
}

/// The hub loop. Sole owner of the subscriber map.
async fn run(
    mut inbound: mpsc::Receiver<Draw>,
    mut subscribe: mpsc::Receiver<Subscriber>,
    mut unsubscribe: mpsc::Receiver<Uuid>,
) {
    let mut subscribers: HashMap<Uuid, mpsc::Sender<Draw>> = HashMap::new();

    loop {
        // Membership changes take priority over deliveries: a subscriber
        // that finished registering (or unsubscribing) before a draw was
        // queued is guaranteed to see (or not see) that draw.
        tokio::select! {
            biased;

            subscriber = subscribe.recv() => match subscriber {
                Some(Subscriber { id, tx }) => {
                    subscribers.insert(id, tx);
                    debug!(subscriber = %id, count = subscribers.len(), "registered subscriber");
                }
                None => break,
            },
            id = unsubscribe.recv() => match id {
                Some(id) => {
                    subscribers.remove(&id);
                    debug!(subscriber = %id, count = subscribers.len(), "removed subscriber");
                }
                None => break,
            },
            draw = inbound.recv() => match draw {
                Some(draw) => fan_out(&mut subscribers, draw),
                None => break,
            },
        }
    }

    debug!("hub loop stopped");
}

/// Deliver one draw to every subscriber without blocking.
fn fan_out(subscribers: &mut HashMap<Uuid, mpsc::Sender<Draw>>, draw: Draw) {
    let mut gone = Vec::new();

    for (id, tx) in subscribers.iter() {
        match tx.try_send(draw) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(subscriber = %id, "subscriber channel full, dropping draw");
            }
            Err(TrySendError::Closed(_)) => gone.push(*id),
        }
    }

    for id in gone {
        subscribers.remove(&id);
        debug!(subscriber = %id, "removed subscriber with closed channel");
    }

    debug!(count = subscribers.len(), "fanned out draw to subscribers");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pixelboard_types::Rgba;
    use tokio::time::timeout;

    use super::*;

    const RECV_TIMEOUT: Duration = Duration::from_secs(1);

    fn draw(x: i32) -> Draw {
        Draw {
            x,
            y: 0,
            rgb: Rgba::opaque(1, 2, 3),
        }
    }

    async fn recv(rx: &mut mpsc::Receiver<Draw>) -> Draw {
        timeout(RECV_TIMEOUT, rx.recv())
            .await
            .expect("timed out waiting for draw")
            .expect("delivery channel closed")
    }

    #[tokio::test]
    async fn delivers_to_registered_subscriber() {
        let (hub, _task) = spawn();
        let (tx, mut rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        hub.register(Subscriber {
            id: Uuid::new_v4(),
            tx,
        })
        .await
        .unwrap();

        hub.deliver(draw(7)).await.unwrap();
        assert_eq!(recv(&mut rx).await.x, 7);
    }

    #[tokio::test]
    async fn preserves_inbound_order_per_subscriber() {
        let (hub, _task) = spawn();
        let (tx, mut rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        hub.register(Subscriber {
            id: Uuid::new_v4(),
            tx,
        })
        .await
        .unwrap();

        for x in 0..5 {
            hub.deliver(draw(x)).await.unwrap();
        }
        for x in 0..5 {
            assert_eq!(recv(&mut rx).await.x, x);
        }
    }

    #[tokio::test]
    async fn drops_for_full_subscriber_without_blocking_others() {
        let (hub, _task) = spawn();

        // This subscriber never reads; its channel fills after one event.
        let (stuck_tx, mut stuck_rx) = mpsc::channel(1);
        hub.register(Subscriber {
            id: Uuid::new_v4(),
            tx: stuck_tx,
        })
        .await
        .unwrap();

        let (live_tx, mut live_rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        hub.register(Subscriber {
            id: Uuid::new_v4(),
            tx: live_tx,
        })
        .await
        .unwrap();

        for x in 0..4 {
            hub.deliver(draw(x)).await.unwrap();
        }

        // The healthy subscriber sees everything, in order.
        for x in 0..4 {
            assert_eq!(recv(&mut live_rx).await.x, x);
        }
        // The stuck one got only the first event; the rest were dropped.
        assert_eq!(recv(&mut stuck_rx).await.x, 0);
        assert!(stuck_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn deregister_is_idempotent() {
        let (hub, _task) = spawn();
        let id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        hub.register(Subscriber { id, tx }).await.unwrap();

        hub.deregister(id);
        hub.deregister(id);

        hub.deliver(draw(1)).await.unwrap();
        assert!(
            timeout(Duration::from_millis(100), rx.recv()).await.is_err(),
            "deregistered subscriber should receive nothing"
        );
    }

    #[tokio::test]
    async fn removes_subscriber_whose_channel_closed() {
        let (hub, _task) = spawn();
        let (closed_tx, closed_rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        hub.register(Subscriber {
            id: Uuid::new_v4(),
            tx: closed_tx,
        })
        .await
        .unwrap();
        drop(closed_rx);

        let (live_tx, mut live_rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        hub.register(Subscriber {
            id: Uuid::new_v4(),
            tx: live_tx,
        })
        .await
        .unwrap();

        // Two deliveries: the first trips removal of the closed channel,
        // both reach the live subscriber.
        hub.deliver(draw(1)).await.unwrap();
        hub.deliver(draw(2)).await.unwrap();
        assert_eq!(recv(&mut live_rx).await.x, 1);
        assert_eq!(recv(&mut live_rx).await.x, 2);
    }
}
