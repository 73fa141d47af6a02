//! Ordered handoff of chunks from query tasks to the display owner.
//!
//! Query tasks hold a [`Dispatcher`]; the thread that owns the display holds
//! the matching [`DeliveryQueue`] and is the only place the sink is called.

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::chunker::Chunk;
use crate::errors::RelayError;

/// Receives chunk text on the owner context.
pub trait DisplaySink {
    fn deliver(&mut self, text: &str);
}

impl<F> DisplaySink for F
where
    F: FnMut(&str),
{
    fn deliver(&mut self, text: &str) {
        (*self)(text)
    }
}

/// One chunk tagged with the query that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub query_id: Uuid,
    pub chunk: Chunk,
}

/// Creates a bounded, ordered delivery channel. A zero capacity is raised to one.
pub fn delivery_channel(capacity: usize) -> (Dispatcher, DeliveryQueue) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Dispatcher { tx }, DeliveryQueue { rx })
}

/// Sending half, cloned into each query task.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    tx: mpsc::Sender<Delivery>,
}

impl Dispatcher {
    /// Enqueues `chunk`, waiting for room if the queue is full.
    ///
    /// Returns only after the chunk is queued, so a later chunk from the same
    /// task can never overtake it.
    pub async fn dispatch(&self, query_id: Uuid, chunk: Chunk) -> Result<(), RelayError> {
        debug!(query_id = %query_id, seq = chunk.sequence, "dispatching chunk");
        self.tx
            .send(Delivery { query_id, chunk })
            .await
            .map_err(|_| RelayError::protocol_msg("delivery queue closed"))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half, owned by the display context.
#[derive(Debug)]
pub struct DeliveryQueue {
    rx: mpsc::Receiver<Delivery>,
}

impl DeliveryQueue {
    /// Waits for the next delivery. `None` once every dispatcher is dropped.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }

    /// Delivers chunks until every dispatcher is dropped. Returns the count.
    pub async fn run<S: DisplaySink + ?Sized>(mut self, sink: &mut S) -> u64 {
        let mut delivered = 0_u64;
        while let Some(delivery) = self.rx.recv().await {
            sink.deliver(&delivery.chunk.text);
            delivered += 1;
        }
        delivered
    }

    /// Delivers whatever is queued right now without waiting.
    ///
    /// Meant for hosts that poll from their own event loop tick.
    pub fn try_drain<S: DisplaySink + ?Sized>(&mut self, sink: &mut S) -> usize {
        let mut delivered = 0;
        while let Ok(delivery) = self.rx.try_recv() {
            sink.deliver(&delivery.chunk.text);
            delivered += 1;
        }
        delivered
    }
}
