use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

/// Default number of record batches buffered between producer and consumers.
pub const DEFAULT_CAPACITY: usize = 100;

// ════════════════════════════════════════════════════════════════
//  Bounded Bus
// ════════════════════════════════════════════════════════════════

/// Create a bounded handoff between one producer role and one-or-many
/// consumer roles.
///
/// Send blocks while full (pure backpressure, nothing is ever dropped),
/// receive blocks while empty. The bus closes when every sender handle is
/// gone; buffered items still drain, after which `recv` reports closed by
/// returning `None`.
pub fn bounded<T>(capacity: usize) -> (BusSender<T>, BusReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        BusSender { tx },
        BusReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Producer handle. Cloned across reader workers; the bus closes once the
/// last clone is dropped, which the owning task guarantees on every exit
/// path.
pub struct BusSender<T> {
    tx: mpsc::Sender<T>,
}

impl<T> Clone for BusSender<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T> BusSender<T> {
    /// Blocks while the bus is at capacity. `Err` means every consumer is
    /// gone and nothing can be delivered anymore.
    pub async fn send(&self, item: T) -> Result<(), BusClosed> {
        self.tx.send(item).await.map_err(|_| BusClosed)
    }
}

/// Consumer handle. Cloned across writer workers; the receiver is shared
/// internally, so callers need no external locking.
pub struct BusReceiver<T> {
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for BusReceiver<T> {
    fn clone(&self) -> Self {
        Self { rx: Arc::clone(&self.rx) }
    }
}

impl<T> BusReceiver<T> {
    /// `None` = closed by the producer and fully drained.
    pub async fn recv(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }
}

/// Every consumer handle has been dropped.
#[derive(Debug, PartialEq, Eq)]
pub struct BusClosed;
