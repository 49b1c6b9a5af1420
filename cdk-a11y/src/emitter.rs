//! Multi-subscriber change streams.

use std::sync::Mutex;

use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};

/// Fans values out to every live subscriber.
///
/// Each subscriber gets its own unbounded receiver, which is a
/// `futures::Stream`. Subscribers only see values emitted after they
/// subscribed. Dropped receivers are pruned on the next emit.
#[derive(Debug)]
pub struct Emitter<T> {
    subscribers: Mutex<Vec<UnboundedSender<T>>>,
}

impl<T> Default for Emitter<T> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<T: Clone> Emitter<T> {
    /// Create an emitter with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to future values.
    pub fn subscribe(&self) -> UnboundedReceiver<T> {
        let (tx, rx) = unbounded();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }

    /// Send a value to every subscriber.
    pub fn emit(&self, value: T) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|tx| tx.unbounded_send(value.clone()).is_ok());
        }
    }

    /// End every subscriber's stream.
    pub fn complete(&self) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            for tx in subscribers.drain(..) {
                tx.close_channel();
            }
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .map(|mut subscribers| {
                subscribers.retain(|tx| !tx.is_closed());
                subscribers.len()
            })
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use futures::{FutureExt, StreamExt};

    use super::*;

    #[test]
    fn test_emit_reaches_all_subscribers() {
        let emitter = Emitter::new();
        let mut a = emitter.subscribe();
        let mut b = emitter.subscribe();
        emitter.emit(7);
        assert_eq!(a.next().now_or_never(), Some(Some(7)));
        assert_eq!(b.next().now_or_never(), Some(Some(7)));
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let emitter = Emitter::new();
        let a = emitter.subscribe();
        let _b = emitter.subscribe();
        drop(a);
        emitter.emit(1);
        assert_eq!(emitter.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_complete_ends_streams() {
        let emitter = Emitter::<u8>::new();
        let mut rx = emitter.subscribe();
        emitter.complete();
        assert_eq!(rx.next().await, None);
    }
}
