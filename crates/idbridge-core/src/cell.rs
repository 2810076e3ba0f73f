//! Single-slot replay cell for the published storage handle
//!
//! Holds the most recent ready handle (or nothing). Existing subscribers are
//! woken on every publish; a subscriber created after the publish receives
//! the held handle immediately instead of missing the event.

use tokio::sync::watch;

/// Single-slot broadcast cell that replays its last value.
#[derive(Debug)]
pub struct HandleCell<H> {
    tx: watch::Sender<Option<H>>,
}

impl<H: Clone> HandleCell<H> {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Publish a handle, returning the one it replaces.
    pub fn publish(&self, handle: H) -> Option<H> {
        self.tx.send_replace(Some(handle))
    }

    /// Empty the cell, returning the handle it held.
    pub fn clear(&self) -> Option<H> {
        self.tx.send_replace(None)
    }

    /// The currently held handle, if any.
    pub fn current(&self) -> Option<H> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> HandleSubscription<H> {
        HandleSubscription {
            rx: self.tx.subscribe(),
            replayed: false,
        }
    }
}

impl<H: Clone> Default for HandleCell<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of a [`HandleCell`].
#[derive(Debug)]
pub struct HandleSubscription<H> {
    rx: watch::Receiver<Option<H>>,
    replayed: bool,
}

impl<H: Clone> HandleSubscription<H> {
    /// Wait for the next published handle.
    ///
    /// The first call returns the held handle immediately if there is one.
    /// Returns `None` once the cell has been dropped.
    pub async fn recv(&mut self) -> Option<H> {
        if !self.replayed {
            self.replayed = true;
            if let Some(handle) = self.rx.borrow_and_update().clone() {
                return Some(handle);
            }
        }
        loop {
            self.rx.changed().await.ok()?;
            if let Some(handle) = self.rx.borrow_and_update().clone() {
                return Some(handle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "current_thread")]
    async fn test_late_subscriber_gets_replay() {
        let cell = HandleCell::new();
        cell.publish("conn-1".to_string());

        let mut late = cell.subscribe();
        assert_eq!(late.recv().await.as_deref(), Some("conn-1"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_existing_subscriber_sees_publish() {
        let cell = HandleCell::new();
        let mut early = cell.subscribe();

        cell.publish(7u32);
        assert_eq!(early.recv().await, Some(7));

        cell.publish(8u32);
        assert_eq!(early.recv().await, Some(8));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_subscription_ends_when_cell_dropped() {
        let cell: HandleCell<u32> = HandleCell::new();
        let mut sub = cell.subscribe();
        drop(cell);
        assert_eq!(sub.recv().await, None);
    }

    #[test]
    fn test_publish_and_clear() {
        let cell = HandleCell::new();
        assert_eq!(cell.current(), None);
        assert_eq!(cell.publish(1u8), None);
        assert_eq!(cell.publish(2u8), Some(1));
        assert_eq!(cell.clear(), Some(2));
        assert_eq!(cell.current(), None);
    }
}
