//! # Pending Call Table
//!
//! Correlates in-flight requests with worker responses by id. Each
//! registered call holds a oneshot receiver; the stdout reader task
//! completes entries as response lines decode. Dropping a sender (worker
//! exit, disconnect) wakes the waiting caller with a closed-channel error
//! rather than leaving it parked forever.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::protocol::ResponseFrame;

/// Lock-guarded map of in-flight calls, keyed by request id.
///
/// The lock is `parking_lot` and never held across an `.await` point.
#[derive(Debug, Default)]
pub struct PendingTable {
    inner: Mutex<HashMap<u64, oneshot::Sender<ResponseFrame>>>,
}

impl PendingTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call and return the receiver its response resolves.
    pub fn register(&self, id: u64) -> oneshot::Receiver<ResponseFrame> {
        let (tx, rx) = oneshot::channel();
        self.inner.lock().insert(id, tx);
        rx
    }

    /// Deliver a response to the call it belongs to.
    ///
    /// Returns `false` if no call with this id is pending (late response
    /// after timeout removal, duplicate, or a worker inventing ids).
    pub fn complete(&self, frame: ResponseFrame) -> bool {
        let sender = self.inner.lock().remove(&frame.id);
        match sender {
            // send() fails only if the caller stopped waiting; either way
            // the entry is gone.
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    /// Remove a call without resolving it (timeout expiry).
    ///
    /// Returns `true` if the entry was still pending.
    pub fn remove(&self, id: u64) -> bool {
        self.inner.lock().remove(&id).is_some()
    }

    /// Drop every pending entry, waking all callers with a closed error.
    ///
    /// Returns how many calls were discarded.
    pub fn fail_all(&self) -> usize {
        let mut guard = self.inner.lock();
        let count = guard.len();
        guard.clear();
        count
    }

    /// Number of in-flight calls.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether no calls are in flight.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn frame(id: u64) -> ResponseFrame {
        ResponseFrame { id, success: true, error: None, body: Map::new() }
    }

    #[tokio::test]
    async fn complete_resolves_the_matching_call() {
        let table = PendingTable::new();
        let rx1 = table.register(1);
        let rx2 = table.register(2);

        assert!(table.complete(frame(2)));
        assert_eq!(rx2.await.unwrap().id, 2);

        assert!(table.complete(frame(1)));
        assert_eq!(rx1.await.unwrap().id, 1);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn unknown_id_is_reported() {
        let table = PendingTable::new();
        let _rx = table.register(1);
        assert!(!table.complete(frame(99)));
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn removed_call_never_resolves() {
        let table = PendingTable::new();
        let rx = table.register(5);
        assert!(table.remove(5));
        assert!(!table.remove(5));
        // A late response for the removed id is dropped.
        assert!(!table.complete(frame(5)));
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn fail_all_wakes_every_caller() {
        let table = PendingTable::new();
        let rx1 = table.register(1);
        let rx2 = table.register(2);
        assert_eq!(table.fail_all(), 2);
        assert!(rx1.await.is_err());
        assert!(rx2.await.is_err());
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn duplicate_response_is_dropped() {
        let table = PendingTable::new();
        let rx = table.register(3);
        assert!(table.complete(frame(3)));
        assert!(!table.complete(frame(3)));
        assert_eq!(rx.await.unwrap().id, 3);
    }
}
