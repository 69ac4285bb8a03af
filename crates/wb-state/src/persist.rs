//! Serialized persistence writer.
//!
//! Each manager with a persistence key owns one writer task. Writes are
//! submitted as whole-state values tagged with a generation number; the task
//! keeps at most one write in flight and, when several submissions pile up
//! behind it, only writes the newest. Completed generations are published so
//! `flush` can wait for everything issued so far.

use crate::store::Store;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Default)]
struct Pending {
    generation: u64,
    state: Option<Value>,
}

#[derive(Debug)]
pub(crate) struct PersistQueue {
    pending: watch::Sender<Pending>,
    written: watch::Receiver<u64>,
    issued: u64,
}

impl PersistQueue {
    /// Start the writer task for `key` on the current tokio runtime.
    ///
    /// Returns `None` outside a runtime; the manager tries again on its next
    /// write.
    pub fn spawn<S: Store>(store: Arc<S>, key: String) -> Option<Self> {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(err) => {
                log::warn!("no async runtime, `{key}` not persisted yet: {err}");
                return None;
            }
        };

        let (pending_tx, pending_rx) = watch::channel(Pending::default());
        let (written_tx, written_rx) = watch::channel(0u64);
        handle.spawn(write_loop(store, key, pending_rx, written_tx));

        Some(Self {
            pending: pending_tx,
            written: written_rx,
            issued: 0,
        })
    }

    /// Submit the latest state. Replaces any submission the writer has not
    /// picked up yet.
    pub fn enqueue(&mut self, state: Value) {
        self.issued += 1;
        self.pending.send_replace(Pending {
            generation: self.issued,
            state: Some(state),
        });
    }

    /// Wait until every submission so far has been written or has failed.
    pub async fn flush(&self) {
        let target = self.issued;
        let mut written = self.written.clone();
        if written.wait_for(|done| *done >= target).await.is_err() {
            log::warn!("persistence writer stopped before generation {target} was written");
        }
    }
}

async fn write_loop<S: Store>(
    store: Arc<S>,
    key: String,
    mut pending: watch::Receiver<Pending>,
    written: watch::Sender<u64>,
) {
    while pending.changed().await.is_ok() {
        let (generation, state) = {
            let next = pending.borrow_and_update();
            (next.generation, next.state.clone())
        };
        if let Some(state) = state {
            match store.set(&key, state).await {
                Ok(()) => log::trace!("persisted `{key}` (generation {generation})"),
                Err(err) => log::error!("failed to persist `{key}`: {err}"),
            }
        }
        written.send_replace(generation);
    }
    log::debug!("persistence writer for `{key}` stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn latest_submission_wins() {
        let store = MemoryStore::new();
        let mut queue = PersistQueue::spawn(Arc::new(store.clone()), "doc".into()).unwrap();

        for n in 0..20 {
            queue.enqueue(json!({ "n": n }));
        }
        queue.flush().await;

        assert_eq!(store.peek("doc").unwrap(), Some(json!({ "n": 19 })));
    }

    #[tokio::test]
    async fn flush_without_writes_returns() {
        let queue = PersistQueue::spawn(Arc::new(MemoryStore::new()), "doc".into()).unwrap();
        queue.flush().await;
    }

    #[test]
    fn no_runtime_no_queue() {
        assert!(PersistQueue::spawn(Arc::new(MemoryStore::new()), "doc".into()).is_none());
    }
}
