use crate::{
    store::{KvPair, StoreWatchEvent},
    KvError,
};
use futures::Stream;
use std::collections::VecDeque;

/// Backend side of a watch. Each call blocks until the backend reports at
/// least one event; an empty batch means the watch has been closed.
#[async_trait::async_trait]
pub trait WatchSource: Send {
    async fn next_events(&mut self) -> Result<Vec<StoreWatchEvent>, KvError>;
}

pub struct StoreWatcher {
    key: String,
    source: Box<dyn WatchSource>,
    active: bool,
    pending_events: VecDeque<StoreWatchEvent>,
}

impl StoreWatcher {
    pub fn new(key: impl Into<String>, source: Box<dyn WatchSource>) -> Self {
        Self {
            key: key.into(),
            source,
            active: true,
            pending_events: VecDeque::new(),
        }
    }

    /// Watcher that reports `current` before any backend event.
    pub fn with_current(current: KvPair, source: Box<dyn WatchSource>) -> Self {
        let mut watcher = Self::new(current.key.clone(), source);
        watcher.pending_events.push_back(StoreWatchEvent::Put(current));
        watcher
    }

    /// Wait for the next value of the key. Returns `None` once the key has
    /// been deleted or the backend stream is closed; any later call returns
    /// `None` as well.
    pub async fn watch(&mut self) -> Option<Result<KvPair, KvError>> {
        loop {
            if let Some(event) = self.pending_events.pop_front() {
                match event {
                    StoreWatchEvent::Put(pair) => return Some(Ok(pair)),
                    StoreWatchEvent::Delete { key } => {
                        tracing::debug!("Key '{}' deleted, closing watcher", key);
                        self.close();
                        return None;
                    }
                }
            }

            // Check if the watcher is still active.
            if !self.active {
                return None;
            }

            match self.source.next_events().await {
                Ok(events) if events.is_empty() => {
                    tracing::warn!(
                        "Store watcher's stream for key '{}' is cancelled, no more events can be received",
                        self.key
                    );
                    self.close();
                    return None;
                }
                Ok(events) => self.pending_events.extend(events),
                Err(e) => {
                    // Backend streams don't recover after an error.
                    self.close();
                    return Some(Err(e));
                }
            }
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<KvPair, KvError>> + Send {
        futures::stream::unfold(self, |mut watcher| async move {
            watcher.watch().await.map(|item| (item, watcher))
        })
    }

    fn close(&mut self) {
        self.active = false;
        self.pending_events.clear();
    }
}
