//! In-memory stores driven by the test body.

use crate::{
    store::{KvPair, KvStore, StoreWatchEvent, StoreWatcher, WatchSource},
    Backend, KvError,
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

pub(crate) struct ScriptedSource {
    events: UnboundedReceiver<Vec<StoreWatchEvent>>,
    failure: Option<KvError>,
}

impl ScriptedSource {
    /// Batches pushed into the returned sender are handed out one per
    /// `next_events()` call. Dropping the sender closes the watch.
    pub(crate) fn new() -> (Self, UnboundedSender<Vec<StoreWatchEvent>>) {
        let (tx, rx) = unbounded_channel();
        (
            Self {
                events: rx,
                failure: None,
            },
            tx,
        )
    }

    /// Report `error` on the first `next_events()` call.
    pub(crate) fn with_failure(mut self, error: KvError) -> Self {
        self.failure = Some(error);
        self
    }
}

#[async_trait::async_trait]
impl WatchSource for ScriptedSource {
    async fn next_events(&mut self) -> Result<Vec<StoreWatchEvent>, KvError> {
        if let Some(e) = self.failure.take() {
            return Err(e);
        }
        Ok(self.events.recv().await.unwrap_or_default())
    }
}

pub(crate) struct ScriptedStore {
    value: Option<Vec<u8>>,
    source: Option<ScriptedSource>,
}

impl ScriptedStore {
    /// Store holding `value` under every key, or nothing at all.
    pub(crate) fn new(value: Option<Vec<u8>>) -> Self {
        Self {
            value,
            source: None,
        }
    }

    /// Store whose single watch is fed from the returned sender.
    pub(crate) fn watched(
        value: Option<Vec<u8>>,
    ) -> (Self, UnboundedSender<Vec<StoreWatchEvent>>) {
        let (source, tx) = ScriptedSource::new();
        (
            Self {
                value,
                source: Some(source),
            },
            tx,
        )
    }
}

#[async_trait::async_trait]
impl KvStore for ScriptedStore {
    fn backend(&self) -> Backend {
        Backend::BoltDb
    }

    async fn get(&mut self, key: &str) -> Result<KvPair, KvError> {
        match &self.value {
            Some(v) => Ok(KvPair::new(key, v.clone(), 1)),
            None => Err(KvError::KeyNotFound {
                key: key.to_string(),
            }),
        }
    }

    async fn watch(&mut self, key: &str) -> Result<StoreWatcher, KvError> {
        let current = self.get(key).await?;
        let source = self
            .source
            .take()
            .expect("Scripted store can only be watched once");
        Ok(StoreWatcher::with_current(current, Box::new(source)))
    }
}
