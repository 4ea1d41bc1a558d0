use crate::{
    store::{KvPair, StoreWatcher},
    Backend, KvError,
};

/// Minimal key/value store surface the fetcher needs: read a key once, or
/// follow it for changes.
#[async_trait::async_trait]
pub trait KvStore: Send {
    fn backend(&self) -> Backend;

    /// Read a single key. A missing key is reported as `KvError::KeyNotFound`.
    async fn get(&mut self, key: &str) -> Result<KvPair, KvError>;

    /// Start watching a key. The returned watcher yields the current value
    /// first and then every subsequent update until the key is deleted or the
    /// backend closes the watch.
    async fn watch(&mut self, key: &str) -> Result<StoreWatcher, KvError>;
}
