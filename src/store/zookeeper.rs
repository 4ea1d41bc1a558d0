use crate::{
    common::{ZkConnect, ZkGet},
    store::{KvPair, KvStore, StoreWatchEvent, StoreWatcher, WatchSource},
    Backend, KvError,
};
use snafu::ResultExt;
use zookeeper_client as zk;

pub struct ZkStore {
    client: zk::Client,
}

impl ZkStore {
    pub async fn new<E: AsRef<str>, S: AsRef<[E]>>(endpoints: S) -> Result<Self, KvError> {
        let cluster = endpoints
            .as_ref()
            .iter()
            .map(|e| e.as_ref())
            .collect::<Vec<_>>()
            .join(",");

        let client = zk::Client::connect(&cluster)
            .await
            .context(ZkConnect { cluster: &cluster })?;
        Ok(Self { client })
    }
}

/// ZooKeeper only accepts absolute paths.
pub(crate) fn normalize(key: &str) -> String {
    format!("/{}", key.trim_start_matches('/'))
}

fn not_found(key: &str) -> KvError {
    KvError::KeyNotFound {
        key: key.to_string(),
    }
}

#[async_trait::async_trait]
impl KvStore for ZkStore {
    fn backend(&self) -> Backend {
        Backend::Zookeeper
    }

    async fn get(&mut self, key: &str) -> Result<KvPair, KvError> {
        let path = normalize(key);
        match self.client.get_data(&path).await {
            Ok((data, stat)) => Ok(KvPair::new(key, data, stat.mzxid as u64)),
            Err(zk::Error::NoNode) => Err(not_found(key)),
            Err(e) => Err(e).context(ZkGet { path }),
        }
    }

    async fn watch(&mut self, key: &str) -> Result<StoreWatcher, KvError> {
        let path = normalize(key);
        let (data, stat, watcher) = match self.client.get_and_watch_data(&path).await {
            Ok(r) => r,
            Err(zk::Error::NoNode) => return Err(not_found(key)),
            Err(e) => return Err(e).context(ZkGet { path }),
        };

        let source = ZkWatchSource {
            client: self.client.clone(),
            key: key.to_string(),
            path,
            watcher: Some(watcher),
        };
        Ok(StoreWatcher::with_current(
            KvPair::new(key, data, stat.mzxid as u64),
            Box::new(source),
        ))
    }
}

/// ZooKeeper watches fire once, so every change re-arms a new one.
struct ZkWatchSource {
    client: zk::Client,
    key: String,
    path: String,
    watcher: Option<zk::OneshotWatcher>,
}

#[async_trait::async_trait]
impl WatchSource for ZkWatchSource {
    async fn next_events(&mut self) -> Result<Vec<StoreWatchEvent>, KvError> {
        let watcher = match self.watcher.take() {
            Some(w) => w,
            None => return Ok(Vec::new()),
        };

        let event = watcher.changed().await;
        match event.event_type {
            zk::EventType::NodeDeleted => {
                return Ok(vec![StoreWatchEvent::Delete {
                    key: self.key.clone(),
                }])
            }
            zk::EventType::NodeDataChanged => {}
            other => {
                // Session expiry or closure, the watch can't be re-armed.
                tracing::debug!("ZooKeeper watch on '{}' ended with {:?}", self.path, other);
                return Ok(Vec::new());
            }
        }

        match self.client.get_and_watch_data(&self.path).await {
            Ok((data, stat, watcher)) => {
                self.watcher = Some(watcher);
                Ok(vec![StoreWatchEvent::Put(KvPair::new(
                    self.key.as_str(),
                    data,
                    stat.mzxid as u64,
                ))])
            }
            Err(zk::Error::NoNode) => Ok(vec![StoreWatchEvent::Delete {
                key: self.key.clone(),
            }]),
            Err(e) => Err(e).context(ZkGet {
                path: self.path.as_str(),
            }),
        }
    }
}
