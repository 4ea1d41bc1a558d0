use crate::{
    common::{EtcdConnect, EtcdGet, EtcdWatch, EtcdWatchCreate, KeyNotFound},
    store::{KvPair, KvStore, StoreWatchEvent, StoreWatcher, WatchSource},
    Backend, KvError, StoreConfig,
};
use etcd_client::{
    Client, ConnectOptions, EventType, KeyValue, WatchOptions, WatchStream, Watcher,
};
use snafu::{OptionExt, ResultExt};

pub struct EtcdStore {
    client: Client,
}

impl EtcdStore {
    pub async fn new<E: AsRef<str>, S: AsRef<[E]>>(
        endpoints: S,
        config: &StoreConfig,
    ) -> Result<Self, KvError> {
        let options = config
            .credentials()
            .map(|(user, password)| ConnectOptions::new().with_user(user, password));

        let client = Client::connect(endpoints, options)
            .await
            .context(EtcdConnect {})?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl KvStore for EtcdStore {
    fn backend(&self) -> Backend {
        Backend::Etcd
    }

    async fn get(&mut self, key: &str) -> Result<KvPair, KvError> {
        let response = self.client.get(key, None).await.context(EtcdGet { key })?;
        let kv = response.kvs().first().context(KeyNotFound { key })?;
        Ok(to_pair(key, kv))
    }

    async fn watch(&mut self, key: &str) -> Result<StoreWatcher, KvError> {
        let current = self.get(key).await?;

        // Follow changes made after the revision we just read.
        let options = WatchOptions::new().with_start_revision(current.last_index as i64 + 1);
        let (watcher, stream) = self
            .client
            .watch(key, Some(options))
            .await
            .context(EtcdWatchCreate { key })?;

        let source = EtcdWatchSource {
            key: key.to_string(),
            _watcher: watcher,
            stream,
        };
        Ok(StoreWatcher::with_current(current, Box::new(source)))
    }
}

struct EtcdWatchSource {
    key: String,
    // Dropping the watcher cancels the server-side watch.
    _watcher: Watcher,
    stream: WatchStream,
}

#[async_trait::async_trait]
impl WatchSource for EtcdWatchSource {
    async fn next_events(&mut self) -> Result<Vec<StoreWatchEvent>, KvError> {
        loop {
            let response = match self
                .stream
                .message()
                .await
                .context(EtcdWatch { key: &self.key })?
            {
                Some(r) => r,
                // Stream cancelled, notify the upper-layer listener.
                None => return Ok(Vec::new()),
            };

            if response.canceled() {
                tracing::debug!("etcd watch for key '{}' cancelled by server", self.key);
                return Ok(Vec::new());
            }

            let mut events: Vec<StoreWatchEvent> = Vec::new();
            for e in response.events() {
                match (e.event_type(), e.kv()) {
                    (EventType::Put, Some(kv)) => {
                        events.push(StoreWatchEvent::Put(to_pair(&self.key, kv)));
                    }
                    (EventType::Delete, _) => {
                        events.push(StoreWatchEvent::Delete {
                            key: self.key.clone(),
                        });
                    }
                    _ => {}
                }
            }

            // Report at least one received event.
            if !events.is_empty() {
                return Ok(events);
            }
        }
    }
}

fn to_pair(key: &str, kv: &KeyValue) -> KvPair {
    KvPair::new(key, kv.value().to_vec(), kv.mod_revision() as u64)
}
