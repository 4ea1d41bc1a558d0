use crate::{
    common::{ConsulClient, ConsulIndexMissing, ConsulRequest},
    store::{KvPair, KvStore, StoreWatchEvent, StoreWatcher, WatchSource},
    Backend, KvError, StoreConfig,
};
use reqwest::{RequestBuilder, StatusCode};
use snafu::{OptionExt, ResultExt};

const CONSUL_INDEX_HEADER: &str = "X-Consul-Index";
const CONSUL_TOKEN_HEADER: &str = "X-Consul-Token";
/// Upper bound for a single blocking query.
const WATCH_WAIT: &str = "5m";

/// Consul KV access over the HTTP API. Only the first endpoint is used.
#[derive(Clone)]
pub struct ConsulStore {
    client: reqwest::Client,
    address: String,
    config: StoreConfig,
}

impl ConsulStore {
    pub fn new<E: AsRef<str>, S: AsRef<[E]>>(
        endpoints: S,
        config: &StoreConfig,
    ) -> Result<Self, KvError> {
        let endpoint = endpoints
            .as_ref()
            .first()
            .map(|e| e.as_ref().trim_end_matches('/').to_string())
            .ok_or_else(|| KvError::InvalidConfig {
                backend: Backend::Consul,
                reason: String::from("at least one endpoint is required"),
            })?;

        let address = if endpoint.contains("://") {
            endpoint
        } else if config.tls() {
            format!("https://{}", endpoint)
        } else {
            format!("http://{}", endpoint)
        };

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.connection_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder.build().context(ConsulClient {})?;

        Ok(Self {
            client,
            address,
            config: config.clone(),
        })
    }

    /// Probe the agent so that an unreachable endpoint fails at connect time.
    pub async fn connect<E: AsRef<str>, S: AsRef<[E]>>(
        endpoints: S,
        config: &StoreConfig,
    ) -> Result<Self, KvError> {
        let store = Self::new(endpoints, config)?;
        let url = format!("{}/v1/status/leader", store.address);
        store
            .authorize(store.client.get(&url))
            .send()
            .await
            .context(ConsulRequest { key: url })?;
        Ok(store)
    }

    fn authorize(&self, mut request: RequestBuilder) -> RequestBuilder {
        if let Some(token) = self.config.token() {
            request = request.header(CONSUL_TOKEN_HEADER, token);
        }
        if let Some((user, password)) = self.config.credentials() {
            request = request.basic_auth(user, Some(password));
        }
        request
    }

    /// Read the raw value of a key. With `index` set the request becomes a
    /// blocking query that returns once the key changes past that index or
    /// the wait time elapses. `None` means the key doesn't exist.
    async fn read(&self, key: &str, index: Option<u64>) -> Result<Option<KvPair>, KvError> {
        let url = format!("{}/v1/kv/{}", self.address, key);
        let mut request = self.client.get(&url).query(&[("raw", "")]);
        if let Some(index) = index {
            request = request.query(&[("index", index.to_string().as_str()), ("wait", WATCH_WAIT)]);
        }

        let response = self
            .authorize(request)
            .send()
            .await
            .context(ConsulRequest { key })?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            s if !s.is_success() => {
                return Err(KvError::ConsulStatus {
                    key: key.to_string(),
                    status: s.as_u16(),
                })
            }
            _ => {}
        }

        // Blocking queries can't make progress without the index.
        let last_index = response
            .headers()
            .get(CONSUL_INDEX_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .context(ConsulIndexMissing { key })?;
        let value = response.bytes().await.context(ConsulRequest { key })?;

        Ok(Some(KvPair::new(key, value.to_vec(), last_index)))
    }
}

#[async_trait::async_trait]
impl KvStore for ConsulStore {
    fn backend(&self) -> Backend {
        Backend::Consul
    }

    async fn get(&mut self, key: &str) -> Result<KvPair, KvError> {
        self.read(key, None)
            .await?
            .ok_or_else(|| KvError::KeyNotFound {
                key: key.to_string(),
            })
    }

    async fn watch(&mut self, key: &str) -> Result<StoreWatcher, KvError> {
        let current = self.get(key).await?;
        let source = ConsulWatchSource {
            store: self.clone(),
            key: key.to_string(),
            index: current.last_index,
        };
        Ok(StoreWatcher::with_current(current, Box::new(source)))
    }
}

struct ConsulWatchSource {
    store: ConsulStore,
    key: String,
    index: u64,
}

#[async_trait::async_trait]
impl WatchSource for ConsulWatchSource {
    async fn next_events(&mut self) -> Result<Vec<StoreWatchEvent>, KvError> {
        loop {
            let pair = match self.store.read(&self.key, Some(self.index)).await? {
                Some(pair) => pair,
                None => {
                    return Ok(vec![StoreWatchEvent::Delete {
                        key: self.key.clone(),
                    }])
                }
            };

            // Consul may move the index backwards (e.g. after a snapshot
            // restore); start over from scratch in that case.
            if pair.last_index < self.index {
                self.index = 0;
                continue;
            }

            // Wait time elapsed without a change.
            if pair.last_index == self.index {
                continue;
            }

            self.index = pair.last_index;
            return Ok(vec![StoreWatchEvent::Put(pair)]);
        }
    }
}
