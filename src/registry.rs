use crate::{
    store::{BoltStore, ConsulStore, EtcdStore, KvStore, ZkStore},
    Backend, KvError, StoreConfig,
};

/// Resolve a backend by its name (`consul`, `etcd`, `zookeeper`, `boltdb`).
pub fn register(name: &str) -> Result<Backend, KvError> {
    let backend = name.parse::<Backend>()?;
    tracing::debug!("Using {} key-value store backend", backend);
    Ok(backend)
}

/// Open a connection to the given backend. When the configuration carries a
/// connection timeout, the whole connection phase is bounded by it.
pub async fn connect(
    backend: Backend,
    endpoints: &[String],
    config: &StoreConfig,
) -> Result<Box<dyn KvStore>, KvError> {
    if endpoints.is_empty() {
        return Err(invalid_config(backend, "at least one endpoint is required"));
    }
    if config.tls() && matches!(backend, Backend::Etcd | Backend::Zookeeper) {
        return Err(invalid_config(
            backend,
            "TLS connections are only supported by the consul backend",
        ));
    }

    match config.connection_timeout() {
        Some(timeout) => tokio::time::timeout(timeout, connect_store(backend, endpoints, config))
            .await
            .map_err(|_| KvError::ConnectTimeout { backend, timeout })?,
        None => connect_store(backend, endpoints, config).await,
    }
}

async fn connect_store(
    backend: Backend,
    endpoints: &[String],
    config: &StoreConfig,
) -> Result<Box<dyn KvStore>, KvError> {
    tracing::debug!("Connecting to {} at {:?}", backend, endpoints);

    let store: Box<dyn KvStore> = match backend {
        Backend::Consul => Box::new(ConsulStore::connect(endpoints, config).await?),
        Backend::Etcd => Box::new(EtcdStore::new(endpoints, config).await?),
        Backend::Zookeeper => Box::new(ZkStore::new(endpoints).await?),
        Backend::BoltDb => {
            let path = match endpoints {
                [path] => path,
                _ => {
                    return Err(invalid_config(
                        backend,
                        "exactly one endpoint (the database file path) is required",
                    ))
                }
            };
            let bucket = config
                .bucket()
                .ok_or_else(|| invalid_config(backend, "a bucket must be configured"))?;
            Box::new(BoltStore::open(path, bucket)?)
        }
    };

    Ok(store)
}

fn invalid_config(backend: Backend, reason: &str) -> KvError {
    KvError::InvalidConfig {
        backend,
        reason: reason.to_string(),
    }
}
