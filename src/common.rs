use snafu::Snafu;
use std::{fmt, str::FromStr, time::Duration};

/// Well-known key holding the gzip-compressed ACME account object.
pub const STORE_KEY: &str = "traefik/acme/account/object";

pub const CONSUL: &str = "consul";
pub const ETCD: &str = "etcd";
pub const ZOOKEEPER: &str = "zookeeper";
pub const BOLTDB: &str = "boltdb";

/// Key/value store implementations the fetcher can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Consul,
    Etcd,
    Zookeeper,
    BoltDb,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Consul => CONSUL,
            Self::Etcd => ETCD,
            Self::Zookeeper => ZOOKEEPER,
            Self::BoltDb => BOLTDB,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = KvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            CONSUL => Ok(Self::Consul),
            ETCD => Ok(Self::Etcd),
            ZOOKEEPER => Ok(Self::Zookeeper),
            BOLTDB => Ok(Self::BoltDb),
            _ => Err(KvError::UnsupportedBackend {
                name: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility = "pub(crate)")]
pub enum KvError {
    /// Backend name doesn't match any known store.
    #[snafu(display("No backend found for {}", name))]
    UnsupportedBackend { name: String },

    /// Backend can't be used with the supplied endpoints or configuration.
    #[snafu(display("Invalid configuration for backend {}: {}", backend, reason))]
    InvalidConfig { backend: Backend, reason: String },

    /// Connection didn't complete within the configured timeout.
    #[snafu(display("Timed out connecting to {} after {:?}", backend, timeout))]
    ConnectTimeout { backend: Backend, timeout: Duration },

    /// Failed to connect to etcd.
    #[snafu(display("Failed to connect to etcd. Error={}", source))]
    EtcdConnect { source: etcd_client::Error },

    /// Failed to read a key from etcd.
    #[snafu(display("Failed to get key '{}' from etcd. Error={}", key, source))]
    EtcdGet {
        key: String,
        source: etcd_client::Error,
    },

    /// Failed to create an etcd watcher.
    #[snafu(display("Failed to create etcd watcher for key '{}'. Error={}", key, source))]
    EtcdWatchCreate {
        key: String,
        source: etcd_client::Error,
    },

    /// Error received from an etcd watch stream.
    #[snafu(display("Failed to watch etcd key '{}'. Error={}", key, source))]
    EtcdWatch {
        key: String,
        source: etcd_client::Error,
    },

    /// Consul HTTP client couldn't be built.
    #[snafu(display("Failed to set up Consul client. Error={}", source))]
    ConsulClient { source: reqwest::Error },

    /// HTTP request to Consul failed.
    #[snafu(display("Consul request for key '{}' failed. Error={}", key, source))]
    ConsulRequest { key: String, source: reqwest::Error },

    /// Consul answered with an unexpected status.
    #[snafu(display("Consul returned status {} for key '{}'", status, key))]
    ConsulStatus { key: String, status: u16 },

    /// Consul answered without a usable modification index.
    #[snafu(display("Consul response for key '{}' carries no valid X-Consul-Index", key))]
    ConsulIndexMissing { key: String },

    /// Failed to open a ZooKeeper session.
    #[snafu(display("Failed to connect to ZooKeeper at {}. Error={}", cluster, source))]
    ZkConnect {
        cluster: String,
        source: zookeeper_client::Error,
    },

    /// Failed to read a znode.
    #[snafu(display("Failed to get znode '{}'. Error={}", path, source))]
    ZkGet {
        path: String,
        source: zookeeper_client::Error,
    },

    /// Failed to open the embedded database or its bucket.
    #[snafu(display("Failed to open BoltDB store '{}'. Error={}", path, source))]
    BoltOpen { path: String, source: sled::Error },

    /// Failed to read from the embedded database.
    #[snafu(display("Failed to get key '{}' from BoltDB store. Error={}", key, source))]
    BoltGet { key: String, source: sled::Error },

    /// Key is absent from the store.
    #[snafu(display("Could not fetch Key/Value pair for key {}", key))]
    KeyNotFound { key: String },

    /// Value is not valid gzip data.
    #[snafu(display("Failed to decompress value. Error={}", source))]
    DecompressValue { source: std::io::Error },

    /// Failed to compress value.
    #[snafu(display("Failed to compress value. Error={}", source))]
    CompressValue { source: std::io::Error },

    /// Decompressed value doesn't match the record shape.
    #[snafu(display("Failed to deserialize value. Error={}", source))]
    DeserializeValue { source: serde_json::Error },

    /// Failed to serialize value to JSON.
    #[snafu(display("Failed to serialize value. Error={}", source))]
    SerializeValue { source: serde_json::Error },
}

impl KvError {
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound { .. })
    }
}
