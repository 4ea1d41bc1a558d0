mod common;
mod config;
mod data;
mod decode;
mod fetcher;
pub mod registry;
pub mod store;

pub use common::{Backend, KvError, BOLTDB, CONSUL, ETCD, STORE_KEY, ZOOKEEPER};

pub use config::{KvBackend, KvBackendBuilder, StoreConfig, StoreConfigBuilder};

pub use data::{Account, Certificate, Domain, StoredData};

pub use decode::{decode_stored_data, encode_stored_data};

pub use fetcher::{fetch_from_store, StoredDataReceiver};
