/// Raw entry read from a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct KvPair {
    pub key: String,
    pub value: Vec<u8>,
    /// Backend-specific modification index (etcd revision, Consul index, znode mzxid).
    pub last_index: u64,
}

impl KvPair {
    pub fn new(key: impl Into<String>, value: Vec<u8>, last_index: u64) -> Self {
        Self {
            key: key.into(),
            value,
            last_index,
        }
    }
}

#[derive(Debug)]
pub enum StoreWatchEvent {
    Put(KvPair),
    Delete { key: String },
}
