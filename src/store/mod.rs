mod boltdb;
mod common;
mod consul;
mod etcd;
mod store;
mod watcher;
mod zookeeper;

#[cfg(test)]
pub(crate) mod testing;

pub use boltdb::BoltStore;
pub use common::{KvPair, StoreWatchEvent};
pub use consul::ConsulStore;
pub use etcd::EtcdStore;
pub use store::KvStore;
pub use watcher::{StoreWatcher, WatchSource};
pub use zookeeper::ZkStore;
