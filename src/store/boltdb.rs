use crate::{
    common::{BoltGet, BoltOpen},
    store::{KvPair, KvStore, StoreWatchEvent, StoreWatcher, WatchSource},
    Backend, KvError,
};
use sled::{Event, Subscriber, Tree};
use snafu::ResultExt;
use std::{fs::File, io::Read, path::Path};

/// Magic number stored in the meta pages of a bbolt database file.
const BBOLT_MAGIC: u32 = 0xED0C_DAED;
/// Meta page layout: 16-byte page header, then the magic number.
const BBOLT_MAGIC_OFFSET: usize = 16;

/// Embedded store kept in a sled database directory. A bucket maps to a
/// named tree of the database.
///
/// Only sled-format stores can be read. Single-file BoltDB (bbolt) databases
/// are rejected with `KvError::InvalidConfig` when the store is opened.
pub struct BoltStore {
    tree: Tree,
}

impl BoltStore {
    pub fn open(path: impl AsRef<Path>, bucket: &str) -> Result<Self, KvError> {
        let path = path.as_ref();
        check_store_path(path)?;

        let db = sled::open(path).context(BoltOpen {
            path: path.display().to_string(),
        })?;
        let tree = db.open_tree(bucket).context(BoltOpen {
            path: format!("{}:{}", path.display(), bucket),
        })?;

        tracing::debug!("Opened bucket '{}' in {}", bucket, path.display());
        Ok(Self { tree })
    }

    /// Wrap a tree opened elsewhere in the process.
    pub fn from_tree(tree: Tree) -> Self {
        Self { tree }
    }
}

/// sled keeps its data in a directory; any regular file at `path` belongs to
/// some other format.
fn check_store_path(path: &Path) -> Result<(), KvError> {
    if !path.is_file() {
        return Ok(());
    }

    let reason = if is_bbolt_file(path) {
        format!(
            "{} is a BoltDB (bbolt) file, only sled-format stores are supported",
            path.display()
        )
    } else {
        format!(
            "{} is a file, only sled-format store directories are supported",
            path.display()
        )
    };

    Err(KvError::InvalidConfig {
        backend: Backend::BoltDb,
        reason,
    })
}

fn is_bbolt_file(path: &Path) -> bool {
    let mut header = [0u8; BBOLT_MAGIC_OFFSET + 4];
    match File::open(path).and_then(|mut f| f.read_exact(&mut header)) {
        Ok(()) => {
            let mut magic = [0u8; 4];
            magic.copy_from_slice(&header[BBOLT_MAGIC_OFFSET..]);
            u32::from_le_bytes(magic) == BBOLT_MAGIC
        }
        Err(_) => false,
    }
}

#[async_trait::async_trait]
impl KvStore for BoltStore {
    fn backend(&self) -> Backend {
        Backend::BoltDb
    }

    async fn get(&mut self, key: &str) -> Result<KvPair, KvError> {
        match self.tree.get(key).context(BoltGet { key })? {
            Some(value) => Ok(KvPair::new(key, value.to_vec(), 0)),
            None => Err(KvError::KeyNotFound {
                key: key.to_string(),
            }),
        }
    }

    async fn watch(&mut self, key: &str) -> Result<StoreWatcher, KvError> {
        // Subscribe before reading so no update slips in between.
        let subscriber = self.tree.watch_prefix(key);
        let current = self.get(key).await?;

        let source = BoltWatchSource {
            key: key.to_string(),
            subscriber,
            index: current.last_index,
        };
        Ok(StoreWatcher::with_current(current, Box::new(source)))
    }
}

struct BoltWatchSource {
    key: String,
    subscriber: Subscriber,
    /// Local change counter, sled doesn't version entries.
    index: u64,
}

#[async_trait::async_trait]
impl WatchSource for BoltWatchSource {
    async fn next_events(&mut self) -> Result<Vec<StoreWatchEvent>, KvError> {
        // The subscription covers every key sharing our prefix.
        while let Some(event) = (&mut self.subscriber).await {
            match event {
                Event::Insert { key, value } if key.as_ref() == self.key.as_bytes() => {
                    self.index += 1;
                    return Ok(vec![StoreWatchEvent::Put(KvPair::new(
                        self.key.as_str(),
                        value.to_vec(),
                        self.index,
                    ))]);
                }
                Event::Remove { key } if key.as_ref() == self.key.as_bytes() => {
                    return Ok(vec![StoreWatchEvent::Delete {
                        key: self.key.clone(),
                    }]);
                }
                _ => continue,
            }
        }

        Ok(Vec::new())
    }
}
