use acmekv::encode_stored_data;
use serde::Serialize;
use tempfile::TempDir;

pub const BUCKET: &str = "traefik";

/// Embedded database living in a temporary directory.
pub struct BoltFixture {
    dir: TempDir,
}

impl BoltFixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create temporary directory"),
        }
    }

    pub fn dir_path(&self) -> &std::path::Path {
        self.dir.path()
    }

    pub fn db_path(&self) -> String {
        self.dir.path().join("acme.db").display().to_string()
    }

    /// Store `value` under `key` the way the ACME provider does, then release the database.
    pub fn seed<V: Serialize>(&self, key: &str, value: &V) {
        let db = sled::open(self.db_path()).expect("Failed to open database");
        let tree = db.open_tree(BUCKET).expect("Failed to open bucket");
        tree.insert(key, encode_stored_data(value).unwrap())
            .expect("Failed to seed value");
        db.flush().expect("Failed to flush database");
    }

    /// Keep the database open, for tests that write while a watch is running.
    pub fn open_tree(&self) -> sled::Tree {
        sled::open(self.db_path())
            .and_then(|db| db.open_tree(BUCKET))
            .expect("Failed to open bucket")
    }
}
