pub mod boltdb;

use acmekv::{KvBackend, StoreConfig};
use boltdb::{BoltFixture, BUCKET};

impl BoltFixture {
    // Helper function to generate a backend descriptor for this database.
    pub fn as_kv_backend(&self) -> KvBackend {
        let config = StoreConfig::builder().with_bucket(BUCKET).build();

        KvBackend::builder()
            .with_name(acmekv::BOLTDB)
            .with_endpoints([self.db_path()])
            .with_config(config)
            .build()
    }
}
