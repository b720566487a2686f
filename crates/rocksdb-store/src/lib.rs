//! Rocksdb-backed implementations of the database traits, via `rockbound`
//! schema tables.

pub mod checkpoint;
pub mod header;

pub mod macros;
pub mod utils;

#[cfg(feature = "test_utils")]
pub mod test_utils;

use std::path::Path;
use std::sync::Arc;

use rockbound::schema::ColumnFamilyName;
use rockbound::{rocksdb, OptimisticTransactionDB, Schema};

use crate::checkpoint::schemas::CheckpointSchema;
use crate::header::schemas::{HeaderHeightSchema, HeaderSchema};

pub use checkpoint::db::CheckpointDb;
pub use header::db::HeaderDb;

pub const ROCKSDB_NAME: &str = "chainweb";

pub const STORE_COLUMN_FAMILIES: &[ColumnFamilyName] = &[
    HeaderSchema::COLUMN_FAMILY_NAME,
    HeaderHeightSchema::COLUMN_FAMILY_NAME,
    CheckpointSchema::COLUMN_FAMILY_NAME,
];

/// Database operations configuration.
#[derive(Clone, Copy, Debug)]
pub struct DbOpsConfig {
    pub retry_count: u16,
}

impl DbOpsConfig {
    pub fn new(retry_count: u16) -> Self {
        Self { retry_count }
    }
}

/// Opens (creating if missing) the store database under a data directory.
pub fn open_rocksdb_database(datadir: &Path) -> anyhow::Result<Arc<OptimisticTransactionDB>> {
    let mut opts = rocksdb::Options::default();
    opts.create_if_missing(true);
    opts.create_missing_column_families(true);

    let db = OptimisticTransactionDB::open(
        datadir,
        ROCKSDB_NAME,
        STORE_COLUMN_FAMILIES.iter().map(|s| s.to_string()),
        &opts,
    )?;

    Ok(Arc::new(db))
}
