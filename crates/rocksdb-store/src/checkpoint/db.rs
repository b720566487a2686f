use std::sync::Arc;

use chainweb_db::errors::DbError;
use chainweb_db::traits::CheckpointDatabase;
use chainweb_db::types::{CheckpointKey, CheckpointRecord};
use chainweb_db::DbResult;
use rockbound::{OptimisticTransactionDB, SchemaDBOperationsExt};

use super::schemas::CheckpointSchema;
use crate::DbOpsConfig;

pub struct CheckpointDb {
    db: Arc<OptimisticTransactionDB>,
    _ops: DbOpsConfig,
}

impl CheckpointDb {
    /// Wraps an existing database handle.
    ///
    /// Assumes it was opened with column families as defined in
    /// `STORE_COLUMN_FAMILIES`.
    pub fn new(db: Arc<OptimisticTransactionDB>, ops: DbOpsConfig) -> Self {
        Self { db, _ops: ops }
    }
}

impl CheckpointDatabase for CheckpointDb {
    fn insert_record(&self, key: CheckpointKey, record: CheckpointRecord) -> DbResult<()> {
        // The checkpointer serializes writers per key, so the check-then-put
        // here doesn't race in practice.
        if self.db.get::<CheckpointSchema>(&key)?.is_some() {
            return Err(DbError::OverwriteCheckpoint(key));
        }
        self.db.put::<CheckpointSchema>(&key, &record)?;
        Ok(())
    }

    fn get_record(&self, key: &CheckpointKey) -> DbResult<Option<CheckpointRecord>> {
        Ok(self.db.get::<CheckpointSchema>(key)?)
    }

    fn get_keys_at_height(&self, height: u64) -> DbResult<Vec<CheckpointKey>> {
        // Keys iterate height-major, so everything at one height is
        // contiguous.
        let mut out = Vec::new();
        for res in self.db.iter::<CheckpointSchema>()? {
            let (key, _) = res?.into_tuple();
            if key.height() < height {
                continue;
            }
            if key.height() > height {
                break;
            }
            out.push(key);
        }
        Ok(out)
    }

    fn get_keys_below_height(&self, height: u64) -> DbResult<Vec<CheckpointKey>> {
        let mut out = Vec::new();
        for res in self.db.iter::<CheckpointSchema>()? {
            let (key, _) = res?.into_tuple();
            if key.height() >= height {
                break;
            }
            out.push(key);
        }
        Ok(out)
    }

    fn get_max_height(&self) -> DbResult<Option<u64>> {
        let mut iterator = self.db.iter::<CheckpointSchema>()?;
        iterator.seek_to_last();
        match iterator.rev().next() {
            Some(res) => {
                let (key, _) = res?.into_tuple();
                Ok(Some(key.height()))
            }
            None => Ok(None),
        }
    }

    fn del_record(&self, key: &CheckpointKey) -> DbResult<bool> {
        if self.db.get::<CheckpointSchema>(key)?.is_none() {
            return Ok(false);
        }
        self.db.delete::<CheckpointSchema>(key)?;
        Ok(true)
    }
}

#[cfg(feature = "test_utils")]
#[cfg(test)]
mod tests {
    use chainweb_state::payload::PayloadBody;
    use chainweb_test_utils::ArbitraryGenerator;

    use super::*;
    use crate::test_utils::get_rocksdb_tmp_instance;

    fn setup_db() -> CheckpointDb {
        let (db, db_ops) = get_rocksdb_tmp_instance().unwrap();
        CheckpointDb::new(db, db_ops)
    }

    fn key(height: u64, tag: &[u8]) -> CheckpointKey {
        let body = PayloadBody::new(
            vec![chainweb_state::payload::Transaction::new(tag.to_vec())],
            Vec::new(),
        );
        CheckpointKey::new(height, body.commitment())
    }

    fn record(tag: &str) -> CheckpointRecord {
        CheckpointRecord::new(tag.to_string(), 3, 7)
    }

    #[test]
    fn test_insert_get_roundtrip() {
        let db = setup_db();
        let k: CheckpointKey = ArbitraryGenerator::new().generate();
        let r: CheckpointRecord = ArbitraryGenerator::new().generate();

        assert!(db.get_record(&k).unwrap().is_none());
        db.insert_record(k, r.clone()).unwrap();
        assert_eq!(db.get_record(&k).unwrap().unwrap(), r);
    }

    #[test]
    fn test_insert_refuses_overwrite() {
        let db = setup_db();
        let k = key(1, b"a");

        db.insert_record(k, record("one")).unwrap();
        let res = db.insert_record(k, record("two"));
        assert!(res.is_err_and(|e| matches!(e, DbError::OverwriteCheckpoint(_))));

        // First record is untouched.
        assert_eq!(db.get_record(&k).unwrap().unwrap(), record("one"));
    }

    #[test]
    fn test_height_range_queries() {
        let db = setup_db();
        let k1a = key(1, b"a");
        let k1b = key(1, b"b");
        let k2 = key(2, b"c");
        let k5 = key(5, b"d");

        for k in [k1a, k1b, k2, k5] {
            db.insert_record(k, record("x")).unwrap();
        }

        let at1 = db.get_keys_at_height(1).unwrap();
        assert_eq!(at1.len(), 2);
        assert!(at1.contains(&k1a) && at1.contains(&k1b));

        let below3 = db.get_keys_below_height(3).unwrap();
        assert_eq!(below3.len(), 3);
        assert!(!below3.contains(&k5));

        assert_eq!(db.get_max_height().unwrap(), Some(5));
    }

    #[test]
    fn test_del_record() {
        let db = setup_db();
        let k = key(1, b"a");

        assert!(!db.del_record(&k).unwrap());
        db.insert_record(k, record("x")).unwrap();
        assert!(db.del_record(&k).unwrap());
        assert!(db.get_record(&k).unwrap().is_none());
    }
}
