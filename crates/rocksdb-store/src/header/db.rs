use std::sync::Arc;

use chainweb_db::traits::HeaderDatabase;
use chainweb_db::DbResult;
use chainweb_state::header::BlockHeader;
use chainweb_state::id::BlockId;
use rockbound::{OptimisticTransactionDB, SchemaBatch, SchemaDBOperationsExt};

use super::schemas::{HeaderHeightSchema, HeaderSchema};
use crate::utils::get_last_idx;
use crate::DbOpsConfig;

pub struct HeaderDb {
    db: Arc<OptimisticTransactionDB>,
    _ops: DbOpsConfig,
}

impl HeaderDb {
    /// Wraps an existing database handle.
    ///
    /// Assumes it was opened with column families as defined in
    /// `STORE_COLUMN_FAMILIES`.
    pub fn new(db: Arc<OptimisticTransactionDB>, ops: DbOpsConfig) -> Self {
        Self { db, _ops: ops }
    }
}

impl HeaderDatabase for HeaderDb {
    fn put_header(&self, header: BlockHeader) -> DbResult<()> {
        let id = header.compute_hash();

        // Headers are content-addressed, so a second write of the same id
        // can only carry identical bytes.
        if self.db.get::<HeaderSchema>(&id)?.is_some() {
            return Ok(());
        }

        let height = header.height();
        let mut at_height = self
            .db
            .get::<HeaderHeightSchema>(&height)?
            .unwrap_or_default();
        if !at_height.contains(&id) {
            at_height.push(id);
        }

        // Both tables land in one batch so a crash can't leave the height
        // index out of step with the header table.
        let mut batch = SchemaBatch::new();
        batch.put::<HeaderSchema>(&id, &header)?;
        batch.put::<HeaderHeightSchema>(&height, &at_height)?;
        self.db.write_schemas(batch)?;

        Ok(())
    }

    fn get_header(&self, id: BlockId) -> DbResult<Option<BlockHeader>> {
        Ok(self.db.get::<HeaderSchema>(&id)?)
    }

    fn get_headers_at_height(&self, height: u64) -> DbResult<Vec<BlockId>> {
        Ok(self
            .db
            .get::<HeaderHeightSchema>(&height)?
            .unwrap_or_default())
    }

    fn get_max_height(&self) -> DbResult<Option<u64>> {
        get_last_idx::<HeaderHeightSchema>(&self.db)
    }
}

#[cfg(feature = "test_utils")]
#[cfg(test)]
mod tests {
    use chainweb_primitives::chain::{ChainId, ChainwebVersion};
    use chainweb_state::genesis::make_genesis_header;
    use chainweb_state::payload::PayloadBody;
    use chainweb_test_utils::ArbitraryGenerator;

    use super::*;
    use crate::test_utils::get_rocksdb_tmp_instance;

    fn setup_db() -> HeaderDb {
        let (db, db_ops) = get_rocksdb_tmp_instance().unwrap();
        HeaderDb::new(db, db_ops)
    }

    fn child_of(parent: &BlockHeader, nonce: u64) -> BlockHeader {
        BlockHeader::new_child(
            parent,
            PayloadBody::empty().commitment(),
            parent.creation_time() + 1,
            nonce,
            Vec::new(),
        )
    }

    #[test]
    fn test_put_get_roundtrip() {
        // Nothing validates at this level, so an arbitrary header goes
        // through like any other.
        let db = setup_db();
        let header: BlockHeader = ArbitraryGenerator::new().generate();
        let id = header.compute_hash();

        assert!(db.get_header(id).unwrap().is_none());
        db.put_header(header.clone()).unwrap();
        assert_eq!(db.get_header(id).unwrap().unwrap(), header);
    }

    #[test]
    fn test_height_index_tracks_forks() {
        let db = setup_db();
        let g = make_genesis_header(ChainwebVersion::Devnet, ChainId(0));
        let a = child_of(&g, 1);
        let b = child_of(&g, 2);

        db.put_header(g.clone()).unwrap();
        db.put_header(a.clone()).unwrap();
        db.put_header(b.clone()).unwrap();

        let at1 = db.get_headers_at_height(1).unwrap();
        assert_eq!(at1.len(), 2);
        assert!(at1.contains(&a.compute_hash()));
        assert!(at1.contains(&b.compute_hash()));
    }

    #[test]
    fn test_put_idempotent() {
        let db = setup_db();
        let g = make_genesis_header(ChainwebVersion::Devnet, ChainId(0));

        db.put_header(g.clone()).unwrap();
        db.put_header(g.clone()).unwrap();

        assert_eq!(db.get_headers_at_height(0).unwrap().len(), 1);
    }

    #[test]
    fn test_max_height() {
        let db = setup_db();
        assert_eq!(db.get_max_height().unwrap(), None);

        let g = make_genesis_header(ChainwebVersion::Devnet, ChainId(0));
        db.put_header(g.clone()).unwrap();
        assert_eq!(db.get_max_height().unwrap(), Some(0));

        let a = child_of(&g, 1);
        db.put_header(a.clone()).unwrap();
        db.put_header(child_of(&a, 2)).unwrap();
        assert_eq!(db.get_max_height().unwrap(), Some(2));
    }
}
