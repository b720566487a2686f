//! Durable, queryable view of one chain's header tree.
//!
//! The store pairs the header database with the in-memory [`HeaderTree`]:
//! validation happens against the tree, the header is persisted, and only
//! then does it become visible to queries.  A crash between the persist and
//! the attach is repaired by [`HeaderStore::open`], which rebuilds the tree
//! from the database.

use std::cmp;
use std::collections::HashSet;
use std::sync::Arc;

use chainweb_db::traits::HeaderDatabase;
use chainweb_primitives::chain::{ChainId, ChainwebVersion};
use chainweb_state::header::BlockHeader;
use chainweb_state::id::BlockId;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::errors::{Error, InsertError, TreeError};
use crate::header_tree::{FinalizeReport, HeaderTree};

pub struct HeaderStore<D: HeaderDatabase> {
    db: Arc<D>,
    chain_id: ChainId,
    version: ChainwebVersion,
    genesis_id: BlockId,
    state: RwLock<HeaderTree>,
}

impl<D: HeaderDatabase> HeaderStore<D> {
    /// Creates a store rooted at a genesis header, persisting it.
    pub fn initialize(db: Arc<D>, genesis: BlockHeader) -> Result<Self, InsertError> {
        if genesis.height() != 0 {
            return Err(InsertError::GenesisHeight(genesis.height()));
        }

        db.put_header(genesis.clone())?;

        Ok(Self {
            chain_id: genesis.chain_id(),
            version: genesis.version(),
            genesis_id: genesis.compute_hash(),
            state: RwLock::new(HeaderTree::new_rooted(genesis)),
            db,
        })
    }

    /// Reopens a store over an existing database, rebuilding the fork tree
    /// by ascending height scan.  The tree is rooted back at genesis; any
    /// finalization from the previous run was an in-memory window and is
    /// recomputed by whoever drove it.
    pub fn open(db: Arc<D>, genesis: BlockHeader) -> Result<Self, Error> {
        let genesis_id = genesis.compute_hash();
        if db.get_header(genesis_id)?.is_none() {
            return Err(Error::NotInitialized);
        }

        let mut tree = HeaderTree::new_rooted(genesis.clone());
        let max_height = db.get_max_height()?.unwrap_or(0);
        for height in 1..=max_height {
            for id in db.get_headers_at_height(height)? {
                let Some(header) = db.get_header(id)? else {
                    warn!(%id, height, "height index entry without header");
                    continue;
                };
                if let Err(e) = tree.attach_header(header) {
                    warn!(%id, err = %e, "skipping unattachable header on reload");
                }
            }
        }

        Ok(Self {
            chain_id: genesis.chain_id(),
            version: genesis.version(),
            genesis_id,
            state: RwLock::new(tree),
            db,
        })
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn version(&self) -> ChainwebVersion {
        self.version
    }

    pub fn genesis_id(&self) -> &BlockId {
        &self.genesis_id
    }

    /// Validates a header against its parent and inserts it.
    ///
    /// The header is persisted before it becomes visible in queries, so a
    /// success here means it survives a crash, and a failure means the
    /// store is unchanged.  Re-inserting a known header is a no-op.
    pub fn insert(&self, header: BlockHeader) -> Result<(), InsertError> {
        let id = header.compute_hash();

        if header.chain_id() != self.chain_id {
            return Err(InsertError::WrongChain(
                id,
                header.chain_id(),
                self.chain_id,
            ));
        }
        if header.version() != self.version {
            return Err(InsertError::WrongVersion(
                id,
                header.version(),
                self.version,
            ));
        }

        {
            let state = self.state.read();

            if state.is_known(&id) {
                debug!(%id, "ignoring insert of known header");
                return Ok(());
            }

            let parent = state
                .header(header.parent())
                .ok_or(InsertError::UnknownParent(*header.parent()))?;

            if header.height() != parent.height() + 1 {
                return Err(InsertError::InvalidHeight(
                    id,
                    header.height(),
                    parent.height(),
                ));
            }

            let expected_weight = parent.weight() + header.pow_target().difficulty();
            if header.weight() != expected_weight {
                return Err(InsertError::InvalidDifficulty(id));
            }

            if !header.pow_target().is_met_by(id.into()) {
                return Err(InsertError::InvalidProofOfWork(id));
            }
        }

        // Persist before attaching so the header is never visible without
        // being durable.
        self.db.put_header(header.clone())?;

        let mut state = self.state.write();
        match state.attach_header(header) {
            Ok(_) => Ok(()),
            // The parent was evicted between our validation and the attach.
            Err(TreeError::AttachMissingParent(_, parent)) => {
                Err(InsertError::UnknownParent(parent))
            }
            Err(TreeError::MissingBlock(missing)) => Err(InsertError::UnknownParent(missing)),
        }
    }

    /// Gets a header by id, consulting the in-memory window first and the
    /// database for anything older.
    pub fn lookup(&self, id: &BlockId) -> Result<Option<BlockHeader>, Error> {
        if let Some(h) = self.state.read().header(id) {
            return Ok(Some(h.clone()));
        }
        Ok(self.db.get_header(*id)?)
    }

    fn get_existing(&self, id: &BlockId) -> Result<BlockHeader, Error> {
        self.lookup(id)?.ok_or(Error::MissingBlock(*id))
    }

    /// Current fork tips.
    pub fn leaves(&self) -> Vec<BlockHeader> {
        let state = self.state.read();
        state
            .leaves_iter()
            .map(|id| {
                state
                    .header(id)
                    .expect("headerstore: leaf without entry")
                    .clone()
            })
            .collect()
    }

    /// Picks the best fork tip: highest cumulative weight, ties broken by
    /// lowest header hash.  Deterministic, never by arrival order.
    pub fn best_tip(&self) -> BlockHeader {
        self.leaves()
            .into_iter()
            .max_by_key(|h| (h.weight(), cmp::Reverse(h.compute_hash())))
            .expect("headerstore: no leaves")
    }

    /// Lazy walk from a block back to genesis, fetching headers from the
    /// database.  Restart by calling again.
    pub fn ancestors(&self, id: BlockId) -> AncestorsIter<D> {
        AncestorsIter {
            db: self.db.clone(),
            next: Some(id),
        }
    }

    /// Finds the deepest block the two given blocks both descend from, the
    /// fork point to rewind to when switching branches.
    pub fn common_ancestor(&self, a: &BlockId, b: &BlockId) -> Result<BlockHeader, Error> {
        let mut ha = self.get_existing(a)?;
        let mut hb = self.get_existing(b)?;

        // Equalize heights, then step both sides down in lock step.
        while ha.height() > hb.height() {
            ha = self.get_existing(ha.parent())?;
        }
        while hb.height() > ha.height() {
            hb = self.get_existing(hb.parent())?;
        }
        while ha.compute_hash() != hb.compute_hash() {
            if ha.height() == 0 {
                return Err(Error::NoCommonAncestor(*a, *b));
            }
            ha = self.get_existing(ha.parent())?;
            hb = self.get_existing(hb.parent())?;
        }
        Ok(ha)
    }

    /// Greatest height any stored header has.
    pub fn max_rank(&self) -> Result<u64, Error> {
        self.db.get_max_height()?.ok_or(Error::NotInitialized)
    }

    /// All headers stored at a height, across forks.
    pub fn headers_at_rank(&self, height: u64) -> Result<Vec<BlockHeader>, Error> {
        self.db
            .get_headers_at_height(height)?
            .into_iter()
            .map(|id| self.get_existing(&id))
            .collect()
    }

    /// Blocks below the given one in the retained window.
    pub fn descendants(&self, id: &BlockId) -> Result<HashSet<BlockId>, Error> {
        let state = self.state.read();
        if !state.is_known(id) {
            return Err(Error::MissingBlock(*id));
        }
        Ok(state.get_all_descendants(id))
    }

    /// Re-roots the in-memory window at a deeply buried block, evicting
    /// competing branches.  Durable headers are retained.
    pub fn finalize(&self, id: &BlockId) -> Result<FinalizeReport, Error> {
        let mut state = self.state.write();
        Ok(state.reroot_to(id)?)
    }
}

/// Iterator the store hands out for ancestor walks.  Yields the starting
/// block first and ends after genesis.
pub struct AncestorsIter<D: HeaderDatabase> {
    db: Arc<D>,
    next: Option<BlockId>,
}

impl<D: HeaderDatabase> Iterator for AncestorsIter<D> {
    type Item = Result<BlockHeader, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next.take()?;
        match self.db.get_header(id) {
            Ok(Some(header)) => {
                if !header.parent().is_null() {
                    self.next = Some(*header.parent());
                }
                Some(Ok(header))
            }
            Ok(None) => Some(Err(Error::MissingBlock(id))),
            Err(e) => Some(Err(e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chainweb_primitives::pow::Target;
    use chainweb_rocksdb::test_utils::get_rocksdb_tmp_instance;
    use chainweb_rocksdb::HeaderDb;
    use chainweb_state::payload::{PayloadBody, Transaction};
    use chainweb_test_utils::chain::{gen_chain, gen_child, gen_genesis, mine};

    use super::*;

    fn setup_store() -> (HeaderStore<HeaderDb>, BlockHeader, Arc<HeaderDb>) {
        let (db, ops) = get_rocksdb_tmp_instance().unwrap();
        let hdb = Arc::new(HeaderDb::new(db, ops));
        let genesis = gen_genesis(0);
        let store = HeaderStore::initialize(hdb.clone(), genesis.clone()).unwrap();
        (store, genesis, hdb)
    }

    #[test]
    fn test_initialize_rejects_nonzero_genesis() {
        let (db, ops) = get_rocksdb_tmp_instance().unwrap();
        let hdb = Arc::new(HeaderDb::new(db, ops));
        let g = gen_genesis(0);
        let child = gen_child(&g, 1);

        let res = HeaderStore::initialize(hdb, child);
        assert!(matches!(res, Err(InsertError::GenesisHeight(1))));
    }

    #[test]
    fn test_linkage_invariant() {
        let (store, g, _) = setup_store();
        let chain = gen_chain(&g, 4, 0);
        for h in &chain {
            store.insert(h.clone()).unwrap();
        }

        for h in &chain {
            let parent = store.lookup(h.parent()).unwrap().unwrap();
            assert_eq!(parent.height() + 1, h.height());
        }
    }

    #[test]
    fn test_insert_unknown_parent() {
        let (store, g, _) = setup_store();
        let detached = gen_child(&g, 1);
        let orphan = gen_child(&detached, 2);

        let res = store.insert(orphan);
        assert!(matches!(res, Err(InsertError::UnknownParent(_))));
    }

    #[test]
    fn test_insert_invalid_height() {
        let (store, g, _) = setup_store();
        let mut bad = gen_child(&g, 1);
        bad = BlockHeader::new(
            *bad.parent(),
            *bad.payload_hash(),
            5,
            bad.creation_time(),
            bad.pow_target(),
            bad.weight(),
            bad.nonce(),
            bad.chain_id(),
            bad.version(),
            Vec::new(),
        );

        let res = store.insert(bad);
        assert!(matches!(res, Err(InsertError::InvalidHeight(_, 5, 0))));
    }

    #[test]
    fn test_insert_invalid_weight() {
        let (store, g, _) = setup_store();
        let good = gen_child(&g, 1);
        let bad = BlockHeader::new(
            *good.parent(),
            *good.payload_hash(),
            good.height(),
            good.creation_time(),
            good.pow_target(),
            g.weight(), // dropped the edge difficulty
            good.nonce(),
            good.chain_id(),
            good.version(),
            Vec::new(),
        );

        let res = store.insert(bad);
        assert!(matches!(res, Err(InsertError::InvalidDifficulty(_))));
    }

    #[test]
    fn test_insert_invalid_pow() {
        let (store, g, _) = setup_store();
        // A one-in-2^248 target that no un-mined header meets.
        let tight = Target::from_be_buf({
            let mut a = [0u8; 32];
            a[31] = 1;
            a.into()
        });
        let bad = BlockHeader::new(
            g.compute_hash(),
            PayloadBody::empty().commitment(),
            1,
            g.creation_time() + 1,
            tight,
            g.weight() + tight.difficulty(),
            0,
            g.chain_id(),
            g.version(),
            Vec::new(),
        );

        let res = store.insert(bad);
        assert!(matches!(res, Err(InsertError::InvalidProofOfWork(_))));
    }

    #[test]
    fn test_insert_duplicate_noop() {
        let (store, g, _) = setup_store();
        let a = gen_child(&g, 1);
        store.insert(a.clone()).unwrap();
        store.insert(a.clone()).unwrap();
        assert_eq!(store.leaves().len(), 1);
    }

    #[test]
    fn test_fork_leaves_and_common_ancestor() {
        let (store, g, _) = setup_store();
        let a = gen_child(&g, 1);
        let b = gen_child(&g, 2);

        store.insert(a.clone()).unwrap();
        store.insert(b.clone()).unwrap();

        let leaves: HashSet<_> = store.leaves().iter().map(|h| h.compute_hash()).collect();
        assert_eq!(
            leaves,
            HashSet::from_iter([a.compute_hash(), b.compute_hash()])
        );

        let anc = store
            .common_ancestor(&a.compute_hash(), &b.compute_hash())
            .unwrap();
        assert_eq!(anc.compute_hash(), g.compute_hash());
    }

    #[test]
    fn test_common_ancestor_uneven_branches() {
        let (store, g, _) = setup_store();
        let a_chain = gen_chain(&g, 3, 10);
        let b_chain = gen_chain(&a_chain[0], 1, 20);
        for h in a_chain.iter().chain(b_chain.iter()) {
            store.insert(h.clone()).unwrap();
        }

        let anc = store
            .common_ancestor(&a_chain[2].compute_hash(), &b_chain[0].compute_hash())
            .unwrap();
        assert_eq!(anc.compute_hash(), a_chain[0].compute_hash());
    }

    #[test]
    fn test_best_tip_prefers_weight() {
        let (store, g, _) = setup_store();
        let long = gen_chain(&g, 3, 10);
        let short = gen_chain(&g, 1, 20);
        for h in long.iter().chain(short.iter()) {
            store.insert(h.clone()).unwrap();
        }

        assert_eq!(
            store.best_tip().compute_hash(),
            long[2].compute_hash()
        );
    }

    #[test]
    fn test_best_tip_tie_breaks_by_lowest_hash() {
        let (store, g, _) = setup_store();
        let a = gen_child(&g, 1);
        let b = gen_child(&g, 2);
        assert_eq!(a.weight(), b.weight());

        store.insert(a.clone()).unwrap();
        store.insert(b.clone()).unwrap();

        let expected = cmp::min(a.compute_hash(), b.compute_hash());
        assert_eq!(store.best_tip().compute_hash(), expected);
    }

    #[test]
    fn test_fork_commutativity() {
        // Same header set, two valid topological insertion orders.
        let g = gen_genesis(0);
        let a_chain = gen_chain(&g, 2, 10);
        let b_chain = gen_chain(&g, 2, 20);

        let build = |order: Vec<&BlockHeader>| {
            let (db, ops) = get_rocksdb_tmp_instance().unwrap();
            let hdb = Arc::new(HeaderDb::new(db, ops));
            let store = HeaderStore::initialize(hdb, g.clone()).unwrap();
            for h in order {
                store.insert(h.clone()).unwrap();
            }
            store
        };

        let s1 = build(vec![&a_chain[0], &a_chain[1], &b_chain[0], &b_chain[1]]);
        let s2 = build(vec![&b_chain[0], &a_chain[0], &b_chain[1], &a_chain[1]]);

        let leaves1: HashSet<_> = s1.leaves().iter().map(|h| h.compute_hash()).collect();
        let leaves2: HashSet<_> = s2.leaves().iter().map(|h| h.compute_hash()).collect();
        assert_eq!(leaves1, leaves2);
        assert_eq!(
            s1.best_tip().compute_hash(),
            s2.best_tip().compute_hash()
        );

        let a_tip = a_chain[1].compute_hash();
        let b_tip = b_chain[1].compute_hash();
        assert_eq!(
            s1.common_ancestor(&a_tip, &b_tip).unwrap().compute_hash(),
            s2.common_ancestor(&a_tip, &b_tip).unwrap().compute_hash(),
        );
    }

    #[test]
    fn test_ancestors_iter() {
        let (store, g, _) = setup_store();
        let chain = gen_chain(&g, 3, 0);
        for h in &chain {
            store.insert(h.clone()).unwrap();
        }

        let walked: Vec<_> = store
            .ancestors(chain[2].compute_hash())
            .map(|r| r.unwrap().compute_hash())
            .collect();
        assert_eq!(
            walked,
            vec![
                chain[2].compute_hash(),
                chain[1].compute_hash(),
                chain[0].compute_hash(),
                g.compute_hash(),
            ]
        );

        // Restartable: a fresh iterator walks the same path.
        let again: Vec<_> = store
            .ancestors(chain[2].compute_hash())
            .map(|r| r.unwrap().compute_hash())
            .collect();
        assert_eq!(walked, again);
    }

    #[test]
    fn test_rank_queries() {
        let (store, g, _) = setup_store();
        let a_chain = gen_chain(&g, 2, 10);
        let b = gen_child(&g, 20);
        for h in a_chain.iter().chain([&b]) {
            store.insert(h.clone()).unwrap();
        }

        assert_eq!(store.max_rank().unwrap(), 2);
        let at1: HashSet<_> = store
            .headers_at_rank(1)
            .unwrap()
            .iter()
            .map(|h| h.compute_hash())
            .collect();
        assert_eq!(
            at1,
            HashSet::from_iter([a_chain[0].compute_hash(), b.compute_hash()])
        );
    }

    #[test]
    fn test_descendants() {
        let (store, g, _) = setup_store();
        let a_chain = gen_chain(&g, 2, 10);
        let b = gen_child(&g, 20);
        for h in a_chain.iter().chain([&b]) {
            store.insert(h.clone()).unwrap();
        }

        assert_eq!(
            store.descendants(&a_chain[0].compute_hash()).unwrap(),
            HashSet::from_iter([a_chain[1].compute_hash()])
        );
    }

    #[test]
    fn test_finalize_evicts_competing_fork() {
        let (store, g, _) = setup_store();
        let a_chain = gen_chain(&g, 2, 10);
        let c = gen_child(&g, 30);
        for h in a_chain.iter().chain([&c]) {
            store.insert(h.clone()).unwrap();
        }

        let report = store.finalize(&a_chain[0].compute_hash()).unwrap();
        assert_eq!(report.rejected(), &[c.compute_hash()]);

        let leaves: HashSet<_> = store.leaves().iter().map(|h| h.compute_hash()).collect();
        assert_eq!(leaves, HashSet::from_iter([a_chain[1].compute_hash()]));

        // Durable history is retained even for the rejected fork.
        assert!(store.lookup(&c.compute_hash()).unwrap().is_some());
    }

    #[test]
    fn test_open_rebuilds_tree() {
        let (db, ops) = get_rocksdb_tmp_instance().unwrap();
        let hdb = Arc::new(HeaderDb::new(db, ops));
        let g = gen_genesis(0);

        let before = {
            let store = HeaderStore::initialize(hdb.clone(), g.clone()).unwrap();
            let a_chain = gen_chain(&g, 3, 10);
            let b = gen_child(&g, 20);
            for h in a_chain.iter().chain([&b]) {
                store.insert(h.clone()).unwrap();
            }
            let leaves: HashSet<_> = store.leaves().iter().map(|h| h.compute_hash()).collect();
            (leaves, store.best_tip().compute_hash())
        };

        let reopened = HeaderStore::open(hdb, g).unwrap();
        let leaves: HashSet<_> = reopened.leaves().iter().map(|h| h.compute_hash()).collect();
        assert_eq!(leaves, before.0);
        assert_eq!(reopened.best_tip().compute_hash(), before.1);
    }

    #[test]
    fn test_open_requires_genesis() {
        let (db, ops) = get_rocksdb_tmp_instance().unwrap();
        let hdb = Arc::new(HeaderDb::new(db, ops));
        let res = HeaderStore::open(hdb, gen_genesis(0));
        assert!(matches!(res, Err(Error::NotInitialized)));
    }

    #[test]
    fn test_wrong_chain_rejected() {
        let (store, _, _) = setup_store();
        let other_g = gen_genesis(1);
        let stray = gen_child(&other_g, 1);
        let res = store.insert(stray);
        assert!(matches!(res, Err(InsertError::WrongChain(_, _, _))));
    }

    #[test]
    fn test_weight_monotone_along_path() {
        let (store, g, _) = setup_store();
        let chain = gen_chain(&g, 4, 0);
        for h in &chain {
            store.insert(h.clone()).unwrap();
        }

        let tip = store.best_tip();
        let headers: Vec<_> = store
            .ancestors(tip.compute_hash())
            .map(|r| r.unwrap())
            .collect();
        // Walk is tip -> genesis, so weight strictly decreases by each
        // edge's difficulty.
        for pair in headers.windows(2) {
            let (child, parent) = (&pair[0], &pair[1]);
            assert_eq!(
                child.weight(),
                parent.weight() + child.pow_target().difficulty()
            );
            assert!(child.weight() > parent.weight());
        }
    }

    #[test]
    fn test_mine_on_tight_target() {
        // Sanity-check the miner helper against a non-trivial target.
        let g = gen_genesis(0);
        let easyish = Target::from_be_buf({
            let mut a = [0xffu8; 32];
            a[0] = 0x0f; // 1 in 16 hashes pass
            a.into()
        });
        let header = BlockHeader::new(
            g.compute_hash(),
            PayloadBody::empty().commitment(),
            1,
            g.creation_time() + 1,
            easyish,
            g.weight() + easyish.difficulty(),
            0,
            g.chain_id(),
            g.version(),
            Vec::new(),
        );
        let mined = mine(header);
        assert!(mined.check_pow());
    }
}
