//! In-memory tree of the unpruned part of a chain's header graph.

use std::collections::*;

use chainweb_state::header::BlockHeader;
use chainweb_state::id::BlockId;
use tracing::warn;

use crate::errors::TreeError;

/// Entry in the tree table relating a block with its immediate relatives.
struct BlockEntry {
    header: BlockHeader,
    children: HashSet<BlockId>,
}

/// Tracks the tree of headers above the pruned base.  The root is genesis
/// until the store is re-rooted by finalization.
pub struct HeaderTree {
    /// Block all other entries descend from.
    root: BlockId,

    /// Table of blocks in the retained window.
    entries: HashMap<BlockId, BlockEntry>,

    /// Current fork tips.  This includes the root if it has no children.
    leaves: HashSet<BlockId>,
}

impl HeaderTree {
    /// Creates a new tree holding just the root block.
    pub fn new_rooted(root_header: BlockHeader) -> Self {
        let root = root_header.compute_hash();

        let mut entries = HashMap::new();
        entries.insert(
            root,
            BlockEntry {
                header: root_header,
                children: HashSet::new(),
            },
        );

        let mut leaves = HashSet::new();
        leaves.insert(root);
        Self {
            root,
            entries,
            leaves,
        }
    }

    pub fn root(&self) -> &BlockId {
        &self.root
    }

    /// Returns `true` if the block is in the retained window.
    pub fn is_known(&self, id: &BlockId) -> bool {
        self.entries.contains_key(id)
    }

    /// Gets a header from within the tree.
    pub fn header(&self, id: &BlockId) -> Option<&BlockHeader> {
        self.entries.get(id).map(|ent| &ent.header)
    }

    /// Gets the parent of a block from within the tree.  Returns `None` for
    /// the root, since its parent is outside the window.
    pub fn parent_of(&self, id: &BlockId) -> Option<&BlockId> {
        if *id == self.root {
            return None;
        }
        self.entries.get(id).map(|ent| ent.header.parent())
    }

    /// Returns an iterator over the current fork tips.
    pub fn leaves_iter(&self) -> impl Iterator<Item = &BlockId> {
        self.leaves.iter()
    }

    /// Checks if the block is traceable all the way back to the root.
    fn is_linked_to_root(&self, id: &BlockId) -> bool {
        if *id == self.root {
            return true;
        }

        if let Some(ent) = self.entries.get(id) {
            self.is_linked_to_root(ent.header.parent())
        } else {
            false
        }
    }

    /// Tries to attach a block to the tree.  Structural validation against
    /// the parent has already happened by the time a header gets here.
    ///
    /// Returns if this new block forks off and creates a new tip.
    pub fn attach_header(&mut self, header: BlockHeader) -> Result<bool, TreeError> {
        let id = header.compute_hash();
        if self.entries.contains_key(&id) {
            warn!(%id, "block already attached");
            return Ok(false);
        }

        let parent_id = *header.parent();

        if let Some(parent_ent) = self.entries.get_mut(&parent_id) {
            parent_ent.children.insert(id);
        } else {
            return Err(TreeError::AttachMissingParent(id, parent_id));
        }

        let ent = BlockEntry {
            header,
            children: HashSet::new(),
        };

        self.entries.insert(id, ent);

        // Also update the tips table, removing the parent if it's there.
        let did_replace = self.leaves.remove(&parent_id);
        self.leaves.insert(id);

        Ok(!did_replace)
    }

    /// Collects every block below a given one in the tree.
    pub fn get_all_descendants(&self, id: &BlockId) -> HashSet<BlockId> {
        let mut descendants = HashSet::new();
        let mut to_visit = vec![*id];

        while let Some(cur) = to_visit.pop() {
            if let Some(entry) = self.entries.get(&cur) {
                for child in &entry.children {
                    descendants.insert(*child);
                    to_visit.push(*child);
                }
            }
        }
        descendants
    }

    /// Removes a block from the table, its parent's child set, and the tips.
    pub fn remove(&mut self, id: &BlockId) {
        let parent = self.parent_of(id).cloned();

        self.entries.remove(id);

        if let Some(parent) = parent {
            if let Some(parent_entry) = self.entries.get_mut(&parent) {
                parent_entry.children.remove(id);
            }
        }

        self.leaves.remove(id);
    }

    /// Re-roots the tree at a block, returning a report that includes the
    /// precise blocks that were finalized transitively and any blocks on
    /// competing branches that were rejected.
    pub fn reroot_to(&mut self, id: &BlockId) -> Result<FinalizeReport, TreeError> {
        // Sanity check the block so we know it's here.
        if !self.is_linked_to_root(id) {
            return Err(TreeError::MissingBlock(*id));
        }

        let mut finalized = vec![];
        let mut at = *id;

        // Walk down to the current root and mark everything as finalized.
        while at != self.root {
            finalized.push(at);
            let ent = self.entries.get(&at).expect("headertree: missing entry");
            at = *ent.header.parent();
        }

        let mut to_evict = vec![];

        // Walk down from the parent of the new root and collect the side
        // branches that have to go.
        if *id != self.root {
            let mut at = *self
                .entries
                .get(id)
                .expect("headertree: missing entry")
                .header
                .parent();
            loop {
                let ent = self.entries.get(&at).expect("headertree: missing entry");
                for child in &ent.children {
                    if !finalized.contains(child) {
                        to_evict.push(*child);
                    }
                }
                if at == self.root {
                    break;
                }
                at = *ent.header.parent();
            }
        }

        // Expand the evicted branch tops into whole branches.
        let mut evicted = to_evict.clone();
        for b in to_evict {
            evicted.extend(self.get_all_descendants(&b));
        }

        for b in &evicted {
            self.remove(b);
        }

        // And also remove blocks that we're finalizing, *except* the new
        // root itself.
        for b in &finalized {
            if b != id {
                self.remove(b);
            }
        }

        let old_root = self.root;
        self.root = *id;

        Ok(FinalizeReport {
            prev_root: old_root,
            finalized,
            rejected: evicted,
        })
    }
}

/// Report of blocks that were finalized by a re-rooting and blocks on
/// competing branches that were permanently rejected.
#[derive(Clone, Debug)]
pub struct FinalizeReport {
    /// Previous root.
    prev_root: BlockId,

    /// Blocks we've newly finalized, new root first.
    finalized: Vec<BlockId>,

    /// Blocks that were on competing branches.
    rejected: Vec<BlockId>,
}

impl FinalizeReport {
    /// Returns the id that was the previous root.  It's still final, there
    /// are just newer finalized blocks above it now.
    pub fn prev_root(&self) -> &BlockId {
        &self.prev_root
    }

    /// The block that's the new root.
    pub fn new_root(&self) -> &BlockId {
        if self.finalized.is_empty() {
            &self.prev_root
        } else {
            &self.finalized[0]
        }
    }

    /// Returns a slice of the newly finalized ids, new root first.
    pub fn finalized(&self) -> &[BlockId] {
        &self.finalized
    }

    /// Returns a slice of the ids that were rejected.
    pub fn rejected(&self) -> &[BlockId] {
        &self.rejected
    }
}
