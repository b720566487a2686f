use std::sync::Arc;

use crate::traits::{CheckpointDatabase, Database, HeaderDatabase};

/// Wraps the component databases into the common [`Database`] interface.
pub struct CommonDatabase<H, C>
where
    H: HeaderDatabase + Send + Sync,
    C: CheckpointDatabase + Send + Sync,
{
    header_db: Arc<H>,
    checkpoint_db: Arc<C>,
}

impl<H, C> CommonDatabase<H, C>
where
    H: HeaderDatabase + Send + Sync,
    C: CheckpointDatabase + Send + Sync,
{
    pub fn new(header_db: Arc<H>, checkpoint_db: Arc<C>) -> Self {
        Self {
            header_db,
            checkpoint_db,
        }
    }
}

impl<H, C> Database for CommonDatabase<H, C>
where
    H: HeaderDatabase + Send + Sync,
    C: CheckpointDatabase + Send + Sync,
{
    type HeaderDB = H;
    type CheckpointDB = C;

    fn header_db(&self) -> &Arc<H> {
        &self.header_db
    }

    fn checkpoint_db(&self) -> &Arc<C> {
        &self.checkpoint_db
    }
}
