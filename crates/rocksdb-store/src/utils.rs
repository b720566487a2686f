use chainweb_db::DbResult;
use rockbound::{OptimisticTransactionDB as DB, Schema, SchemaDBOperationsExt};

/// Gets the greatest u64 key present in a seek-key table, if any.
pub fn get_last_idx<T>(db: &DB) -> DbResult<Option<u64>>
where
    T: Schema<Key = u64>,
{
    let mut iterator = db.iter::<T>()?;
    iterator.seek_to_last();
    match iterator.rev().next() {
        Some(res) => {
            let (tip, _) = res?.into_tuple();
            Ok(Some(tip))
        }
        None => Ok(None),
    }
}
