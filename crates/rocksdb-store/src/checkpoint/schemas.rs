use chainweb_db::types::{CheckpointKey, CheckpointRecord};

use crate::{define_table_with_seek_key_codec, define_table_without_codec, impl_borsh_value_codec};

define_table_with_seek_key_codec!(
    /// Table to store checkpoint records, iterable in height order.
    (CheckpointSchema) CheckpointKey => CheckpointRecord
);
