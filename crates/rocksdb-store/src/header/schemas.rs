use chainweb_state::header::BlockHeader;
use chainweb_state::id::BlockId;

use crate::{
    define_table_with_default_codec, define_table_with_seek_key_codec, define_table_without_codec,
    impl_borsh_value_codec,
};

define_table_with_default_codec!(
    /// Table to store headers by content hash.
    (HeaderSchema) BlockId => BlockHeader
);

define_table_with_seek_key_codec!(
    /// Height secondary index, headers present per height.
    (HeaderHeightSchema) u64 => Vec<BlockId>
);
