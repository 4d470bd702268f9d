//! `Split` (§3/§4.2): a lower/upper primary key pair describing one shard,
//! as computed by `ComputeSplitPointsBySize`.

use crate::primary_key::PrimaryKey;

#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub lower: PrimaryKey,
    pub upper: PrimaryKey,
}
