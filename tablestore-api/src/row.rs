//! `Row` and the per-column update changes used by `PutRow`/`UpdateRow`.

use crate::attribute::AttributeValue;
use crate::primary_key::PrimaryKey;

/// A full row as returned by a read: a primary key plus its attribute
/// columns, each optionally timestamped.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub primary_key: PrimaryKey,
    pub attributes: Vec<(String, AttributeValue, Option<i64>)>,
}

/// The kind of change a single attribute column undergoes in an
/// `UpdateRow` call.
#[derive(Debug, Clone, PartialEq)]
pub enum RowUpdateKind {
    /// Write `value` at the given timestamp (or now, if absent).
    Put { value: AttributeValue, timestamp: Option<i64> },
    /// Delete a single versioned cell; requires a timestamp (§4.2).
    Delete { timestamp: i64 },
    /// Delete all versions of this column; no timestamp allowed (§4.2).
    DeleteAll,
}

/// A single column's requested change, named (§4.2: "each update has a
/// non-empty attribute name").
#[derive(Debug, Clone, PartialEq)]
pub struct RowUpdateChange {
    pub column_name: String,
    pub kind: RowUpdateKind,
}
