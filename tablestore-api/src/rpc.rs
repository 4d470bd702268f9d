//! Per-action request and response value types (§3: "Each Action carries,
//! at type level, its request and response shapes"). The wire
//! representation of these is owned by `tablestore-proto`'s `Codec`; this
//! module only defines the shapes callers build and receive.

use crate::condition::{Condition, ColumnCondition};
use crate::primary_key::PrimaryKey;
use crate::row::{Row, RowUpdateChange};
use crate::table::{ColumnSchema, TableMeta, TableOptions, TimeRange};
use crate::split::Split;

/// Read/write capacity units consumed by a call, accumulated by the Range
/// Iterator across turnovers (§4.7, testable property 6).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapacityUnit {
    pub read: i64,
    pub write: i64,
}

impl std::ops::Add for CapacityUnit {
    type Output = CapacityUnit;
    fn add(self, rhs: CapacityUnit) -> CapacityUnit {
        CapacityUnit {
            read: self.read + rhs.read,
            write: self.write + rhs.write,
        }
    }
}

impl std::ops::AddAssign for CapacityUnit {
    fn add_assign(&mut self, rhs: CapacityUnit) {
        *self = *self + rhs;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    Forward,
    Backward,
}

// ---- CreateTable ----

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableRequest {
    pub table_meta: TableMeta,
    pub table_options: TableOptions,
    pub shard_split_points: Vec<PrimaryKey>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateTableResponse {}

// ---- ListTable ----

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListTableRequest {}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListTableResponse {
    pub table_names: Vec<String>,
}

// ---- DescribeTable ----

#[derive(Debug, Clone, PartialEq)]
pub struct DescribeTableRequest {
    pub table_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DescribeTableResponse {
    pub table_meta: TableMeta,
    pub table_options: TableOptions,
}

// ---- DeleteTable ----

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteTableRequest {
    pub table_name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteTableResponse {}

// ---- UpdateTable ----

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateTableRequest {
    pub table_name: String,
    pub table_options: TableOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateTableResponse {
    pub table_options: TableOptions,
}

// ---- GetRow ----

#[derive(Debug, Clone, PartialEq)]
pub struct GetRowRequest {
    pub table_name: String,
    pub primary_key: PrimaryKey,
    pub columns_to_get: Vec<String>,
    pub max_versions: Option<i64>,
    pub time_range: Option<TimeRange>,
    pub filter: Option<ColumnCondition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetRowResponse {
    pub row: Option<Row>,
    pub consumed: CapacityUnit,
}

// ---- PutRow ----

#[derive(Debug, Clone, PartialEq)]
pub struct PutRowRequest {
    pub table_name: String,
    pub row: Row,
    pub condition: Condition,
    pub return_row: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PutRowResponse {
    pub consumed: CapacityUnit,
    pub row: Option<Row>,
}

// ---- UpdateRow ----

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRowRequest {
    pub table_name: String,
    pub primary_key: PrimaryKey,
    pub updates: Vec<RowUpdateChange>,
    pub condition: Condition,
    pub return_row: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRowResponse {
    pub consumed: CapacityUnit,
    pub row: Option<Row>,
}

// ---- DeleteRow ----

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRowRequest {
    pub table_name: String,
    pub primary_key: PrimaryKey,
    pub condition: Condition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRowResponse {
    pub consumed: CapacityUnit,
}

// ---- BatchGetRow ----

#[derive(Debug, Clone, PartialEq)]
pub struct TableGet {
    pub table_name: String,
    pub primary_keys: Vec<PrimaryKey>,
    pub columns_to_get: Vec<String>,
    pub max_versions: Option<i64>,
    pub time_range: Option<TimeRange>,
    pub filter: Option<ColumnCondition>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchGetRowRequest {
    pub table_gets: Vec<TableGet>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchGetRowItemResult {
    pub table_name: String,
    pub primary_key: PrimaryKey,
    pub result: Result<(Option<Row>, CapacityUnit), crate::error::Error>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchGetRowResponse {
    pub results: Vec<BatchGetRowItemResult>,
}

// ---- BatchWriteRow ----

#[derive(Debug, Clone, PartialEq)]
pub enum BatchWriteRowItem {
    Put(PutRowRequest),
    Update(UpdateRowRequest),
    Delete(DeleteRowRequest),
}

impl BatchWriteRowItem {
    pub fn table_name(&self) -> &str {
        match self {
            BatchWriteRowItem::Put(r) => &r.table_name,
            BatchWriteRowItem::Update(r) => &r.table_name,
            BatchWriteRowItem::Delete(r) => &r.table_name,
        }
    }

    pub fn primary_key(&self) -> &PrimaryKey {
        match self {
            BatchWriteRowItem::Put(r) => &r.row.primary_key,
            BatchWriteRowItem::Update(r) => &r.primary_key,
            BatchWriteRowItem::Delete(r) => &r.primary_key,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchWriteRowRequest {
    pub items: Vec<BatchWriteRowItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchWriteRowItemResult {
    pub result: Result<(Option<Row>, CapacityUnit), crate::error::Error>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchWriteRowResponse {
    /// Same length and order as the request's `items`.
    pub results: Vec<BatchWriteRowItemResult>,
}

// ---- GetRange ----

#[derive(Debug, Clone, PartialEq)]
pub struct GetRangeRequest {
    pub table_name: String,
    pub direction: ScanDirection,
    pub columns_to_get: Vec<String>,
    pub start: PrimaryKey,
    pub end: PrimaryKey,
    pub limit: Option<i64>,
    pub time_range: Option<TimeRange>,
    pub max_versions: Option<i64>,
    pub filter: Option<ColumnCondition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetRangeResponse {
    pub rows: Vec<Row>,
    pub next_start: Option<PrimaryKey>,
    pub consumed: CapacityUnit,
}

// ---- ComputeSplitPointsBySize ----

#[derive(Debug, Clone, PartialEq)]
pub struct ComputeSplitPointsBySizeRequest {
    pub table_name: String,
    pub split_size_in_byte: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComputeSplitPointsBySizeResponse {
    pub schema: Vec<ColumnSchema>,
    pub splits: Vec<Split>,
}

/// A call's request payload, tagged by the `Action` it belongs to. The
/// pipeline matches on this to pick a path and hand the right shape to the
/// codec; `tablestore-client`'s per-action methods build one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    CreateTable(CreateTableRequest),
    ListTable(ListTableRequest),
    DescribeTable(DescribeTableRequest),
    DeleteTable(DeleteTableRequest),
    UpdateTable(UpdateTableRequest),
    GetRow(GetRowRequest),
    PutRow(PutRowRequest),
    UpdateRow(UpdateRowRequest),
    DeleteRow(DeleteRowRequest),
    BatchGetRow(BatchGetRowRequest),
    BatchWriteRow(BatchWriteRowRequest),
    GetRange(GetRangeRequest),
    ComputeSplitPointsBySize(ComputeSplitPointsBySizeRequest),
}

impl Request {
    pub fn action(&self) -> crate::action::Action {
        use crate::action::Action;
        match self {
            Request::CreateTable(_) => Action::CreateTable,
            Request::ListTable(_) => Action::ListTable,
            Request::DescribeTable(_) => Action::DescribeTable,
            Request::DeleteTable(_) => Action::DeleteTable,
            Request::UpdateTable(_) => Action::UpdateTable,
            Request::GetRow(_) => Action::GetRow,
            Request::PutRow(_) => Action::PutRow,
            Request::UpdateRow(_) => Action::UpdateRow,
            Request::DeleteRow(_) => Action::DeleteRow,
            Request::BatchGetRow(_) => Action::BatchGetRow,
            Request::BatchWriteRow(_) => Action::BatchWriteRow,
            Request::GetRange(_) => Action::GetRange,
            Request::ComputeSplitPointsBySize(_) => Action::ComputeSplitPointsBySize,
        }
    }
}

/// A call's response payload, tagged the same way as [`Request`].
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    CreateTable(CreateTableResponse),
    ListTable(ListTableResponse),
    DescribeTable(DescribeTableResponse),
    DeleteTable(DeleteTableResponse),
    UpdateTable(UpdateTableResponse),
    GetRow(GetRowResponse),
    PutRow(PutRowResponse),
    UpdateRow(UpdateRowResponse),
    DeleteRow(DeleteRowResponse),
    BatchGetRow(BatchGetRowResponse),
    BatchWriteRow(BatchWriteRowResponse),
    GetRange(GetRangeResponse),
    ComputeSplitPointsBySize(ComputeSplitPointsBySizeResponse),
}
