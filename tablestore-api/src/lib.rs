//! Data model, closed error taxonomy, and collaborator traits shared by the
//! table store client workspace.
//!
//! This crate has no network or threading code. It defines *what* a call
//! looks like (requests, responses, rows, keys) and the seams the rest of
//! the workspace plugs into (`RetryPolicy`, `RpcTransport`, `TimerService`,
//! `Codec`). Concrete implementations live in `tablestore-sdk`,
//! `tablestore-proto`, `tablestore-http` and `tablestore-client`.

mod action;
mod attribute;
mod condition;
pub mod error;
mod options;
mod primary_key;
mod row;
pub mod rpc;
mod split;
mod table;
pub mod traits;
pub mod tracker;
pub mod validate;

pub use action::Action;
pub use attribute::AttributeValue;
pub use condition::{ColumnCondition, Comparator, Condition, LogicOp, RowExistence};
pub use error::{Error, ErrorKind};
pub use options::{ClientOptions, ClientOptionsBuilder, Credential, Endpoint};
pub use primary_key::{PrimaryKey, PrimaryKeyColumnSchema, PrimaryKeyValue};
pub use row::{Row, RowUpdateChange, RowUpdateKind};
pub use rpc::{CapacityUnit, Request, Response, ScanDirection};
pub use split::Split;
pub use table::{BloomFilterType, ColumnOption, ColumnSchema, ColumnType, TableMeta, TableOptions, TimeRange};
pub use tracker::Tracker;
pub use traits::{Codec, RetryPolicy, RpcTransport, TimerHandle, TimerService, TransportOutcome};

/// Crate-wide result alias; every fallible public operation returns the
/// closed [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
