//! Conversions between `tablestore-api`'s scalar value types and their
//! generated protobuf counterparts. Row/primary-key/filter payloads are
//! handled by `row_codec` instead — those travel as opaque `bytes`.

use tablestore_api::{
    BloomFilterType, CapacityUnit, ColumnOption, ColumnSchema, ColumnType, RowExistence,
    ScanDirection, TableMeta, TableOptions, TimeRange,
};

use crate::pb;

pub fn column_type_to_pb(t: ColumnType) -> i32 {
    match t {
        ColumnType::Integer => pb::ColumnType::Integer as i32,
        ColumnType::String => pb::ColumnType::String as i32,
        ColumnType::Binary => pb::ColumnType::Binary as i32,
    }
}

pub fn column_type_from_pb(t: i32) -> ColumnType {
    match pb::ColumnType::try_from(t).unwrap_or(pb::ColumnType::Integer) {
        pb::ColumnType::String => ColumnType::String,
        pb::ColumnType::Binary => ColumnType::Binary,
        _ => ColumnType::Integer,
    }
}

pub fn column_option_to_pb(o: ColumnOption) -> i32 {
    match o {
        ColumnOption::None => pb::ColumnOption::ColumnOptionNone as i32,
        ColumnOption::AutoIncrement => pb::ColumnOption::AutoIncrement as i32,
    }
}

pub fn column_option_from_pb(o: i32) -> ColumnOption {
    match pb::ColumnOption::try_from(o).unwrap_or(pb::ColumnOption::ColumnOptionNone) {
        pb::ColumnOption::AutoIncrement => ColumnOption::AutoIncrement,
        _ => ColumnOption::None,
    }
}

pub fn bloom_filter_to_pb(b: BloomFilterType) -> i32 {
    match b {
        BloomFilterType::None => pb::BloomFilterType::BloomFilterNone as i32,
        BloomFilterType::Cell => pb::BloomFilterType::BloomFilterCell as i32,
        BloomFilterType::Row => pb::BloomFilterType::BloomFilterRow as i32,
    }
}

pub fn bloom_filter_from_pb(b: i32) -> BloomFilterType {
    match pb::BloomFilterType::try_from(b).unwrap_or(pb::BloomFilterType::BloomFilterNone) {
        pb::BloomFilterType::BloomFilterCell => BloomFilterType::Cell,
        pb::BloomFilterType::BloomFilterRow => BloomFilterType::Row,
        _ => BloomFilterType::None,
    }
}

pub fn table_meta_to_pb(meta: &TableMeta) -> pb::TableMeta {
    pb::TableMeta {
        table_name: meta.name.clone(),
        schema: meta
            .schema
            .iter()
            .map(|c| pb::PrimaryKeySchemaEntry {
                name: c.name.clone(),
                r#type: column_type_to_pb(c.column_type),
                option: column_option_to_pb(c.option),
            })
            .collect(),
    }
}

pub fn table_meta_from_pb(meta: pb::TableMeta) -> TableMeta {
    TableMeta {
        name: meta.table_name,
        schema: meta
            .schema
            .into_iter()
            .map(|c| ColumnSchema {
                name: c.name,
                column_type: column_type_from_pb(c.r#type),
                option: column_option_from_pb(c.option),
            })
            .collect(),
    }
}

pub fn table_options_to_pb(options: &TableOptions) -> pb::TableOptions {
    pb::TableOptions {
        reserved_read_throughput: options.reserved_read_throughput,
        reserved_write_throughput: options.reserved_write_throughput,
        time_to_live_secs: options.time_to_live_secs,
        max_versions: options.max_versions,
        bloom_filter_type: bloom_filter_to_pb(options.bloom_filter_type),
        block_size: options.block_size,
        max_time_deviation_secs: options.max_time_deviation_secs,
    }
}

pub fn table_options_from_pb(options: pb::TableOptions) -> TableOptions {
    TableOptions {
        reserved_read_throughput: options.reserved_read_throughput,
        reserved_write_throughput: options.reserved_write_throughput,
        time_to_live_secs: options.time_to_live_secs,
        max_versions: options.max_versions,
        bloom_filter_type: bloom_filter_from_pb(options.bloom_filter_type),
        block_size: options.block_size,
        max_time_deviation_secs: options.max_time_deviation_secs,
    }
}

pub fn capacity_unit_from_pb(cu: Option<pb::CapacityUnitPb>) -> CapacityUnit {
    match cu {
        Some(cu) => CapacityUnit { read: cu.read, write: cu.write },
        None => CapacityUnit::default(),
    }
}

pub fn row_existence_to_pb(e: RowExistence) -> i32 {
    match e {
        RowExistence::Ignore => pb::RowExistenceExpectationPb::Ignore as i32,
        RowExistence::ExpectExist => pb::RowExistenceExpectationPb::ExpectExist as i32,
        RowExistence::ExpectNotExist => pb::RowExistenceExpectationPb::ExpectNotExist as i32,
    }
}

pub fn direction_to_pb(d: ScanDirection) -> i32 {
    match d {
        ScanDirection::Forward => pb::DirectionPb::Forward as i32,
        ScanDirection::Backward => pb::DirectionPb::Backward as i32,
    }
}

pub fn time_range_to_pb(range: Option<TimeRange>) -> (Option<i64>, Option<i64>) {
    match range {
        Some(r) => (Some(r.start_ms), Some(r.end_ms)),
        None => (None, None),
    }
}
