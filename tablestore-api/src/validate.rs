//! §4.2 validators: each returns the first violation it finds as an
//! `OTSParameterInvalid` error naming the offending field. No request
//! carrying a validation failure ever reaches the transport.

use crate::error::Error;
use crate::options::{Credential, Endpoint};
use crate::primary_key::{PrimaryKey, PrimaryKeyColumnSchema, PrimaryKeyValue};
use crate::row::{RowUpdateChange, RowUpdateKind};
use crate::split::Split;
use crate::table::{ColumnOption, ColumnSchema, ColumnType, TableOptions, TimeRange};

pub fn endpoint(endpoint: &Endpoint) -> Result<(), Error> {
    if endpoint.url.is_empty() {
        return Err(Error::parameter_invalid("endpoint.url", "must not be empty"));
    }
    if !endpoint.url.starts_with("http://") && !endpoint.url.starts_with("https://") {
        return Err(Error::parameter_invalid(
            "endpoint.url",
            "must start with http:// or https://",
        ));
    }
    if endpoint.instance_name.is_empty() {
        return Err(Error::parameter_invalid(
            "endpoint.instance_name",
            "must not be empty",
        ));
    }
    Ok(())
}

pub fn credential(credential: &Credential) -> Result<(), Error> {
    if credential.access_key_id.is_empty() {
        return Err(Error::parameter_invalid(
            "credential.access_key_id",
            "must not be empty",
        ));
    }
    if credential.access_key_secret.is_empty() {
        return Err(Error::parameter_invalid(
            "credential.access_key_secret",
            "must not be empty",
        ));
    }
    if let Some(token) = &credential.security_token {
        if token.is_empty() {
            return Err(Error::parameter_invalid(
                "credential.security_token",
                "must not be empty when set",
            ));
        }
    }
    Ok(())
}

pub fn primary_key_column_schema(schema: &PrimaryKeyColumnSchema) -> Result<(), Error> {
    if schema.name.is_empty() {
        return Err(Error::parameter_invalid(
            "primary_key_column_schema.name",
            "must not be empty",
        ));
    }
    if schema.option == ColumnOption::AutoIncrement && schema.column_type != ColumnType::Integer {
        return Err(Error::parameter_invalid(
            "primary_key_column_schema.option",
            "AutoIncrement requires an Integer column",
        ));
    }
    Ok(())
}

/// `allow_auto_incr_placeholder` is true only for the primary key of a row
/// being inserted by `PutRow` (§4.2).
pub fn primary_key(pk: &PrimaryKey, allow_auto_incr_placeholder: bool) -> Result<(), Error> {
    if pk.is_empty() {
        return Err(Error::parameter_invalid("primary_key", "must have at least one column"));
    }
    for (name, value) in pk {
        if name.is_empty() {
            return Err(Error::parameter_invalid(
                "primary_key.column.name",
                "must not be empty",
            ));
        }
        if matches!(value, PrimaryKeyValue::AutoIncrPlaceholder) && !allow_auto_incr_placeholder {
            return Err(Error::parameter_invalid(
                "primary_key.column.value",
                "AutoIncrPlaceholder is only allowed in PutRow inserts",
            ));
        }
    }
    Ok(())
}

/// `for_create_table` requires both reserved-throughput values to be set
/// (§4.2); `UpdateTable` allows either or both to be absent.
pub fn table_options(options: &TableOptions, for_create_table: bool) -> Result<(), Error> {
    if let Some(ttl) = options.time_to_live_secs {
        if ttl <= 0 {
            return Err(Error::parameter_invalid(
                "table_options.time_to_live_secs",
                "must be a positive whole number of seconds",
            ));
        }
    }
    if let Some(deviation) = options.max_time_deviation_secs {
        if deviation <= 0 {
            return Err(Error::parameter_invalid(
                "table_options.max_time_deviation_secs",
                "must be a positive whole number of seconds",
            ));
        }
    }
    if let Some(versions) = options.max_versions {
        if versions <= 0 {
            return Err(Error::parameter_invalid(
                "table_options.max_versions",
                "must be positive",
            ));
        }
    }
    if let Some(block_size) = options.block_size {
        if block_size <= 0 {
            return Err(Error::parameter_invalid(
                "table_options.block_size",
                "must be positive",
            ));
        }
    }
    if for_create_table
        && (options.reserved_read_throughput.is_none() || options.reserved_write_throughput.is_none())
    {
        return Err(Error::parameter_invalid(
            "table_options.reserved_throughput",
            "both read and write must be set for CreateTable",
        ));
    }
    Ok(())
}

pub fn time_range(range: &TimeRange) -> Result<(), Error> {
    if range.start_ms > range.end_ms {
        return Err(Error::parameter_invalid(
            "time_range",
            "start must not be after end",
        ));
    }
    Ok(())
}

pub fn split(split: &Split) -> Result<(), Error> {
    if split.lower.is_empty() || split.upper.is_empty() {
        return Err(Error::parameter_invalid("split", "lower and upper must not be empty"));
    }
    if split.lower.len() != split.upper.len() {
        return Err(Error::parameter_invalid("split", "lower and upper must have the same arity"));
    }
    for ((lower_name, lower_value), (upper_name, upper_value)) in split.lower.iter().zip(split.upper.iter()) {
        if lower_name != upper_name {
            return Err(Error::parameter_invalid(
                "split",
                "lower and upper must name the same columns in the same order",
            ));
        }
        if lower_value.column_type() != upper_value.column_type() {
            return Err(Error::parameter_invalid(
                "split",
                "lower and upper must use the same value variant per column",
            ));
        }
    }
    if !(split.lower < split.upper) {
        return Err(Error::parameter_invalid("split", "lower must be less than upper"));
    }
    Ok(())
}

/// Each shard split point passed to `CreateTable` must be a single-column
/// real value matching the first schema column's name and type (§4.2).
pub fn shard_split_points(points: &[PrimaryKey], schema: &[ColumnSchema]) -> Result<(), Error> {
    let Some(first) = schema.first() else {
        return Err(Error::parameter_invalid(
            "create_table.table_meta.schema",
            "must have at least one column",
        ));
    };
    for point in points {
        if point.len() != 1 {
            return Err(Error::parameter_invalid(
                "create_table.shard_split_points",
                "each point must have exactly one column",
            ));
        }
        let (name, value) = &point[0];
        if name != &first.name {
            return Err(Error::parameter_invalid(
                "create_table.shard_split_points",
                "column name must match the first schema column",
            ));
        }
        if !value.is_real() {
            return Err(Error::parameter_invalid(
                "create_table.shard_split_points",
                "value must be a real (non-placeholder, non-infinite) value",
            ));
        }
        if value.column_type() != Some(first.column_type) {
            return Err(Error::parameter_invalid(
                "create_table.shard_split_points",
                "value type must match the first schema column",
            ));
        }
    }
    Ok(())
}

pub fn row_update(update: &RowUpdateChange) -> Result<(), Error> {
    if update.column_name.is_empty() {
        return Err(Error::parameter_invalid(
            "row_update.column_name",
            "must not be empty",
        ));
    }
    if let RowUpdateKind::Delete { timestamp: _ } = &update.kind {
        // timestamp is required by construction (the field is not optional)
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primary_key::PrimaryKeyValue;

    #[test]
    fn rejects_placeholder_outside_put_row() {
        let pk = vec![("pk".to_string(), PrimaryKeyValue::AutoIncrPlaceholder)];
        assert!(primary_key(&pk, false).is_err());
        assert!(primary_key(&pk, true).is_ok());
    }

    #[test]
    fn rejects_empty_primary_key() {
        assert!(primary_key(&[], true).is_err());
    }

    #[test]
    fn create_table_requires_both_throughputs() {
        let mut opts = TableOptions::default();
        assert!(table_options(&opts, true).is_err());
        opts.reserved_read_throughput = Some(0);
        opts.reserved_write_throughput = Some(0);
        assert!(table_options(&opts, true).is_ok());
        assert!(table_options(&TableOptions::default(), false).is_ok());
    }

    #[test]
    fn split_requires_lower_less_than_upper() {
        let lower = vec![("pk".to_string(), PrimaryKeyValue::Integer(1))];
        let upper = vec![("pk".to_string(), PrimaryKeyValue::Integer(2))];
        assert!(split(&Split { lower: lower.clone(), upper: upper.clone() }).is_ok());
        assert!(split(&Split { lower: upper, upper: lower }).is_err());
    }

    #[test]
    fn shard_split_point_must_match_first_schema_column() {
        let schema = vec![ColumnSchema {
            name: "pk".to_string(),
            column_type: ColumnType::Integer,
            option: ColumnOption::None,
        }];
        let good = vec![vec![("pk".to_string(), PrimaryKeyValue::Integer(5))]];
        assert!(shard_split_points(&good, &schema).is_ok());

        let wrong_name = vec![vec![("other".to_string(), PrimaryKeyValue::Integer(5))]];
        assert!(shard_split_points(&wrong_name, &schema).is_err());

        let wrong_arity = vec![vec![
            ("pk".to_string(), PrimaryKeyValue::Integer(5)),
            ("pk2".to_string(), PrimaryKeyValue::Integer(1)),
        ]];
        assert!(shard_split_points(&wrong_arity, &schema).is_err());
    }
}
