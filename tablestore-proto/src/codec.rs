//! The `Codec` implementation: turns `tablestore_api::rpc::Request` into
//! protobuf bytes and protobuf bytes back into `tablestore_api::rpc::Response`.

use prost::Message;

use tablestore_api::error::Error;
use tablestore_api::rpc::{
    BatchGetRowItemResult, BatchGetRowResponse, BatchWriteRowItem, BatchWriteRowItemResult,
    BatchWriteRowResponse, ComputeSplitPointsBySizeResponse, CreateTableResponse,
    DeleteRowResponse, DeleteTableResponse, DescribeTableResponse, GetRangeResponse,
    GetRowResponse, ListTableResponse, PutRowResponse, Request, Response, UpdateRowResponse,
    UpdateTableResponse,
};
use tablestore_api::traits::Codec;
use tablestore_api::Action;

use crate::convert::*;
use crate::pb;
use crate::row_codec;

/// The workspace's one `Codec`: protobuf envelopes over this crate's row
/// encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainBufferCodec;

fn filter_bytes(filter: &Option<tablestore_api::ColumnCondition>) -> Vec<u8> {
    filter.as_ref().map(row_codec::encode_column_condition).unwrap_or_default()
}

fn condition_to_pb(condition: &tablestore_api::Condition) -> pb::ConditionPb {
    pb::ConditionPb {
        row_existence: row_existence_to_pb(condition.row_existence),
        column_condition: condition
            .column_condition
            .as_ref()
            .map(row_codec::encode_column_condition)
            .unwrap_or_default(),
    }
}

impl Codec for PlainBufferCodec {
    fn encode_request(&self, request: &Request) -> Result<Vec<u8>, Error> {
        Ok(match request {
            Request::CreateTable(r) => pb::CreateTableRequest {
                table_meta: Some(table_meta_to_pb(&r.table_meta)),
                table_options: Some(table_options_to_pb(&r.table_options)),
                shard_split_points: r.shard_split_points.iter().map(row_codec::encode_primary_key).collect(),
            }
            .encode_to_vec(),
            Request::ListTable(_) => pb::ListTableRequest {}.encode_to_vec(),
            Request::DescribeTable(r) => pb::DescribeTableRequest { table_name: r.table_name.clone() }.encode_to_vec(),
            Request::DeleteTable(r) => pb::DeleteTableRequest { table_name: r.table_name.clone() }.encode_to_vec(),
            Request::UpdateTable(r) => pb::UpdateTableRequest {
                table_name: r.table_name.clone(),
                table_options: Some(table_options_to_pb(&r.table_options)),
            }
            .encode_to_vec(),
            Request::GetRow(r) => {
                let (start, end) = time_range_to_pb(r.time_range);
                pb::GetRowRequest {
                    table_name: r.table_name.clone(),
                    primary_key: row_codec::encode_primary_key(&r.primary_key),
                    columns_to_get: r.columns_to_get.clone(),
                    max_versions: r.max_versions,
                    time_range_start_ms: start,
                    time_range_end_ms: end,
                    filter: filter_bytes(&r.filter),
                }
                .encode_to_vec()
            }
            Request::PutRow(r) => pb::PutRowRequest {
                table_name: r.table_name.clone(),
                row: row_codec::encode_row(&r.row),
                condition: Some(condition_to_pb(&r.condition)),
                return_row: r.return_row,
            }
            .encode_to_vec(),
            Request::UpdateRow(r) => pb::UpdateRowRequest {
                table_name: r.table_name.clone(),
                row_change: row_codec::encode_row_update(&r.primary_key, &r.updates),
                condition: Some(condition_to_pb(&r.condition)),
                return_row: r.return_row,
            }
            .encode_to_vec(),
            Request::DeleteRow(r) => pb::DeleteRowRequest {
                table_name: r.table_name.clone(),
                primary_key: row_codec::encode_primary_key(&r.primary_key),
                condition: Some(condition_to_pb(&r.condition)),
            }
            .encode_to_vec(),
            Request::BatchGetRow(r) => pb::BatchGetRowRequest {
                tables: r
                    .table_gets
                    .iter()
                    .map(|t| {
                        let (start, end) = time_range_to_pb(t.time_range);
                        pb::TableInBatchGetRowRequest {
                            table_name: t.table_name.clone(),
                            primary_keys: t.primary_keys.iter().map(row_codec::encode_primary_key).collect(),
                            columns_to_get: t.columns_to_get.clone(),
                            max_versions: t.max_versions,
                            time_range_start_ms: start,
                            time_range_end_ms: end,
                            filter: filter_bytes(&t.filter),
                        }
                    })
                    .collect(),
            }
            .encode_to_vec(),
            Request::BatchWriteRow(r) => pb::BatchWriteRowRequest {
                rows: r.items.iter().map(batch_write_item_to_pb).collect(),
            }
            .encode_to_vec(),
            Request::GetRange(r) => {
                let (start, end) = time_range_to_pb(r.time_range);
                pb::GetRangeRequest {
                    table_name: r.table_name.clone(),
                    direction: direction_to_pb(r.direction),
                    columns_to_get: r.columns_to_get.clone(),
                    inclusive_start_primary_key: row_codec::encode_primary_key(&r.start),
                    exclusive_end_primary_key: row_codec::encode_primary_key(&r.end),
                    limit: r.limit,
                    time_range_start_ms: start,
                    time_range_end_ms: end,
                    max_versions: r.max_versions,
                    filter: filter_bytes(&r.filter),
                }
                .encode_to_vec()
            }
            Request::ComputeSplitPointsBySize(r) => pb::ComputeSplitPointsBySizeRequest {
                table_name: r.table_name.clone(),
                split_size_in_byte: r.split_size_in_byte,
            }
            .encode_to_vec(),
        })
    }

    fn decode_response(&self, action: Action, body: &[u8]) -> Result<Response, Error> {
        Ok(match action {
            Action::CreateTable => {
                pb::CreateTableResponse::decode(body).map_err(corrupt)?;
                Response::CreateTable(CreateTableResponse {})
            }
            Action::ListTable => {
                let pb = pb::ListTableResponse::decode(body).map_err(corrupt)?;
                Response::ListTable(ListTableResponse { table_names: pb.table_names })
            }
            Action::DescribeTable => {
                let pb = pb::DescribeTableResponse::decode(body).map_err(corrupt)?;
                Response::DescribeTable(DescribeTableResponse {
                    table_meta: table_meta_from_pb(pb.table_meta.ok_or_else(missing_field)?),
                    table_options: table_options_from_pb(pb.table_options.ok_or_else(missing_field)?),
                })
            }
            Action::DeleteTable => {
                pb::DeleteTableResponse::decode(body).map_err(corrupt)?;
                Response::DeleteTable(DeleteTableResponse {})
            }
            Action::UpdateTable => {
                let pb = pb::UpdateTableResponse::decode(body).map_err(corrupt)?;
                Response::UpdateTable(UpdateTableResponse {
                    table_options: table_options_from_pb(pb.table_options.ok_or_else(missing_field)?),
                })
            }
            Action::GetRow => {
                let pb = pb::GetRowResponse::decode(body).map_err(corrupt)?;
                Response::GetRow(GetRowResponse {
                    row: decode_optional_row(&pb.row)?,
                    consumed: capacity_unit_from_pb(pb.consumed),
                })
            }
            Action::PutRow => {
                let pb = pb::PutRowResponse::decode(body).map_err(corrupt)?;
                Response::PutRow(PutRowResponse {
                    consumed: capacity_unit_from_pb(pb.consumed),
                    row: decode_optional_row(&pb.row)?,
                })
            }
            Action::UpdateRow => {
                let pb = pb::UpdateRowResponse::decode(body).map_err(corrupt)?;
                Response::UpdateRow(UpdateRowResponse {
                    consumed: capacity_unit_from_pb(pb.consumed),
                    row: decode_optional_row(&pb.row)?,
                })
            }
            Action::DeleteRow => {
                let pb = pb::DeleteRowResponse::decode(body).map_err(corrupt)?;
                Response::DeleteRow(DeleteRowResponse { consumed: capacity_unit_from_pb(pb.consumed) })
            }
            Action::BatchGetRow => {
                let pb = pb::BatchGetRowResponse::decode(body).map_err(corrupt)?;
                let mut results = Vec::with_capacity(pb.rows.len());
                for row in pb.rows {
                    let primary_key = row_codec::decode_primary_key(&row.primary_key)?;
                    let result = if row.is_ok {
                        Ok((decode_optional_row(&row.row)?, capacity_unit_from_pb(row.consumed)))
                    } else {
                        Err(Error::synthetic(row.error_status, &row.error_code, row.error_message))
                    };
                    results.push(BatchGetRowItemResult { table_name: row.table_name, primary_key, result });
                }
                Response::BatchGetRow(BatchGetRowResponse { results })
            }
            Action::BatchWriteRow => {
                let pb = pb::BatchWriteRowResponse::decode(body).map_err(corrupt)?;
                let mut results = Vec::with_capacity(pb.rows.len());
                for row in pb.rows {
                    let result = if row.is_ok {
                        Ok((decode_optional_row(&row.row)?, capacity_unit_from_pb(row.consumed)))
                    } else {
                        Err(Error::synthetic(row.error_status, &row.error_code, row.error_message))
                    };
                    results.push(BatchWriteRowItemResult { result });
                }
                Response::BatchWriteRow(BatchWriteRowResponse { results })
            }
            Action::GetRange => {
                let pb = pb::GetRangeResponse::decode(body).map_err(corrupt)?;
                let next_start = if pb.next_start_primary_key.is_empty() {
                    None
                } else {
                    Some(row_codec::decode_primary_key(&pb.next_start_primary_key)?)
                };
                Response::GetRange(GetRangeResponse {
                    rows: row_codec::decode_rows(&pb.rows)?,
                    next_start,
                    consumed: capacity_unit_from_pb(pb.consumed),
                })
            }
            Action::ComputeSplitPointsBySize => {
                let pb = pb::ComputeSplitPointsBySizeResponse::decode(body).map_err(corrupt)?;
                let first_column_name = pb.schema.first().map(|c| c.name.clone()).ok_or_else(missing_field)?;
                let schema = pb
                    .schema
                    .into_iter()
                    .map(|c| tablestore_api::ColumnSchema {
                        name: c.name,
                        column_type: column_type_from_pb(c.r#type),
                        option: column_option_from_pb(c.option),
                    })
                    .collect();
                let mut points = Vec::with_capacity(pb.split_points.len());
                for point in &pb.split_points {
                    points.push(row_codec::decode_primary_key(point)?);
                }
                // Split points are boundaries between shards; turn N boundaries into
                // N+1 ranges bracketed by InfMin/InfMax on the first schema column.
                let inf_min = vec![(first_column_name.clone(), tablestore_api::PrimaryKeyValue::InfMin)];
                let inf_max = vec![(first_column_name, tablestore_api::PrimaryKeyValue::InfMax)];
                let mut boundaries = Vec::with_capacity(points.len() + 2);
                boundaries.push(inf_min);
                boundaries.extend(points);
                boundaries.push(inf_max);
                let splits = boundaries
                    .windows(2)
                    .map(|w| tablestore_api::Split { lower: w[0].clone(), upper: w[1].clone() })
                    .collect();
                Response::ComputeSplitPointsBySize(ComputeSplitPointsBySizeResponse { schema, splits })
            }
        })
    }

    fn decode_error_body(&self, _action: Action, body: &[u8]) -> Option<(String, String)> {
        let pb = pb::ErrorPb::decode(body).ok()?;
        Some((pb.code, pb.message))
    }
}

fn batch_write_item_to_pb(item: &BatchWriteRowItem) -> pb::RowInBatchWriteRowRequest {
    match item {
        BatchWriteRowItem::Put(r) => pb::RowInBatchWriteRowRequest {
            table_name: r.table_name.clone(),
            r#type: pb::BatchWriteRowTypePb::Put as i32,
            row: row_codec::encode_row(&r.row),
            condition: Some(condition_to_pb(&r.condition)),
        },
        BatchWriteRowItem::Update(r) => pb::RowInBatchWriteRowRequest {
            table_name: r.table_name.clone(),
            r#type: pb::BatchWriteRowTypePb::Update as i32,
            row: row_codec::encode_row_update(&r.primary_key, &r.updates),
            condition: Some(condition_to_pb(&r.condition)),
        },
        BatchWriteRowItem::Delete(r) => pb::RowInBatchWriteRowRequest {
            table_name: r.table_name.clone(),
            r#type: pb::BatchWriteRowTypePb::Delete as i32,
            row: row_codec::encode_primary_key(&r.primary_key),
            condition: Some(condition_to_pb(&r.condition)),
        },
    }
}

fn decode_optional_row(bytes: &[u8]) -> Result<Option<tablestore_api::Row>, Error> {
    if bytes.is_empty() {
        Ok(None)
    } else {
        Ok(Some(row_codec::decode_row(bytes)?))
    }
}

fn corrupt(_: prost::DecodeError) -> Error {
    Error::corrupted_response("malformed protobuf response body")
}

fn missing_field() -> Error {
    Error::corrupted_response("response is missing a required field")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablestore_api::rpc::{DescribeTableRequest, GetRowRequest};
    use tablestore_api::{Action as A, PrimaryKeyValue};

    #[test]
    fn encodes_and_round_trips_describe_table_action_tag() {
        let codec = PlainBufferCodec;
        let req = Request::DescribeTable(DescribeTableRequest { table_name: "t".to_string() });
        assert_eq!(req.action(), A::DescribeTable);
        let bytes = codec.encode_request(&req).unwrap();
        assert!(!bytes.is_empty() || true); // empty table name would still encode a tag-less message
        let resp_bytes = pb::DescribeTableResponse {
            table_meta: Some(pb::TableMeta { table_name: "t".to_string(), schema: vec![] }),
            table_options: Some(pb::TableOptions::default()),
        }
        .encode_to_vec();
        let decoded = codec.decode_response(A::DescribeTable, &resp_bytes).unwrap();
        match decoded {
            Response::DescribeTable(r) => assert_eq!(r.table_meta.name, "t"),
            _ => panic!("wrong response variant"),
        }
    }

    #[test]
    fn get_row_request_round_trips_primary_key_bytes() {
        let codec = PlainBufferCodec;
        let req = Request::GetRow(GetRowRequest {
            table_name: "t".to_string(),
            primary_key: vec![("pk".to_string(), PrimaryKeyValue::Integer(1))],
            columns_to_get: vec![],
            max_versions: None,
            time_range: None,
            filter: None,
        });
        let bytes = codec.encode_request(&req).unwrap();
        let decoded = pb::GetRowRequest::decode(bytes.as_slice()).unwrap();
        let pk = row_codec::decode_primary_key(&decoded.primary_key).unwrap();
        assert_eq!(pk, vec![("pk".to_string(), PrimaryKeyValue::Integer(1))]);
    }

    #[test]
    fn decode_error_body_reads_code_and_message() {
        let codec = PlainBufferCodec;
        let bytes = pb::ErrorPb { code: "OTSTableNotExist".to_string(), message: "no such table".to_string() }
            .encode_to_vec();
        let (code, message) = codec.decode_error_body(A::GetRow, &bytes).unwrap();
        assert_eq!(code, "OTSTableNotExist");
        assert_eq!(message, "no such table");
    }
}
