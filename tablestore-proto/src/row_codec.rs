//! The binary encoding carried inside the protobuf envelope's `bytes`
//! fields for primary keys, rows, row updates and filters — this crate's
//! own compact row format, analogous in role to the length-prefixed row
//! encoding the Service layers underneath its RPC envelope.
//!
//! Every value is a flat tag + payload. Multi-byte integers are
//! little-endian; strings and binary blobs are length-prefixed with a
//! `u32`.

use tablestore_api::{
    AttributeValue, ColumnCondition, Comparator, LogicOp, PrimaryKey, PrimaryKeyValue, Row,
    RowUpdateChange, RowUpdateKind,
};

use crate::CodecError;

type Result<T> = std::result::Result<T, CodecError>;

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_i64(buf: &mut Vec<u8>, v: i64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    put_u32(buf, bytes.len() as u32);
    buf.extend_from_slice(bytes);
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    put_bytes(buf, s.as_bytes());
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or_else(CodecError::truncated)?;
        let slice = self.bytes.get(self.pos..end).ok_or_else(CodecError::truncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes(b.try_into().unwrap()))
    }

    fn i64(&mut self) -> Result<i64> {
        let b = self.take(8)?;
        Ok(i64::from_le_bytes(b.try_into().unwrap()))
    }

    fn f64(&mut self) -> Result<f64> {
        let b = self.take(8)?;
        Ok(f64::from_le_bytes(b.try_into().unwrap()))
    }

    fn bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn string(&mut self) -> Result<String> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes).map_err(|_| CodecError::truncated())
    }

    fn bool(&mut self) -> Result<bool> {
        Ok(self.u8()? != 0)
    }
}

mod pk_tag {
    pub const NONE: u8 = 0;
    pub const INF_MIN: u8 = 1;
    pub const INF_MAX: u8 = 2;
    pub const AUTO_INCR_PLACEHOLDER: u8 = 3;
    pub const INTEGER: u8 = 4;
    pub const STRING: u8 = 5;
    pub const BINARY: u8 = 6;
}

fn put_primary_key_value(buf: &mut Vec<u8>, value: &PrimaryKeyValue) {
    match value {
        PrimaryKeyValue::None => buf.push(pk_tag::NONE),
        PrimaryKeyValue::InfMin => buf.push(pk_tag::INF_MIN),
        PrimaryKeyValue::InfMax => buf.push(pk_tag::INF_MAX),
        PrimaryKeyValue::AutoIncrPlaceholder => buf.push(pk_tag::AUTO_INCR_PLACEHOLDER),
        PrimaryKeyValue::Integer(v) => {
            buf.push(pk_tag::INTEGER);
            put_i64(buf, *v);
        }
        PrimaryKeyValue::String(v) => {
            buf.push(pk_tag::STRING);
            put_bytes(buf, v);
        }
        PrimaryKeyValue::Binary(v) => {
            buf.push(pk_tag::BINARY);
            put_bytes(buf, v);
        }
    }
}

fn read_primary_key_value(r: &mut Reader) -> Result<PrimaryKeyValue> {
    Ok(match r.u8()? {
        pk_tag::NONE => PrimaryKeyValue::None,
        pk_tag::INF_MIN => PrimaryKeyValue::InfMin,
        pk_tag::INF_MAX => PrimaryKeyValue::InfMax,
        pk_tag::AUTO_INCR_PLACEHOLDER => PrimaryKeyValue::AutoIncrPlaceholder,
        pk_tag::INTEGER => PrimaryKeyValue::Integer(r.i64()?),
        pk_tag::STRING => PrimaryKeyValue::String(r.bytes()?),
        pk_tag::BINARY => PrimaryKeyValue::Binary(r.bytes()?),
        _ => return Err(CodecError::truncated()),
    })
}

pub fn encode_primary_key(pk: &PrimaryKey) -> Vec<u8> {
    let mut buf = Vec::new();
    put_u32(&mut buf, pk.len() as u32);
    for (name, value) in pk {
        put_str(&mut buf, name);
        put_primary_key_value(&mut buf, value);
    }
    buf
}

pub fn decode_primary_key(bytes: &[u8]) -> Result<PrimaryKey> {
    let mut r = Reader::new(bytes);
    let count = r.u32()?;
    let mut pk = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = r.string()?;
        let value = read_primary_key_value(&mut r)?;
        pk.push((name, value));
    }
    Ok(pk)
}

mod attr_tag {
    pub const NONE: u8 = 0;
    pub const STRING: u8 = 1;
    pub const INTEGER: u8 = 2;
    pub const BINARY: u8 = 3;
    pub const BOOLEAN: u8 = 4;
    pub const FLOAT: u8 = 5;
}

fn put_attribute_value(buf: &mut Vec<u8>, value: &AttributeValue) {
    match value {
        AttributeValue::None => buf.push(attr_tag::NONE),
        AttributeValue::String(v) => {
            buf.push(attr_tag::STRING);
            put_bytes(buf, v);
        }
        AttributeValue::Integer(v) => {
            buf.push(attr_tag::INTEGER);
            put_i64(buf, *v);
        }
        AttributeValue::Binary(v) => {
            buf.push(attr_tag::BINARY);
            put_bytes(buf, v);
        }
        AttributeValue::Boolean(v) => {
            buf.push(attr_tag::BOOLEAN);
            buf.push(*v as u8);
        }
        AttributeValue::FloatingPoint(v) => {
            buf.push(attr_tag::FLOAT);
            buf.extend_from_slice(&v.to_le_bytes());
        }
    }
}

fn read_attribute_value(r: &mut Reader) -> Result<AttributeValue> {
    Ok(match r.u8()? {
        attr_tag::NONE => AttributeValue::None,
        attr_tag::STRING => AttributeValue::String(r.bytes()?),
        attr_tag::INTEGER => AttributeValue::Integer(r.i64()?),
        attr_tag::BINARY => AttributeValue::Binary(r.bytes()?),
        attr_tag::BOOLEAN => AttributeValue::Boolean(r.bool()?),
        attr_tag::FLOAT => AttributeValue::FloatingPoint(r.f64()?),
        _ => return Err(CodecError::truncated()),
    })
}

fn put_optional_i64(buf: &mut Vec<u8>, value: Option<i64>) {
    match value {
        Some(v) => {
            buf.push(1);
            put_i64(buf, v);
        }
        None => buf.push(0),
    }
}

fn read_optional_i64(r: &mut Reader) -> Result<Option<i64>> {
    Ok(if r.bool()? { Some(r.i64()?) } else { None })
}

pub fn encode_row(row: &Row) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&encode_primary_key(&row.primary_key));
    put_u32(&mut buf, row.attributes.len() as u32);
    for (name, value, timestamp) in &row.attributes {
        put_str(&mut buf, name);
        put_attribute_value(&mut buf, value);
        put_optional_i64(&mut buf, *timestamp);
    }
    buf
}

pub fn decode_row(bytes: &[u8]) -> Result<Row> {
    let mut r = Reader::new(bytes);
    let primary_key = decode_primary_key_from(&mut r)?;
    let count = r.u32()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = r.string()?;
        let value = read_attribute_value(&mut r)?;
        let timestamp = read_optional_i64(&mut r)?;
        attributes.push((name, value, timestamp));
    }
    Ok(Row { primary_key, attributes })
}

fn decode_primary_key_from(r: &mut Reader) -> Result<PrimaryKey> {
    let count = r.u32()?;
    let mut pk = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = r.string()?;
        let value = read_primary_key_value(r)?;
        pk.push((name, value));
    }
    Ok(pk)
}

mod update_tag {
    pub const PUT: u8 = 0;
    pub const DELETE: u8 = 1;
    pub const DELETE_ALL: u8 = 2;
}

/// Encodes a primary key plus the list of per-column changes (the payload
/// of an `UpdateRow` call).
pub fn encode_row_update(pk: &PrimaryKey, updates: &[RowUpdateChange]) -> Vec<u8> {
    let mut buf = encode_primary_key(pk);
    put_u32(&mut buf, updates.len() as u32);
    for update in updates {
        put_str(&mut buf, &update.column_name);
        match &update.kind {
            RowUpdateKind::Put { value, timestamp } => {
                buf.push(update_tag::PUT);
                put_attribute_value(&mut buf, value);
                put_optional_i64(&mut buf, *timestamp);
            }
            RowUpdateKind::Delete { timestamp } => {
                buf.push(update_tag::DELETE);
                put_i64(&mut buf, *timestamp);
            }
            RowUpdateKind::DeleteAll => {
                buf.push(update_tag::DELETE_ALL);
            }
        }
    }
    buf
}

pub fn decode_row_update(bytes: &[u8]) -> Result<(PrimaryKey, Vec<RowUpdateChange>)> {
    let mut r = Reader::new(bytes);
    let pk = decode_primary_key_from(&mut r)?;
    let count = r.u32()?;
    let mut updates = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let column_name = r.string()?;
        let kind = match r.u8()? {
            update_tag::PUT => {
                let value = read_attribute_value(&mut r)?;
                let timestamp = read_optional_i64(&mut r)?;
                RowUpdateKind::Put { value, timestamp }
            }
            update_tag::DELETE => RowUpdateKind::Delete { timestamp: r.i64()? },
            update_tag::DELETE_ALL => RowUpdateKind::DeleteAll,
            _ => return Err(CodecError::truncated()),
        };
        updates.push(RowUpdateChange { column_name, kind });
    }
    Ok((pk, updates))
}

mod condition_tag {
    pub const LOGIC: u8 = 0;
    pub const LEAF: u8 = 1;
}

fn put_comparator(buf: &mut Vec<u8>, comparator: Comparator) {
    buf.push(match comparator {
        Comparator::Eq => 0,
        Comparator::Ne => 1,
        Comparator::Lt => 2,
        Comparator::Le => 3,
        Comparator::Gt => 4,
        Comparator::Ge => 5,
    });
}

fn read_comparator(r: &mut Reader) -> Result<Comparator> {
    Ok(match r.u8()? {
        0 => Comparator::Eq,
        1 => Comparator::Ne,
        2 => Comparator::Lt,
        3 => Comparator::Le,
        4 => Comparator::Gt,
        5 => Comparator::Ge,
        _ => return Err(CodecError::truncated()),
    })
}

fn put_logic_op(buf: &mut Vec<u8>, op: LogicOp) {
    buf.push(match op {
        LogicOp::Not => 0,
        LogicOp::And => 1,
        LogicOp::Or => 2,
    });
}

fn read_logic_op(r: &mut Reader) -> Result<LogicOp> {
    Ok(match r.u8()? {
        0 => LogicOp::Not,
        1 => LogicOp::And,
        2 => LogicOp::Or,
        _ => return Err(CodecError::truncated()),
    })
}

fn put_column_condition(buf: &mut Vec<u8>, condition: &ColumnCondition) {
    match condition {
        ColumnCondition::Logic { op, children } => {
            buf.push(condition_tag::LOGIC);
            put_logic_op(buf, *op);
            put_u32(buf, children.len() as u32);
            for child in children {
                put_column_condition(buf, child);
            }
        }
        ColumnCondition::Leaf {
            column_name,
            comparator,
            value,
            pass_if_missing,
            latest_version_only,
        } => {
            buf.push(condition_tag::LEAF);
            put_str(buf, column_name);
            put_comparator(buf, *comparator);
            put_attribute_value(buf, value);
            buf.push(*pass_if_missing as u8);
            buf.push(*latest_version_only as u8);
        }
    }
}

fn read_column_condition(r: &mut Reader) -> Result<ColumnCondition> {
    Ok(match r.u8()? {
        condition_tag::LOGIC => {
            let op = read_logic_op(r)?;
            let count = r.u32()?;
            let mut children = Vec::with_capacity(count as usize);
            for _ in 0..count {
                children.push(read_column_condition(r)?);
            }
            ColumnCondition::Logic { op, children }
        }
        condition_tag::LEAF => {
            let column_name = r.string()?;
            let comparator = read_comparator(r)?;
            let value = read_attribute_value(r)?;
            let pass_if_missing = r.bool()?;
            let latest_version_only = r.bool()?;
            ColumnCondition::Leaf {
                column_name,
                comparator,
                value,
                pass_if_missing,
                latest_version_only,
            }
        }
        _ => return Err(CodecError::truncated()),
    })
}

pub fn encode_column_condition(condition: &ColumnCondition) -> Vec<u8> {
    let mut buf = Vec::new();
    put_column_condition(&mut buf, condition);
    buf
}

pub fn decode_column_condition(bytes: &[u8]) -> Result<ColumnCondition> {
    let mut r = Reader::new(bytes);
    read_column_condition(&mut r)
}

/// Encodes a sequence of full rows, used for `GetRange`'s row list.
pub fn encode_rows(rows: &[Row]) -> Vec<u8> {
    let mut buf = Vec::new();
    put_u32(&mut buf, rows.len() as u32);
    for row in rows {
        put_bytes(&mut buf, &encode_row(row));
    }
    buf
}

pub fn decode_rows(bytes: &[u8]) -> Result<Vec<Row>> {
    let mut r = Reader::new(bytes);
    let count = r.u32()?;
    let mut rows = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let row_bytes = r.bytes()?;
        rows.push(decode_row(&row_bytes)?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_key_round_trips() {
        let pk: PrimaryKey = vec![
            ("a".to_string(), PrimaryKeyValue::Integer(42)),
            ("b".to_string(), PrimaryKeyValue::String(b"hello".to_vec())),
        ];
        let bytes = encode_primary_key(&pk);
        assert_eq!(decode_primary_key(&bytes).unwrap(), pk);
    }

    #[test]
    fn row_round_trips_with_mixed_attributes() {
        let row = Row {
            primary_key: vec![("pk".to_string(), PrimaryKeyValue::Integer(1))],
            attributes: vec![
                ("s".to_string(), AttributeValue::String(b"v".to_vec()), Some(7)),
                ("f".to_string(), AttributeValue::FloatingPoint(1.5), None),
                ("b".to_string(), AttributeValue::Boolean(true), None),
            ],
        };
        let bytes = encode_row(&row);
        assert_eq!(decode_row(&bytes).unwrap(), row);
    }

    #[test]
    fn row_update_round_trips_all_kinds() {
        let pk: PrimaryKey = vec![("pk".to_string(), PrimaryKeyValue::Integer(1))];
        let updates = vec![
            RowUpdateChange {
                column_name: "a".to_string(),
                kind: RowUpdateKind::Put { value: AttributeValue::Integer(3), timestamp: None },
            },
            RowUpdateChange {
                column_name: "b".to_string(),
                kind: RowUpdateKind::Delete { timestamp: 100 },
            },
            RowUpdateChange {
                column_name: "c".to_string(),
                kind: RowUpdateKind::DeleteAll,
            },
        ];
        let bytes = encode_row_update(&pk, &updates);
        let (decoded_pk, decoded_updates) = decode_row_update(&bytes).unwrap();
        assert_eq!(decoded_pk, pk);
        assert_eq!(decoded_updates, updates);
    }

    #[test]
    fn nested_column_condition_round_trips() {
        let condition = ColumnCondition::Logic {
            op: LogicOp::And,
            children: vec![ColumnCondition::Leaf {
                column_name: "x".to_string(),
                comparator: Comparator::Gt,
                value: AttributeValue::Integer(10),
                pass_if_missing: false,
                latest_version_only: true,
            }],
        };
        let bytes = encode_column_condition(&condition);
        assert_eq!(decode_column_condition(&bytes).unwrap(), condition);
    }

    #[test]
    fn truncated_input_is_rejected_not_panicked() {
        assert!(decode_primary_key(&[1, 0, 0]).is_err());
    }
}
