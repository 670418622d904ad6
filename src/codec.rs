//! Mapping between the engine's tagged values and [`RowValues`].

use chrono::{DateTime, NaiveDateTime};

use crate::engine::EngineValue;
use crate::error::LedgerSqlError;
use crate::types::{RowValues, ScanType};

/// Engine type names as reported in column metadata.
pub mod type_names {
    pub const INTEGER: &str = "INTEGER";
    pub const BOOLEAN: &str = "BOOLEAN";
    pub const VARCHAR: &str = "VARCHAR";
    pub const BLOB: &str = "BLOB";
    pub const TIMESTAMP: &str = "TIMESTAMP";
    pub const ANY: &str = "ANY";
}

/// Decode one engine value.
///
/// # Errors
/// Returns `ExecutionError` for a timestamp outside the representable range.
pub fn decode_value(value: EngineValue) -> Result<RowValues, LedgerSqlError> {
    Ok(match value {
        EngineValue::Null => RowValues::Null,
        EngineValue::Integer(i) => RowValues::Int(i),
        EngineValue::Varchar(s) => RowValues::Text(s),
        EngineValue::Boolean(b) => RowValues::Bool(b),
        EngineValue::Blob(b) | EngineValue::Any(b) => RowValues::Blob(b),
        EngineValue::Timestamp(micros) => RowValues::Timestamp(micros_to_timestamp(micros)?),
    })
}

/// Encode a caller value as an engine parameter.
///
/// # Errors
/// Returns `ParameterError` for floats, which the engine cannot store.
pub fn encode_value(value: &RowValues) -> Result<EngineValue, LedgerSqlError> {
    Ok(match value {
        RowValues::Null => EngineValue::Null,
        RowValues::Int(i) => EngineValue::Integer(*i),
        RowValues::Text(s) => EngineValue::Varchar(s.clone()),
        RowValues::Bool(b) => EngineValue::Boolean(*b),
        RowValues::Blob(b) => EngineValue::Blob(b.clone()),
        RowValues::Timestamp(ts) => EngineValue::Timestamp(timestamp_to_micros(ts)),
        RowValues::JSON(j) => EngineValue::Varchar(j.to_string()),
        RowValues::Float(f) => {
            return Err(LedgerSqlError::ParameterError(format!(
                "floating point value {f} cannot be bound; the engine has no float type"
            )));
        }
    })
}

#[must_use]
pub fn timestamp_to_micros(ts: &NaiveDateTime) -> i64 {
    ts.and_utc().timestamp_micros()
}

/// # Errors
/// Returns `ExecutionError` when `micros` is out of chrono's range.
pub fn micros_to_timestamp(micros: i64) -> Result<NaiveDateTime, LedgerSqlError> {
    DateTime::from_timestamp_micros(micros)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| {
            LedgerSqlError::ExecutionError(format!("timestamp {micros}us is out of range"))
        })
}

/// Natural in-memory type for values of an engine column type.
#[must_use]
pub fn scan_type(type_name: &str) -> ScanType {
    match type_name {
        type_names::INTEGER => ScanType::Int64,
        type_names::BOOLEAN => ScanType::Bool,
        type_names::VARCHAR => ScanType::String,
        type_names::TIMESTAMP => ScanType::Timestamp,
        // BLOB, ANY and anything unrecognized scan safely as bytes.
        _ => ScanType::Bytes,
    }
}

/// Strip engine aliasing from a column name: `(db.table.column)` → `column`.
#[must_use]
pub fn dealias_column_name(name: &str) -> &str {
    let name = name
        .strip_prefix('(')
        .and_then(|n| n.strip_suffix(')'))
        .unwrap_or(name);
    match name.rfind('.') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn dealiases_qualified_column_names() {
        assert_eq!(dealias_column_name("(mydb.mytable.myColumn)"), "myColumn");
        assert_eq!(dealias_column_name("(mytable.id)"), "id");
        assert_eq!(dealias_column_name("plain"), "plain");
        assert_eq!(dealias_column_name("(unqualified)"), "unqualified");
    }

    #[test]
    fn only_a_wrapping_pair_is_stripped() {
        assert_eq!(dealias_column_name("(half"), "(half");
        assert_eq!(dealias_column_name("(db.t.COUNT(*))"), "COUNT(*)");
    }

    #[test]
    fn decodes_every_engine_tag() {
        assert_eq!(decode_value(EngineValue::Null).unwrap(), RowValues::Null);
        assert_eq!(decode_value(EngineValue::Integer(-3)).unwrap(), RowValues::Int(-3));
        assert_eq!(
            decode_value(EngineValue::Varchar("a".into())).unwrap(),
            RowValues::Text("a".into())
        );
        assert_eq!(decode_value(EngineValue::Boolean(true)).unwrap(), RowValues::Bool(true));
        assert_eq!(
            decode_value(EngineValue::Blob(vec![0, 255])).unwrap(),
            RowValues::Blob(vec![0, 255])
        );
        assert_eq!(
            decode_value(EngineValue::Any(vec![1, 2])).unwrap(),
            RowValues::Blob(vec![1, 2])
        );
    }

    #[test]
    fn timestamps_keep_microseconds() {
        let ts = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_micro_opt(23, 59, 58, 123_456)
            .unwrap();
        let encoded = encode_value(&RowValues::Timestamp(ts)).unwrap();
        let EngineValue::Timestamp(micros) = encoded else {
            panic!("expected timestamp, got {encoded:?}");
        };
        assert_eq!(micros % 1_000_000, 123_456);
        assert_eq!(
            decode_value(EngineValue::Timestamp(micros)).unwrap(),
            RowValues::Timestamp(ts)
        );
    }

    #[test]
    fn floats_cannot_be_bound() {
        assert!(matches!(
            encode_value(&RowValues::Float(1.5)),
            Err(LedgerSqlError::ParameterError(_))
        ));
    }

    #[test]
    fn json_binds_as_text() {
        let v = serde_json::json!({"a": 1});
        assert_eq!(
            encode_value(&RowValues::JSON(v)).unwrap(),
            EngineValue::Varchar("{\"a\":1}".into())
        );
    }

    #[test]
    fn scan_types_follow_type_names() {
        assert_eq!(scan_type("INTEGER"), ScanType::Int64);
        assert_eq!(scan_type("BOOLEAN"), ScanType::Bool);
        assert_eq!(scan_type("VARCHAR"), ScanType::String);
        assert_eq!(scan_type("BLOB"), ScanType::Bytes);
        assert_eq!(scan_type("TIMESTAMP"), ScanType::Timestamp);
        assert_eq!(scan_type("ANY"), ScanType::Bytes);
        assert_eq!(scan_type("FLOAT"), ScanType::Bytes);
    }
}
