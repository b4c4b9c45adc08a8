//! Parquet reading.

use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime};
use parquet::basic::{ConvertedType, Type as PhysicalType};
use parquet::errors::ParquetError;
use parquet::file::reader::FileReader;
use parquet::file::serialized_reader::SerializedFileReader;
use parquet::record::Field as ParquetField;
use parquet::record::reader::RowIter;
use parquet::schema::types::Type as SchemaType;

use crate::error::LoadResult;
use crate::types::{DataSet, DataType, Field, Schema, Value};

use super::unified::{LoadOutcome, TableFormat};

/// Read Parquet bytes into an in-memory [`DataSet`].
///
/// Notes:
/// - Columns are the top-level fields of the file schema; nested groups are rendered as text.
/// - Uses the Parquet record API (`RowIter`).
///
/// Structural errors (bad magic, truncated footer, corrupt pages) yield
/// [`LoadOutcome::Malformed`]; anything else is returned as `Err`.
pub fn read_parquet_bytes(bytes: impl Into<Bytes>) -> LoadResult<LoadOutcome> {
    let bytes = bytes.into();
    if bytes.is_empty() {
        return Ok(malformed("empty content"));
    }

    let reader = match SerializedFileReader::new(bytes) {
        Ok(r) => r,
        Err(e) => return classify_parquet_error(e),
    };

    let fields: Vec<Field> = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .root_schema()
        .get_fields()
        .iter()
        .map(|f| Field::new(f.name(), data_type_for(f)))
        .collect();

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for row_res in RowIter::from_file_into(Box::new(reader)) {
        let row = match row_res {
            Ok(row) => row,
            Err(e) => return classify_parquet_error(e),
        };

        let mut out_row: Vec<Value> = Vec::with_capacity(fields.len());
        for (field, (_, value)) in fields.iter().zip(row.get_column_iter()) {
            out_row.push(convert_parquet_field(field.data_type, value));
        }
        out_row.resize(fields.len(), Value::Null);
        rows.push(out_row);
    }

    Ok(LoadOutcome::Parsed(DataSet::new(Schema::new(fields), rows)))
}

/// Map a top-level Parquet schema field to the [`DataType`] its values are read as.
fn data_type_for(field: &SchemaType) -> DataType {
    if !field.is_primitive() {
        return DataType::Utf8;
    }

    let converted = field.get_basic_info().converted_type();
    match field.get_physical_type() {
        PhysicalType::BOOLEAN => DataType::Bool,
        PhysicalType::INT32 => match converted {
            ConvertedType::INT_8 => DataType::Int8,
            ConvertedType::INT_16 | ConvertedType::UINT_8 => DataType::Int16,
            ConvertedType::UINT_16 => DataType::Int32,
            ConvertedType::UINT_32 => DataType::Int64,
            ConvertedType::DATE => DataType::Datetime,
            ConvertedType::DECIMAL | ConvertedType::TIME_MILLIS => DataType::Utf8,
            _ => DataType::Int32,
        },
        PhysicalType::INT64 => match converted {
            ConvertedType::TIMESTAMP_MILLIS | ConvertedType::TIMESTAMP_MICROS => DataType::Datetime,
            ConvertedType::UINT_64 | ConvertedType::DECIMAL | ConvertedType::TIME_MICROS => DataType::Utf8,
            _ => DataType::Int64,
        },
        PhysicalType::INT96 => DataType::Datetime,
        PhysicalType::FLOAT => DataType::Float32,
        PhysicalType::DOUBLE => DataType::Float64,
        // BYTE_ARRAY / FIXED_LEN_BYTE_ARRAY
        _ => DataType::Utf8,
    }
}

fn convert_parquet_field(data_type: DataType, f: &ParquetField) -> Value {
    match (data_type, f) {
        (_, ParquetField::Null) => Value::Null,
        (DataType::Utf8, ParquetField::Str(s)) => Value::Utf8(s.clone()),
        (DataType::Utf8, other) => Value::Utf8(other.to_string()),
        (_, ParquetField::Bool(b)) => Value::Bool(*b),
        (_, ParquetField::Byte(v)) => Value::Int64(i64::from(*v)),
        (_, ParquetField::Short(v)) => Value::Int64(i64::from(*v)),
        (_, ParquetField::Int(v)) => Value::Int64(i64::from(*v)),
        (_, ParquetField::Long(v)) => Value::Int64(*v),
        (_, ParquetField::UByte(v)) => Value::Int64(i64::from(*v)),
        (_, ParquetField::UShort(v)) => Value::Int64(i64::from(*v)),
        (_, ParquetField::UInt(v)) => Value::Int64(i64::from(*v)),
        (_, ParquetField::Float(v)) if v.is_nan() => Value::Null,
        (_, ParquetField::Float(v)) => Value::Float32(*v),
        (_, ParquetField::Double(v)) if v.is_nan() => Value::Null,
        (_, ParquetField::Double(v)) => Value::Float64(*v),
        (_, ParquetField::Date(days)) => {
            datetime_or_null(DateTime::from_timestamp(i64::from(*days) * 86_400, 0).map(|d| d.naive_utc()))
        }
        (_, ParquetField::TimestampMillis(ms)) => {
            datetime_or_null(DateTime::from_timestamp_millis(*ms).map(|d| d.naive_utc()))
        }
        (_, ParquetField::TimestampMicros(us)) => {
            datetime_or_null(DateTime::from_timestamp_micros(*us).map(|d| d.naive_utc()))
        }
        (_, ParquetField::Str(s)) => Value::Utf8(s.clone()),
        (_, other) => Value::Utf8(other.to_string()),
    }
}

fn datetime_or_null(ts: Option<NaiveDateTime>) -> Value {
    ts.map(Value::Datetime).unwrap_or(Value::Null)
}

fn classify_parquet_error(err: ParquetError) -> LoadResult<LoadOutcome> {
    match err {
        ParquetError::General(_)
        | ParquetError::NYI(_)
        | ParquetError::EOF(_)
        | ParquetError::IndexOutOfBound(..) => Ok(malformed(err.to_string())),
        other => Err(other.into()),
    }
}

fn malformed(reason: impl Into<String>) -> LoadOutcome {
    LoadOutcome::Malformed {
        format: TableFormat::Parquet,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_text_input_is_malformed() {
        assert!(matches!(
            read_parquet_bytes(Vec::new()).unwrap(),
            LoadOutcome::Malformed { format: TableFormat::Parquet, .. }
        ));
        assert!(matches!(
            read_parquet_bytes(b"a,b\n1,2\n3,4\n".to_vec()).unwrap(),
            LoadOutcome::Malformed { .. }
        ));
    }

    #[test]
    fn tiny_input_is_malformed() {
        assert!(matches!(
            read_parquet_bytes(b"PAR1".to_vec()).unwrap(),
            LoadOutcome::Malformed { .. }
        ));
    }
}
