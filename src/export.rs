//! Table export to CSV or Parquet, locally or to object storage.

use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use parquet::basic::{ConvertedType, Repetition, Type as PhysicalType};
use parquet::column::writer::ColumnWriter;
use parquet::data_type::ByteArray;
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::types::Type as SchemaType;
use tracing::info;

use crate::error::ExportError;
use crate::ingestion::TableFormat;
use crate::remote::{ObjectStorage, RemoteLocator};
use crate::types::{DataSet, DataType, Field, Schema, Value};

/// Parse an export format token. Only `csv` and `parquet` are accepted.
pub fn parse_format(token: &str) -> Result<TableFormat, ExportError> {
    match token {
        "csv" => Ok(TableFormat::Csv),
        "parquet" => Ok(TableFormat::Parquet),
        other => Err(ExportError::UnsupportedFormat(other.to_string())),
    }
}

/// Download file name for an export: `requested` without its extension (default `data`) plus
/// the format's extension.
pub fn export_file_name(requested: Option<&str>, format: TableFormat) -> String {
    let requested = requested.map(str::trim).filter(|s| !s.is_empty()).unwrap_or("data");
    let segment_start = requested.rfind('/').map(|i| i + 1).unwrap_or(0);
    let stem = match requested[segment_start..].rfind('.') {
        Some(dot) if dot > 0 => &requested[..segment_start + dot],
        _ => requested,
    };
    format!("{stem}.{}", format.extension())
}

/// Encode `table` in `format` into `sink`.
pub fn write_table<W: Write + Send>(table: &DataSet, format: TableFormat, sink: W) -> Result<(), ExportError> {
    match format {
        TableFormat::Csv => write_csv(table, sink),
        TableFormat::Parquet => write_parquet(table, sink),
    }
}

/// Encode `table` in `format` into a buffer.
pub fn to_bytes(table: &DataSet, format: TableFormat) -> Result<Bytes, ExportError> {
    let mut buf = Vec::new();
    write_table(table, format, &mut buf)?;
    Ok(Bytes::from(buf))
}

/// Upload `table` to `locator`, appending the format extension to the key when missing.
///
/// Returns the locator actually written.
pub fn export_remote(
    table: &DataSet,
    format: TableFormat,
    storage: &dyn ObjectStorage,
    locator: &RemoteLocator,
) -> Result<RemoteLocator, ExportError> {
    let target = locator.with_extension(format.extension());
    let body = to_bytes(table, format)?;
    let size = body.len();
    storage.put(&target, body)?;
    info!(target = %target, %format, bytes = size, "exported table");
    Ok(target)
}

/// Write `table` as CSV with a header row. Missing values are empty cells.
pub fn write_csv<W: Write>(table: &DataSet, sink: W) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(sink);
    wtr.write_record(table.schema.field_names())?;
    for row in &table.rows {
        wtr.write_record(row.iter().map(|v| v.to_string()))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write `table` as a single-row-group Parquet file with optional columns.
pub fn write_parquet<W: Write + Send>(table: &DataSet, sink: W) -> Result<(), ExportError> {
    let schema = Arc::new(parquet_schema(&table.schema)?);
    let props = Arc::new(WriterProperties::builder().build());
    let mut writer = SerializedFileWriter::new(sink, schema, props)?;

    let mut rg = writer.next_row_group()?;
    let mut col_idx: usize = 0;
    while let Some(mut col) = rg.next_column()? {
        let field = table
            .schema
            .fields
            .get(col_idx)
            .ok_or_else(|| ParquetError::General(format!("no schema field for column {col_idx}")))?;
        let cells: Vec<&Value> = table.rows.iter().map(|r| r.get(col_idx).unwrap_or(&Value::Null)).collect();

        match col.untyped() {
            ColumnWriter::BoolColumnWriter(w) => {
                let (data, defs) = split(extract(field, &cells, |v| match v {
                    Value::Bool(b) => Some(*b),
                    _ => None,
                })?);
                w.write_batch(&data, Some(&defs[..]), None)?;
            }
            ColumnWriter::Int32ColumnWriter(w) => {
                let (data, defs) = split(extract(field, &cells, |v| match v {
                    Value::Int64(i) => i32::try_from(*i).ok(),
                    _ => None,
                })?);
                w.write_batch(&data, Some(&defs[..]), None)?;
            }
            ColumnWriter::Int64ColumnWriter(w) => {
                let (data, defs) = split(extract(field, &cells, |v| match v {
                    Value::Int64(i) => Some(*i),
                    Value::Datetime(ts) => Some(ts.and_utc().timestamp_micros()),
                    _ => None,
                })?);
                w.write_batch(&data, Some(&defs[..]), None)?;
            }
            ColumnWriter::FloatColumnWriter(w) => {
                let (data, defs) = split(extract(field, &cells, |v| match v {
                    Value::Float32(f) => Some(*f),
                    _ => None,
                })?);
                w.write_batch(&data, Some(&defs[..]), None)?;
            }
            ColumnWriter::DoubleColumnWriter(w) => {
                let (data, defs) = split(extract(field, &cells, |v| match v {
                    Value::Float64(f) => Some(*f),
                    _ => None,
                })?);
                w.write_batch(&data, Some(&defs[..]), None)?;
            }
            ColumnWriter::ByteArrayColumnWriter(w) => {
                let (data, defs) = split(extract(field, &cells, |v| match v {
                    Value::Utf8(s) => Some(ByteArray::from(s.as_str())),
                    _ => None,
                })?);
                w.write_batch(&data, Some(&defs[..]), None)?;
            }
            _ => {
                return Err(ParquetError::General(format!(
                    "unexpected column writer for '{}'",
                    field.name
                ))
                .into());
            }
        }
        col.close()?;
        col_idx += 1;
    }
    rg.close()?;
    writer.close()?;
    Ok(())
}

fn parquet_schema(schema: &Schema) -> Result<SchemaType, ParquetError> {
    let mut fields = Vec::with_capacity(schema.fields.len());
    for f in &schema.fields {
        let (physical, converted) = match f.data_type {
            DataType::Int8 => (PhysicalType::INT32, ConvertedType::INT_8),
            DataType::Int16 => (PhysicalType::INT32, ConvertedType::INT_16),
            DataType::Int32 => (PhysicalType::INT32, ConvertedType::NONE),
            DataType::Int64 => (PhysicalType::INT64, ConvertedType::NONE),
            DataType::Float32 => (PhysicalType::FLOAT, ConvertedType::NONE),
            DataType::Float64 => (PhysicalType::DOUBLE, ConvertedType::NONE),
            DataType::Bool => (PhysicalType::BOOLEAN, ConvertedType::NONE),
            DataType::Datetime => (PhysicalType::INT64, ConvertedType::TIMESTAMP_MICROS),
            DataType::Utf8 => (PhysicalType::BYTE_ARRAY, ConvertedType::UTF8),
        };
        let column = SchemaType::primitive_type_builder(&f.name, physical)
            .with_repetition(Repetition::OPTIONAL)
            .with_converted_type(converted)
            .build()?;
        fields.push(Arc::new(column));
    }
    SchemaType::group_type_builder("schema").with_fields(fields).build()
}

/// Pull typed values out of a column; nulls become `None`, anything else must match `get`.
fn extract<T>(
    field: &Field,
    cells: &[&Value],
    get: impl Fn(&Value) -> Option<T>,
) -> Result<Vec<Option<T>>, ParquetError> {
    cells
        .iter()
        .map(|v| match v {
            Value::Null => Ok(None),
            other => get(other).map(Some).ok_or_else(|| {
                ParquetError::General(format!(
                    "value {other:?} does not fit column '{}' of type {}",
                    field.name, field.data_type
                ))
            }),
        })
        .collect()
}

/// Split optional values into dense data plus definition levels.
fn split<T>(values: Vec<Option<T>>) -> (Vec<T>, Vec<i16>) {
    let defs = values.iter().map(|v| i16::from(v.is_some())).collect();
    let data = values.into_iter().flatten().collect();
    (data, defs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_replaces_extension() {
        assert_eq!(export_file_name(Some("people.csv"), TableFormat::Parquet), "people.parquet");
        assert_eq!(export_file_name(Some("report"), TableFormat::Csv), "report.csv");
        assert_eq!(export_file_name(None, TableFormat::Csv), "data.csv");
        assert_eq!(export_file_name(Some("  "), TableFormat::Parquet), "data.parquet");
        assert_eq!(export_file_name(Some(".hidden"), TableFormat::Csv), ".hidden.csv");
        assert_eq!(export_file_name(Some("v1.2/out"), TableFormat::Csv), "v1.2/out.csv");
    }

    #[test]
    fn format_tokens() {
        assert_eq!(parse_format("csv").unwrap(), TableFormat::Csv);
        assert_eq!(parse_format("parquet").unwrap(), TableFormat::Parquet);
        assert!(matches!(parse_format("xlsx"), Err(ExportError::UnsupportedFormat(_))));
        assert!(matches!(parse_format("pq"), Err(ExportError::UnsupportedFormat(_))));
        assert!(matches!(parse_format("CSV"), Err(ExportError::UnsupportedFormat(_))));
    }

    #[test]
    fn csv_export_writes_header_and_empty_nulls() {
        let ds = DataSet::new(
            Schema::new(vec![
                Field::new("id", DataType::Int8),
                Field::new("ok", DataType::Bool),
            ]),
            vec![
                vec![Value::Int64(1), Value::Bool(true)],
                vec![Value::Null, Value::Bool(false)],
            ],
        );
        let mut buf = Vec::new();
        write_csv(&ds, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "id,ok\n1,True\n,False\n");
    }
}
