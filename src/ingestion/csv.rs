//! CSV reading with per-column type inference.

use crate::error::LoadResult;
use crate::types::{DataSet, DataType, Field, Schema, Value};

use super::unified::{LoadOutcome, TableFormat};

/// Cell spellings treated as missing, in addition to the empty string.
const NA_TOKENS: &[&str] = &[
    "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "null", "NULL", "None", "<NA>", "#N/A", "#NA",
];

/// Read CSV bytes into an in-memory [`DataSet`].
///
/// Rules:
///
/// - The first record is the header row; duplicate names get `.1`, `.2`, ... suffixes.
/// - Every record must have as many fields as the header.
/// - Column types are inferred from the cells (see [`infer_column_type`]).
///
/// Empty input, binary input, invalid UTF-8 and ragged records yield
/// [`LoadOutcome::Malformed`]. Any other CSV error is returned as `Err`.
pub fn read_csv_bytes(bytes: &[u8]) -> LoadResult<LoadOutcome> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(malformed("no columns to parse from file"));
    }
    if bytes.contains(&0) {
        return Ok(malformed("binary content is not delimited text"));
    }

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);
    read_csv_from_reader(&mut rdr)
}

/// Read CSV data from an existing CSV reader.
pub fn read_csv_from_reader<R: std::io::Read>(rdr: &mut csv::Reader<R>) -> LoadResult<LoadOutcome> {
    let headers = match rdr.headers() {
        Ok(h) => h.clone(),
        Err(e) => return classify_csv_error(e),
    };
    if headers.is_empty() {
        return Ok(malformed("no columns to parse from file"));
    }

    let mut records = Vec::new();
    for result in rdr.records() {
        match result {
            Ok(record) => records.push(record),
            Err(e) => return classify_csv_error(e),
        }
    }

    let names = dedupe_headers(headers.iter());
    let fields: Vec<Field> = names
        .into_iter()
        .enumerate()
        .map(|(idx, name)| {
            let cells = records.iter().map(|r| r.get(idx).unwrap_or(""));
            Field::new(name, infer_column_type(cells))
        })
        .collect();

    let rows = records
        .iter()
        .map(|record| {
            fields
                .iter()
                .enumerate()
                .map(|(idx, field)| parse_cell(record.get(idx).unwrap_or(""), field.data_type))
                .collect()
        })
        .collect();

    Ok(LoadOutcome::Parsed(DataSet::new(Schema::new(fields), rows)))
}

/// Infer a column type from its raw cells.
///
/// Missing cells are ignored. The first of `Int64`, `Float64`, `Bool` that accepts every remaining
/// cell wins, otherwise `Utf8`. A column with no present cells is `Float64`.
pub fn infer_column_type<'a>(cells: impl Iterator<Item = &'a str>) -> DataType {
    let present: Vec<&str> = cells.map(str::trim).filter(|c| !is_missing(c)).collect();
    if present.is_empty() {
        return DataType::Float64;
    }

    if present.iter().all(|c| c.parse::<i64>().is_ok()) {
        DataType::Int64
    } else if present.iter().all(|c| c.parse::<f64>().is_ok()) {
        DataType::Float64
    } else if present.iter().all(|c| parse_bool_literal(c).is_some()) {
        DataType::Bool
    } else {
        DataType::Utf8
    }
}

fn parse_cell(raw: &str, data_type: DataType) -> Value {
    let trimmed = raw.trim();
    if is_missing(trimmed) {
        return Value::Null;
    }

    match data_type {
        DataType::Int64 => trimmed.parse::<i64>().map(Value::Int64).unwrap_or(Value::Null),
        DataType::Float64 => match trimmed.parse::<f64>() {
            Ok(v) if !v.is_nan() => Value::Float64(v),
            _ => Value::Null,
        },
        DataType::Bool => parse_bool_literal(trimmed).map(Value::Bool).unwrap_or(Value::Null),
        _ => Value::Utf8(raw.to_owned()),
    }
}

fn is_missing(trimmed: &str) -> bool {
    trimmed.is_empty() || NA_TOKENS.contains(&trimmed)
}

fn parse_bool_literal(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn dedupe_headers<'a>(headers: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for h in headers {
        let mut name = h.to_owned();
        let mut n = 0;
        while out.contains(&name) {
            n += 1;
            name = format!("{h}.{n}");
        }
        out.push(name);
    }
    out
}

fn classify_csv_error(err: csv::Error) -> LoadResult<LoadOutcome> {
    match err.kind() {
        csv::ErrorKind::Utf8 { .. } | csv::ErrorKind::UnequalLengths { .. } => {
            Ok(malformed(err.to_string()))
        }
        _ => Err(err.into()),
    }
}

fn malformed(reason: impl Into<String>) -> LoadOutcome {
    LoadOutcome::Malformed {
        format: TableFormat::Csv,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(input: &str) -> DataSet {
        match read_csv_bytes(input.as_bytes()).unwrap() {
            LoadOutcome::Parsed(ds) => ds,
            other => panic!("expected parsed table, got {other:?}"),
        }
    }

    #[test]
    fn infers_int_float_bool_and_string_columns() {
        let ds = parsed("id,score,active,name\n1,98.5,true,Ada\n2,87,False,Grace\n");
        assert_eq!(
            ds.dtypes(),
            vec![
                ("id".to_string(), "int64"),
                ("score".to_string(), "float64"),
                ("active".to_string(), "bool"),
                ("name".to_string(), "string"),
            ]
        );
        assert_eq!(ds.rows[1][1], Value::Float64(87.0));
        assert_eq!(ds.rows[1][2], Value::Bool(false));
    }

    #[test]
    fn missing_cells_do_not_block_numeric_inference() {
        let ds = parsed("id,score\n1,\n,NaN\n3,2.5\n");
        assert_eq!(ds.schema.fields[0].data_type, DataType::Int64);
        assert_eq!(ds.schema.fields[1].data_type, DataType::Float64);
        assert_eq!(ds.rows[1][0], Value::Null);
        assert_eq!(ds.rows[0][1], Value::Null);
        assert_eq!(ds.rows[1][1], Value::Null);
    }

    #[test]
    fn all_missing_column_is_float() {
        let ds = parsed("a,b\n1,\n2,\n");
        assert_eq!(ds.schema.fields[1].data_type, DataType::Float64);
    }

    #[test]
    fn duplicate_headers_are_suffixed() {
        let ds = parsed("x,x,x\n1,2,3\n");
        let names: Vec<&str> = ds.schema.field_names().collect();
        assert_eq!(names, vec!["x", "x.1", "x.2"]);
    }

    #[test]
    fn empty_and_ragged_input_is_malformed() {
        assert!(matches!(
            read_csv_bytes(b"").unwrap(),
            LoadOutcome::Malformed { format: TableFormat::Csv, .. }
        ));
        assert!(matches!(
            read_csv_bytes(b"  \n").unwrap(),
            LoadOutcome::Malformed { .. }
        ));
        assert!(matches!(
            read_csv_bytes(b"a,b\n1,2,3\n").unwrap(),
            LoadOutcome::Malformed { .. }
        ));
    }

    #[test]
    fn binary_and_invalid_utf8_input_is_malformed() {
        assert!(matches!(
            read_csv_bytes(b"PAR1\x00\x01\x02").unwrap(),
            LoadOutcome::Malformed { .. }
        ));
        assert!(matches!(
            read_csv_bytes(b"a,b\n\xff\xfe,1\n").unwrap(),
            LoadOutcome::Malformed { .. }
        ));
    }

    #[test]
    fn header_only_input_yields_empty_table() {
        let ds = parsed("a,b\n");
        assert_eq!(ds.row_count(), 0);
        assert_eq!(ds.column_count(), 2);
    }
}
