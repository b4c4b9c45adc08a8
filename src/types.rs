//! Core data model types.
//!
//! Loaded files become an in-memory [`DataSet`]: a [`Schema`] (a list of typed [`Field`]s) plus
//! row-major [`Value`] storage. Unlike a schema-first reader, the schema here is inferred from the
//! file and later rewritten column by column by [`crate::conversion`].

use std::fmt;

use chrono::NaiveDateTime;

/// Logical data type for a schema field.
///
/// Integer widths share [`Value::Int64`] storage; the width is a property of the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 8-bit signed integer.
    Int8,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit floating point number.
    Float32,
    /// 64-bit floating point number.
    Float64,
    /// Boolean.
    Bool,
    /// Naive (timezone-less) timestamp.
    Datetime,
    /// UTF-8 string.
    Utf8,
}

impl DataType {
    /// Label shown to users when listing column types.
    pub fn display_name(&self) -> &'static str {
        match self {
            DataType::Int8 => "int8",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::Bool => "bool",
            DataType::Datetime => "datetime",
            DataType::Utf8 => "string",
        }
    }

    /// Smallest signed integer width holding every value in `min..=max`.
    pub fn narrowest_integer(min: i64, max: i64) -> Self {
        let fits = |lo: i64, hi: i64| min >= lo && max <= hi;
        if fits(i8::MIN.into(), i8::MAX.into()) {
            DataType::Int8
        } else if fits(i16::MIN.into(), i16::MAX.into()) {
            DataType::Int16
        } else if fits(i32::MIN.into(), i32::MAX.into()) {
            DataType::Int32
        } else {
            DataType::Int64
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered list of fields describing the shape of a [`DataSet`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// A single typed value in a [`DataSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// Signed integer (any width).
    Int64(i64),
    /// Reduced-precision float.
    Float32(f32),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// Naive timestamp.
    Datetime(NaiveDateTime),
    /// UTF-8 string.
    Utf8(String),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v:?}"),
            Value::Float64(v) => write!(f, "{v:?}"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Datetime(ts) => {
                if ts.and_utc().timestamp_subsec_nanos() == 0 {
                    write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S"))
                } else {
                    write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f"))
                }
            }
            Value::Utf8(s) => f.write_str(s),
        }
    }
}

/// In-memory tabular dataset.
///
/// Rows are stored as `Vec<Vec<Value>>` in the same order as the [`Schema`] fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataSet {
    /// Schema describing row shape.
    pub schema: Schema,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl DataSet {
    /// Create a dataset from schema and rows.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        Self { schema, rows }
    }

    /// Number of rows in the dataset.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns in the dataset.
    pub fn column_count(&self) -> usize {
        self.schema.fields.len()
    }

    /// Clone out a single column by name.
    pub fn column(&self, name: &str) -> Option<Vec<Value>> {
        let idx = self.schema.index_of(name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(idx).cloned().unwrap_or(Value::Null))
                .collect(),
        )
    }

    /// `(column name, dtype label)` pairs in schema order.
    pub fn dtypes(&self) -> Vec<(String, &'static str)> {
        self.schema
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.data_type.display_name()))
            .collect()
    }

    /// Replace a column's type and values in place.
    ///
    /// Returns `false` (leaving the dataset untouched) if the column does not exist.
    ///
    /// # Panics
    ///
    /// Panics if `values` does not hold exactly one value per row.
    pub fn replace_column(&mut self, name: &str, data_type: DataType, values: Vec<Value>) -> bool {
        let Some(idx) = self.schema.index_of(name) else {
            return false;
        };
        assert!(
            values.len() == self.rows.len(),
            "replacement column length {} does not match row count {}",
            values.len(),
            self.rows.len()
        );

        self.schema.fields[idx].data_type = data_type;
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[idx] = value;
        }
        true
    }
}

/// The live table plus the snapshot taken when it was loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Display name (uploaded file name or remote locator).
    pub name: String,
    /// Snapshot taken at load time; never mutated.
    original: DataSet,
    /// Working copy mutated by conversions.
    pub current: DataSet,
}

impl Dataset {
    /// Wrap a freshly loaded table, snapshotting it as the original.
    pub fn new(name: impl Into<String>, table: DataSet) -> Self {
        Self {
            name: name.into(),
            original: table.clone(),
            current: table,
        }
    }

    /// The table as it was loaded.
    pub fn original(&self) -> &DataSet {
        &self.original
    }

    /// Discard every conversion applied since load.
    pub fn revert(&mut self) {
        self.current = self.original.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataSet {
        DataSet::new(
            Schema::new(vec![
                Field::new("id", DataType::Int64),
                Field::new("name", DataType::Utf8),
            ]),
            vec![
                vec![Value::Int64(1), Value::Utf8("a".to_string())],
                vec![Value::Int64(2), Value::Null],
            ],
        )
    }

    #[test]
    fn narrowest_integer_picks_smallest_width() {
        assert_eq!(DataType::narrowest_integer(-128, 127), DataType::Int8);
        assert_eq!(DataType::narrowest_integer(0, 128), DataType::Int16);
        assert_eq!(DataType::narrowest_integer(-40_000, 0), DataType::Int32);
        assert_eq!(DataType::narrowest_integer(0, i64::from(i32::MAX) + 1), DataType::Int64);
    }

    #[test]
    fn replace_column_updates_type_and_values() {
        let mut ds = sample();
        let ok = ds.replace_column(
            "id",
            DataType::Utf8,
            vec![Value::Utf8("1".to_string()), Value::Utf8("2".to_string())],
        );
        assert!(ok);
        assert_eq!(ds.schema.fields[0].data_type, DataType::Utf8);
        assert_eq!(ds.rows[1][0], Value::Utf8("2".to_string()));
        assert!(!ds.replace_column("missing", DataType::Bool, vec![]));
    }

    #[test]
    #[should_panic(expected = "replacement column length")]
    fn replace_column_panics_on_wrong_length() {
        let mut ds = sample();
        ds.replace_column("id", DataType::Int64, vec![Value::Null]);
    }

    #[test]
    fn dataset_revert_restores_original() {
        let mut live = Dataset::new("people.csv", sample());
        live.current
            .replace_column("id", DataType::Int8, vec![Value::Null, Value::Null]);
        assert_ne!(&live.current, live.original());
        live.revert();
        assert_eq!(&live.current, live.original());
    }

    #[test]
    fn value_display_matches_dataframe_rendering() {
        assert_eq!(Value::Float64(1.0).to_string(), "1.0");
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::Null.to_string(), "");
        let ts = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(3, 4, 5))
            .unwrap();
        assert_eq!(Value::Datetime(ts).to_string(), "2024-01-02 03:04:05");
    }
}
