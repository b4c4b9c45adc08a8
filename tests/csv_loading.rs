use dtype_workbench::ingestion::csv::{read_csv_bytes, read_csv_from_reader};
use dtype_workbench::ingestion::{load_from_path, LoadOptions, LoadOutcome, TableFormat};
use dtype_workbench::types::{DataType, Value};

fn parsed(outcome: LoadOutcome) -> dtype_workbench::types::DataSet {
    match outcome {
        LoadOutcome::Parsed(ds) => ds,
        other => panic!("expected a table, got {other:?}"),
    }
}

#[test]
fn load_csv_fixture_infers_column_types() {
    let ds = parsed(load_from_path("tests/fixtures/people.csv", &LoadOptions::default()).unwrap());

    assert_eq!(ds.row_count(), 4);
    assert_eq!(
        ds.dtypes(),
        vec![
            ("id".to_string(), "int64"),
            ("name".to_string(), "string"),
            ("score".to_string(), "float64"),
            ("active".to_string(), "bool"),
            ("joined".to_string(), "string"),
        ]
    );
    assert_eq!(
        ds.rows[0],
        vec![
            Value::Int64(1),
            Value::Utf8("Ada".to_string()),
            Value::Float64(98.5),
            Value::Bool(true),
            Value::Utf8("2024-01-02".to_string()),
        ]
    );
    assert_eq!(ds.rows[1][2], Value::Null);
    assert_eq!(ds.rows[3][3], Value::Null);
}

#[test]
fn read_csv_from_reader_honors_reader_settings() {
    let input = "id;name\n1;Ada\n2;Grace\n";
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .from_reader(input.as_bytes());

    let ds = parsed(read_csv_from_reader(&mut rdr).unwrap());
    assert_eq!(ds.schema.field_names().collect::<Vec<_>>(), vec!["id", "name"]);
    assert_eq!(ds.rows[1][1], Value::Utf8("Grace".to_string()));
}

#[test]
fn duplicate_headers_get_numbered_suffixes() {
    let ds = parsed(read_csv_bytes(b"a,a,b,a\n1,2,3,4\n").unwrap());
    assert_eq!(
        ds.schema.field_names().collect::<Vec<_>>(),
        vec!["a", "a.1", "b", "a.2"]
    );
}

#[test]
fn na_spellings_are_missing() {
    let ds = parsed(read_csv_bytes(b"qty,label\nNA,x\n3,N/A\n,null\n7,y\n").unwrap());
    assert_eq!(ds.schema.fields[0].data_type, DataType::Int64);
    assert_eq!(ds.column("qty").unwrap(), vec![Value::Null, Value::Int64(3), Value::Null, Value::Int64(7)]);
    assert_eq!(ds.column("label").unwrap()[1], Value::Null);
}

#[test]
fn ragged_records_are_malformed() {
    let outcome = read_csv_bytes(b"a,b\n1,2\n3\n").unwrap();
    assert!(matches!(outcome, LoadOutcome::Malformed { format: TableFormat::Csv, .. }));
}

#[test]
fn empty_and_invalid_utf8_input_is_malformed() {
    assert!(matches!(
        read_csv_bytes(b"").unwrap(),
        LoadOutcome::Malformed { format: TableFormat::Csv, .. }
    ));
    assert!(matches!(
        read_csv_bytes(b"  \n").unwrap(),
        LoadOutcome::Malformed { .. }
    ));
    assert!(matches!(
        read_csv_bytes(b"name\n\xff\xfe\n").unwrap(),
        LoadOutcome::Malformed { .. }
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_from_path("tests/fixtures/does_not_exist.csv", &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, dtype_workbench::LoadError::Io(_)));
}
