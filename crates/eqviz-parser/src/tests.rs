use std::fs;
use std::path::PathBuf;

use crate::errors::IngestError;
use crate::ingestor::{parse_numeric, CsvIngestor};
use crate::model::{Column, EquipmentRecord, NumericField};

fn fixture(path: &str) -> Vec<u8> {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let full_path = base.join("tests/data").join(path);
    fs::read(&full_path)
        .unwrap_or_else(|err| panic!("failed to read fixture {}: {}", full_path.display(), err))
}

fn parse(content: &str) -> (Vec<EquipmentRecord>, bool, CsvIngestor) {
    let mut ingestor = CsvIngestor::new();
    let (records, success) = ingestor.parse(content.as_bytes());
    (records, success, ingestor)
}

#[test]
fn parses_sample_dataset() {
    let mut ingestor = CsvIngestor::new();
    let (records, success) = ingestor.parse(&fixture("sample_equipment_data.csv"));

    assert!(success);
    assert!(ingestor.errors().is_empty());
    assert!(ingestor.warnings().is_empty());
    assert_eq!(records.len(), 15);
    assert_eq!(
        records[0],
        EquipmentRecord::new("Pump-1", "Pump", 120.0, 5.2, 110.0)
    );
    assert_eq!(records[14].name, "Valve-3");
}

#[test]
fn accepts_case_and_whitespace_variants_of_headers() {
    let mut ingestor = CsvIngestor::new();
    let (records, success) = ingestor.parse(&fixture("messy_headers.csv"));

    assert!(success, "errors: {:?}", ingestor.errors());
    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["Pump-1", "Reactor-1"]);
    assert_eq!(records[0].equipment_type, "Pump");

    assert_eq!(
        ingestor.warnings(),
        [
            "Column 'Flowrate' has 1 missing values.",
            "Column 'Temperature' has 1 missing values.",
            "Dropped 2 rows with missing numeric values.",
            "Column 'Pressure' contains negative values.",
        ]
    );
}

#[test]
fn missing_pressure_column_is_named_exactly() {
    let (records, success, ingestor) = parse(
        "Equipment Name,Type,Flowrate,Temperature\n\
         Pump-1,Pump,10,90\n",
    );

    assert!(!success);
    assert!(records.is_empty());
    assert_eq!(ingestor.errors(), ["Missing required columns: Pressure"]);
}

#[test]
fn lowercase_padded_pressure_header_is_not_missing() {
    let (records, success, ingestor) = parse(
        "Equipment Name,Type,Flowrate,pressure ,Temperature\n\
         Pump-1,Pump,10,4.5,90\n",
    );

    assert!(success, "errors: {:?}", ingestor.errors());
    assert_eq!(records[0].pressure, 4.5);
}

#[test]
fn lists_every_missing_column_in_required_order() {
    let (_, success, ingestor) = parse("Flowrate,Equipment Name\n1,a\n");

    assert!(!success);
    assert_eq!(
        ingestor.errors(),
        ["Missing required columns: Type, Pressure, Temperature"]
    );
}

#[test]
fn non_numeric_flowrate_everywhere_leaves_no_valid_rows() {
    let (records, success, ingestor) = parse(
        "Equipment Name,Type,Flowrate,Pressure,Temperature\n\
         Pump-1,Pump,fast,5,90\n\
         Pump-2,Pump,slow,5,91\n",
    );

    assert!(!success);
    assert!(records.is_empty());
    assert_eq!(ingestor.errors(), ["No valid data rows after cleaning."]);
    assert_eq!(
        ingestor.warnings(),
        [
            "Column 'Flowrate' has 2 missing values.",
            "Dropped 2 rows with missing numeric values.",
        ]
    );
}

#[test]
fn empty_input_is_reported() {
    for content in ["", "   \n\n  "] {
        let (_, success, ingestor) = parse(content);
        assert!(!success);
        assert_eq!(ingestor.errors(), ["The uploaded file is empty."]);
    }
}

#[test]
fn header_only_file_has_no_data_rows() {
    let (_, success, ingestor) = parse("Equipment Name,Type,Flowrate,Pressure,Temperature\n");

    assert!(!success);
    assert_eq!(ingestor.errors(), ["No valid data rows found in the file."]);
}

#[test]
fn fully_blank_rows_are_dropped_without_warning() {
    let (records, success, ingestor) = parse(
        "Equipment Name,Type,Flowrate,Pressure,Temperature\n\
         ,,,,\n\
         Pump-1,Pump,10,5,90\n\
         , , , ,\n",
    );

    assert!(success);
    assert_eq!(records.len(), 1);
    assert!(ingestor.warnings().is_empty());
}

#[test]
fn row_with_extra_fields_is_a_syntax_error() {
    let (_, success, ingestor) = parse(
        "Equipment Name,Type,Flowrate,Pressure,Temperature\n\
         Pump-1,Pump,10,5,90\n\
         Pump-2,Pump,10,5,90,extra\n",
    );

    assert!(!success);
    assert_eq!(
        ingestor.errors(),
        ["Failed to parse CSV: Expected 5 fields in line 3, saw 6"]
    );
}

#[test]
fn unterminated_quote_is_a_syntax_error() {
    let (_, success, ingestor) = parse(
        "Equipment Name,Type,Flowrate,Pressure,Temperature\n\
         \"Pump-1,Pump,10,5,90\n",
    );

    assert!(!success);
    assert_eq!(ingestor.errors().len(), 1);
    assert!(
        ingestor.errors()[0].starts_with("Failed to parse CSV")
            || ingestor.errors()[0].starts_with("No valid data rows"),
        "unexpected error: {:?}",
        ingestor.errors()
    );
}

#[test]
fn falls_back_to_latin1_with_warning() {
    let mut ingestor = CsvIngestor::new();
    let (records, success) = ingestor.parse(&fixture("latin1_equipment.csv"));

    assert!(success);
    assert_eq!(records[0].name, "K\u{f6}hler-1");
    assert_eq!(records[1].name, "M\u{fc}ller-2");
    assert_eq!(
        ingestor.warnings(),
        ["File was not UTF-8 encoded, used latin-1 encoding."]
    );
}

#[test]
fn leading_byte_order_mark_is_ignored() {
    let content = "\u{feff}Equipment Name,Type,Flowrate,Pressure,Temperature\nPump-1,Pump,1,2,3\n";
    let (records, success, ingestor) = parse(content);

    assert!(success, "errors: {:?}", ingestor.errors());
    assert_eq!(records.len(), 1);
}

#[test]
fn rows_without_name_or_type_are_dropped() {
    let (records, success, ingestor) = parse(
        "Equipment Name,Type,Flowrate,Pressure,Temperature\n\
         ,Pump,10,5,90\n\
         Valve-1,  ,10,5,90\n\
         Valve-2,Valve,10,5,90\n",
    );

    assert!(success);
    assert_eq!(records.len(), 1);
    assert_eq!(
        ingestor.warnings(),
        [
            "Column 'Equipment Name' has 1 missing values.",
            "Column 'Type' has 1 missing values.",
            "Dropped 2 rows with missing name or type.",
        ]
    );
}

#[test]
fn negative_values_warn_once_per_column() {
    let (records, success, ingestor) = parse(
        "Equipment Name,Type,Flowrate,Pressure,Temperature\n\
         Chiller-1,Condenser,-1,5,-20\n\
         Chiller-2,Condenser,-2,5,-25\n",
    );

    assert!(success);
    assert_eq!(records.len(), 2);
    assert_eq!(
        ingestor.warnings(),
        [
            "Column 'Flowrate' contains negative values.",
            "Column 'Temperature' contains negative values.",
        ]
    );
}

#[test]
fn negative_value_in_dropped_row_still_warns() {
    let (records, success, ingestor) = parse(
        "Equipment Name,Type,Flowrate,Pressure,Temperature\n\
         P1,Pump,-5,,100\n\
         P2,Pump,10,5,100\n",
    );

    assert!(success);
    assert_eq!(records, [EquipmentRecord::new("P2", "Pump", 10.0, 5.0, 100.0)]);
    assert_eq!(
        ingestor.warnings(),
        [
            "Column 'Pressure' has 1 missing values.",
            "Dropped 1 rows with missing numeric values.",
            "Column 'Flowrate' contains negative values.",
        ]
    );
}

#[test]
fn messages_are_reset_between_calls() {
    let mut ingestor = CsvIngestor::new();
    let (_, first) = ingestor.parse(b"Type\nPump\n");
    assert!(!first);
    assert_eq!(ingestor.errors().len(), 1);

    let (_, second) = ingestor.parse(&fixture("sample_equipment_data.csv"));
    assert!(second);
    assert!(ingestor.errors().is_empty());
    assert!(ingestor.warnings().is_empty());
}

#[test]
fn numeric_coercion_rejects_non_finite_values() {
    assert_eq!(parse_numeric(" 12.5 "), Some(12.5));
    assert_eq!(parse_numeric("1e3"), Some(1000.0));
    assert_eq!(parse_numeric("-4"), Some(-4.0));
    assert_eq!(parse_numeric("NaN"), None);
    assert_eq!(parse_numeric("inf"), None);
    assert_eq!(parse_numeric(""), None);
    assert_eq!(parse_numeric("12 bar"), None);
}

#[test]
fn missing_columns_error_joins_names() {
    let err = IngestError::MissingColumns {
        columns: vec!["Type".into(), "Pressure".into()],
    };
    assert_eq!(err.to_string(), "Missing required columns: Type, Pressure");
}

#[test]
fn records_serialize_with_internal_field_names() {
    let record = EquipmentRecord::new("Pump-1", "Pump", 1.0, 2.0, 3.0);
    let json = serde_json::to_value(&record).expect("serialize record");

    assert_eq!(json["name"], "Pump-1");
    assert_eq!(json["type"], "Pump");
    assert_eq!(json["temperature"], 3.0);

    let fields: Vec<&str> = Column::REQUIRED.iter().map(|c| c.field_name()).collect();
    assert_eq!(fields, ["name", "type", "flowrate", "pressure", "temperature"]);
    assert_eq!(NumericField::Pressure.column(), Column::Pressure);
}
