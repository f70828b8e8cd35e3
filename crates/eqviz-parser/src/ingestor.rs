use std::borrow::Cow;

use csv::{ReaderBuilder, StringRecord};
use tracing::{error, info};

use crate::errors::IngestError;
use crate::model::{Column, EquipmentRecord, NumericField};

const LATIN1_FALLBACK_WARNING: &str = "File was not UTF-8 encoded, used latin-1 encoding.";

/// Parses uploaded equipment CSV files into validated records.
///
/// Fatal problems end up in [`CsvIngestor::errors`], recoverable ones in
/// [`CsvIngestor::warnings`]. Both lists describe the most recent call to
/// [`CsvIngestor::parse`] only.
#[derive(Debug, Default)]
pub struct CsvIngestor {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl CsvIngestor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cleaned records and whether parsing succeeded. On failure
    /// the record list is always empty.
    pub fn parse(&mut self, content: &[u8]) -> (Vec<EquipmentRecord>, bool) {
        self.errors.clear();
        self.warnings.clear();

        match self.ingest(content) {
            Ok(records) => {
                info!(records = records.len(), "parsed equipment CSV");
                (records, true)
            }
            Err(err) => {
                if let IngestError::Unexpected(reason) = &err {
                    error!(%reason, "unexpected failure while parsing equipment CSV");
                }
                self.errors.push(err.to_string());
                (Vec::new(), false)
            }
        }
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    fn ingest(&mut self, content: &[u8]) -> Result<Vec<EquipmentRecord>, IngestError> {
        let text = self.decode(content);
        let body = text.strip_prefix('\u{feff}').unwrap_or(text.as_ref());

        if body.trim().is_empty() {
            return Err(IngestError::EmptyFile);
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(body.as_bytes());

        let headers = reader.headers()?.clone();
        let positions = ColumnPositions::resolve(&headers)?;

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            if record.len() > headers.len() {
                return Err(IngestError::FieldCount {
                    line: record.position().map(|pos| pos.line()).unwrap_or_default(),
                    expected: headers.len(),
                    found: record.len(),
                });
            }
            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }
            rows.push(RawRow::from_record(&record, &positions));
        }

        self.validate(rows)
    }

    fn decode<'a>(&mut self, content: &'a [u8]) -> Cow<'a, str> {
        match std::str::from_utf8(content) {
            Ok(text) => Cow::Borrowed(text),
            Err(_) => {
                self.warnings.push(LATIN1_FALLBACK_WARNING.to_string());
                Cow::Owned(content.iter().copied().map(char::from).collect())
            }
        }
    }

    fn validate(&mut self, rows: Vec<RawRow>) -> Result<Vec<EquipmentRecord>, IngestError> {
        if rows.is_empty() {
            return Err(IngestError::NoDataRows);
        }

        for column in Column::REQUIRED {
            let missing = rows.iter().filter(|row| row.is_missing(column)).count();
            if missing > 0 {
                self.warnings
                    .push(format!("Column '{column}' has {missing} missing values."));
            }
        }

        let negative = NumericField::ALL.map(|field| {
            rows.iter()
                .any(|row| row.value(field).is_some_and(|value| value < 0.0))
        });

        let total = rows.len();
        let complete: Vec<RawRow> = rows
            .into_iter()
            .filter(|row| !row.is_missing_numeric())
            .collect();
        let dropped = total - complete.len();
        if dropped > 0 {
            self.warnings.push(format!(
                "Dropped {dropped} rows with missing numeric values."
            ));
        }

        let mut records = Vec::with_capacity(complete.len());
        let mut unlabeled = 0usize;
        for row in complete {
            match row.into_record() {
                Some(record) => records.push(record),
                None => unlabeled += 1,
            }
        }
        if unlabeled > 0 {
            self.warnings.push(format!(
                "Dropped {unlabeled} rows with missing name or type."
            ));
        }

        if records.is_empty() {
            return Err(IngestError::NoValidRows);
        }

        for (field, negative) in NumericField::ALL.into_iter().zip(negative) {
            if negative {
                self.warnings.push(format!(
                    "Column '{}' contains negative values.",
                    field.display_name()
                ));
            }
        }

        Ok(records)
    }
}

/// Header index of every required column.
#[derive(Debug, Clone, Copy)]
struct ColumnPositions([usize; 5]);

impl ColumnPositions {
    /// Exact header matches win; otherwise the first header equal to the
    /// column name ignoring case and surrounding whitespace is used.
    fn resolve(headers: &StringRecord) -> Result<Self, IngestError> {
        let mut positions = [0usize; 5];
        let mut missing = Vec::new();

        for (slot, column) in positions.iter_mut().zip(Column::REQUIRED) {
            let found = headers
                .iter()
                .position(|header| header == column.display_name())
                .or_else(|| headers.iter().position(|header| column.matches_header(header)));
            match found {
                Some(index) => *slot = index,
                None => missing.push(column.display_name().to_string()),
            }
        }

        if missing.is_empty() {
            Ok(Self(positions))
        } else {
            Err(IngestError::MissingColumns { columns: missing })
        }
    }

    fn index(&self, column: Column) -> usize {
        self.0[column as usize]
    }
}

#[derive(Debug)]
struct RawRow {
    name: Option<String>,
    equipment_type: Option<String>,
    flowrate: Option<f64>,
    pressure: Option<f64>,
    temperature: Option<f64>,
}

impl RawRow {
    fn from_record(record: &StringRecord, positions: &ColumnPositions) -> Self {
        let text = |column: Column| parse_text(record.get(positions.index(column)));
        let number = |column: Column| record.get(positions.index(column)).and_then(parse_numeric);

        Self {
            name: text(Column::Name),
            equipment_type: text(Column::Type),
            flowrate: number(Column::Flowrate),
            pressure: number(Column::Pressure),
            temperature: number(Column::Temperature),
        }
    }

    fn is_missing(&self, column: Column) -> bool {
        match column {
            Column::Name => self.name.is_none(),
            Column::Type => self.equipment_type.is_none(),
            Column::Flowrate => self.flowrate.is_none(),
            Column::Pressure => self.pressure.is_none(),
            Column::Temperature => self.temperature.is_none(),
        }
    }

    fn value(&self, field: NumericField) -> Option<f64> {
        match field {
            NumericField::Flowrate => self.flowrate,
            NumericField::Pressure => self.pressure,
            NumericField::Temperature => self.temperature,
        }
    }

    fn is_missing_numeric(&self) -> bool {
        self.flowrate.is_none() || self.pressure.is_none() || self.temperature.is_none()
    }

    fn into_record(self) -> Option<EquipmentRecord> {
        Some(EquipmentRecord {
            name: self.name?,
            equipment_type: self.equipment_type?,
            flowrate: self.flowrate?,
            pressure: self.pressure?,
            temperature: self.temperature?,
        })
    }
}

fn parse_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Numeric coercion: anything that is not a finite number counts as missing.
pub(crate) fn parse_numeric(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}
