use thiserror::Error;

/// Fatal ingestion failures. The `Display` text is what callers report to
/// the uploader.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("The uploaded file is empty.")]
    EmptyFile,

    #[error("Failed to parse CSV: {source}")]
    Csv {
        #[source]
        source: csv::Error,
    },

    #[error("Failed to parse CSV: Expected {expected} fields in line {line}, saw {found}")]
    FieldCount {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("Missing required columns: {}", .columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    #[error("No valid data rows found in the file.")]
    NoDataRows,

    #[error("No valid data rows after cleaning.")]
    NoValidRows,

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl From<csv::Error> for IngestError {
    fn from(source: csv::Error) -> Self {
        if source.is_io_error() {
            IngestError::Unexpected(source.to_string())
        } else {
            IngestError::Csv { source }
        }
    }
}
