pub mod errors;
pub mod ingestor;
pub mod model;

pub use errors::IngestError;
pub use ingestor::CsvIngestor;
pub use model::{Column, EquipmentRecord, NumericField};

#[cfg(test)]
mod tests;
