//! Analytics, storage and reporting for uploaded equipment datasets,
//! shared by the HTTP API and the command-line tools.

pub mod analytics;
pub mod config;
pub mod datasets;
pub mod db;
pub mod error;
pub mod report;
pub mod repository;
pub mod users;

pub use error::{CoreError, Result};
