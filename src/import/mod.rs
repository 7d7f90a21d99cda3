//! Telemetry import
//!
//! Loads materialized telemetry into memory. Column validation happens here,
//! before the engine sees a single record.

use std::path::Path;

use crate::error::{ImportError, Result};
use crate::models::{AthleteId, TelemetryRecord};

pub mod csv;
pub mod json;

/// Columns every telemetry source must provide
pub const REQUIRED_COLUMNS: [&str; 8] = [
    "athlete_id",
    "date",
    "daily_load",
    "hrv",
    "sleep_quality",
    "resting_hr",
    "past_injury",
    "days_since_injury",
];

/// Trait for importing telemetry from different file formats
pub trait TelemetryImporter {
    /// Check if this importer can handle the given file
    fn can_import(&self, file_path: &Path) -> bool;

    /// Import telemetry records from the file
    fn import_file(&self, file_path: &Path) -> Result<Vec<TelemetryRecord>>;

    /// Get the format name for this importer
    fn format_name(&self) -> &'static str;
}

/// Picks an importer by file extension
pub struct ImportManager {
    importers: Vec<Box<dyn TelemetryImporter>>,
}

impl ImportManager {
    pub fn new() -> Self {
        let importers: Vec<Box<dyn TelemetryImporter>> = vec![
            Box::new(csv::CsvTelemetryImporter::new()),
            Box::new(json::JsonTelemetryImporter),
        ];
        Self { importers }
    }

    /// Import a single file, auto-detecting the format
    pub fn import_file(&self, file_path: &Path) -> Result<Vec<TelemetryRecord>> {
        let importer = self
            .importers
            .iter()
            .find(|i| i.can_import(file_path))
            .ok_or_else(|| ImportError::ParseError {
                row: 0,
                reason: format!("no importer for {}", file_path.display()),
            })?;

        tracing::info!(
            file = %file_path.display(),
            format = importer.format_name(),
            "Importing telemetry"
        );
        let records = importer.import_file(file_path)?;
        if records.is_empty() {
            return Err(ImportError::Empty.into());
        }
        Ok(records)
    }
}

impl Default for ImportManager {
    fn default() -> Self {
        Self::new()
    }
}

/// One athlete's records, in input order
pub fn athlete_history(records: &[TelemetryRecord], athlete_id: AthleteId) -> Vec<TelemetryRecord> {
    records
        .iter()
        .filter(|r| r.athlete_id == athlete_id)
        .cloned()
        .collect()
}

/// Required columns absent from a header set
pub fn missing_columns<'a, I>(headers: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let present: Vec<&str> = headers.into_iter().collect();
    REQUIRED_COLUMNS
        .iter()
        .filter(|c| !present.contains(c))
        .map(|c| c.to_string())
        .collect()
}
