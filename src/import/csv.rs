use csv::{ReaderBuilder, StringRecord};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use super::{missing_columns, TelemetryImporter};
use crate::error::{ImportError, Result};
use crate::models::TelemetryRecord;

/// CSV telemetry importer with flexible column naming
pub struct CsvTelemetryImporter {
    column_mapping: HashMap<String, String>,
}

impl CsvTelemetryImporter {
    pub fn new() -> Self {
        let mut column_mapping = HashMap::new();

        Self::add_mapping(&mut column_mapping, "athlete_id", &["athlete_id", "athlete", "athleteid"]);
        Self::add_mapping(&mut column_mapping, "date", &["date", "day"]);
        Self::add_mapping(
            &mut column_mapping,
            "daily_load",
            &["daily_load", "load", "training_load"],
        );
        Self::add_mapping(&mut column_mapping, "hrv", &["hrv", "rmssd"]);
        Self::add_mapping(
            &mut column_mapping,
            "resting_hr",
            &["resting_hr", "rhr", "resting_heart_rate"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "sleep_quality",
            &["sleep_quality", "sleep", "sleep_score"],
        );
        Self::add_mapping(&mut column_mapping, "past_injury", &["past_injury", "injured"]);
        Self::add_mapping(
            &mut column_mapping,
            "days_since_injury",
            &["days_since_injury", "days_since_last_injury"],
        );

        Self { column_mapping }
    }

    fn add_mapping(mapping: &mut HashMap<String, String>, standard: &str, variations: &[&str]) {
        for variation in variations {
            mapping.insert(variation.to_lowercase(), standard.to_string());
        }
    }

    fn normalize_column_name(&self, name: &str) -> String {
        let normalized = name.trim().to_lowercase().replace([' ', '-'], "_");

        self.column_mapping
            .get(&normalized)
            .cloned()
            .unwrap_or(normalized)
    }

    /// Parse telemetry from any CSV reader
    pub fn read_from<R: Read>(&self, reader: R) -> Result<Vec<TelemetryRecord>> {
        let mut csv_reader = ReaderBuilder::new().has_headers(true).from_reader(reader);

        let headers: StringRecord = csv_reader
            .headers()?
            .iter()
            .map(|h| self.normalize_column_name(h))
            .collect();

        let missing = missing_columns(headers.iter());
        if !missing.is_empty() {
            return Err(ImportError::MissingColumns { columns: missing }.into());
        }

        let mut records = Vec::new();
        for (index, row) in csv_reader.records().enumerate() {
            let row = row?;
            let record: TelemetryRecord =
                row.deserialize(Some(&headers))
                    .map_err(|e| ImportError::ParseError {
                        row: index + 1,
                        reason: e.to_string(),
                    })?;
            records.push(record);
        }

        tracing::debug!(rows = records.len(), "Parsed telemetry CSV");
        Ok(records)
    }
}

impl Default for CsvTelemetryImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryImporter for CsvTelemetryImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        file_path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("csv"))
    }

    fn import_file(&self, file_path: &Path) -> Result<Vec<TelemetryRecord>> {
        let file = std::fs::File::open(file_path)?;
        self.read_from(file)
    }

    fn format_name(&self) -> &'static str {
        "CSV"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RiskRadarError;

    #[test]
    fn test_reads_telemetry_rows() {
        let data = "athlete_id,date,daily_load,resting_hr,hrv,sleep_quality,past_injury,days_since_injury\n\
                    1,2024-01-01,300.5,55,70.2,0.7,0,999\n\
                    1,2024-01-02,420,57,66,0.6,1,45\n";
        let records = CsvTelemetryImporter::new().read_from(data.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert!(!records[0].past_injury);
        assert!(records[1].past_injury);
        assert_eq!(records[1].days_since_injury, 45);
        assert_eq!(records[0].daily_load, 300.5);
    }

    #[test]
    fn test_column_aliases() {
        let data = "Athlete,Date,Load,RHR,HRV,Sleep,past_injury,days_since_injury,notes\n\
                    4,2024-02-01,250,60,55,0.8,false,999,easy day\n";
        let records = CsvTelemetryImporter::new().read_from(data.as_bytes()).unwrap();
        assert_eq!(records[0].athlete_id, 4);
        assert_eq!(records[0].resting_hr, 60.0);
    }

    #[test]
    fn test_missing_columns_fail_before_parsing() {
        let data = "athlete_id,date,daily_load\n1,2024-01-01,300\n";
        let err = CsvTelemetryImporter::new().read_from(data.as_bytes()).unwrap_err();
        match err {
            RiskRadarError::Import(ImportError::MissingColumns { columns }) => {
                assert!(columns.contains(&"hrv".to_string()));
                assert_eq!(columns.len(), 5);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_bad_row_reports_position() {
        let data = "athlete_id,date,daily_load,resting_hr,hrv,sleep_quality,past_injury,days_since_injury\n\
                    1,2024-01-01,300,55,70,0.7,0,999\n\
                    1,not-a-date,300,55,70,0.7,0,999\n";
        let err = CsvTelemetryImporter::new().read_from(data.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            RiskRadarError::Import(ImportError::ParseError { row: 2, .. })
        ));
    }
}
