//! Dataset export
//!
//! Writes enriched and labeled datasets as CSV or JSON. Undefined windowed
//! features are written as empty CSV cells and `null` in JSON.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::{Result, RiskRadarError};
use crate::models::{EnrichedRecord, FeatureVector, LabeledRecord, TelemetryRecord};

pub mod ml;

/// Export format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl std::str::FromStr for ExportFormat {
    type Err = RiskRadarError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(RiskRadarError::Configuration(format!(
                "Unsupported export format: {}",
                s
            ))),
        }
    }
}

const TELEMETRY_HEADER: [&str; 8] = [
    "athlete_id",
    "date",
    "daily_load",
    "resting_hr",
    "hrv",
    "sleep_quality",
    "past_injury",
    "days_since_injury",
];

const FEATURE_HEADER: [&str; 12] = [
    "daily_load_log",
    "load_7d",
    "load_14d",
    "hrv_z",
    "hrv_7d_mean",
    "hrv_drop",
    "training_monotony",
    "training_strain",
    "training_monotony_log",
    "training_strain_log",
    "recovery_score",
    "history_risk",
];

/// Write a labeled dataset to `path`
pub fn export_labeled<P: AsRef<Path>>(
    records: &[LabeledRecord],
    path: P,
    format: ExportFormat,
) -> Result<()> {
    let file = File::create(path.as_ref())?;
    match format {
        ExportFormat::Csv => write_labeled_csv(records, file)?,
        ExportFormat::Json => serde_json::to_writer_pretty(file, records)?,
    }
    tracing::info!(
        path = %path.as_ref().display(),
        records = records.len(),
        "Labeled dataset exported"
    );
    Ok(())
}

/// Enriched records as CSV: telemetry columns followed by every feature
pub fn write_enriched_csv<W: Write>(records: &[EnrichedRecord], writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);

    let header: Vec<&str> = TELEMETRY_HEADER.iter().chain(FEATURE_HEADER.iter()).copied().collect();
    writer.write_record(&header)?;

    for r in records {
        let mut row = telemetry_cells(&r.record);
        row.extend(feature_cells(&r.features));
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

/// Labeled records as CSV: enriched columns plus `risk_score` and `risk_zone`
pub fn write_labeled_csv<W: Write>(records: &[LabeledRecord], writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);

    let header: Vec<&str> = TELEMETRY_HEADER
        .iter()
        .chain(FEATURE_HEADER.iter())
        .chain(["risk_score", "risk_zone"].iter())
        .copied()
        .collect();
    writer.write_record(&header)?;

    for r in records {
        let mut row = telemetry_cells(&r.record);
        row.extend(feature_cells(&r.features));
        row.push(format_optional_f64(r.assessment.risk_score));
        row.push(r.assessment.risk_zone.to_string());
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

fn telemetry_cells(record: &TelemetryRecord) -> Vec<String> {
    vec![
        record.athlete_id.to_string(),
        record.date.to_string(),
        record.daily_load.to_string(),
        record.resting_hr.to_string(),
        record.hrv.to_string(),
        record.sleep_quality.to_string(),
        u8::from(record.past_injury).to_string(),
        record.days_since_injury.to_string(),
    ]
}

fn feature_cells(features: &FeatureVector) -> Vec<String> {
    vec![
        features.load_log.to_string(),
        format_optional_f64(features.load_7d),
        format_optional_f64(features.load_14d),
        features.hrv_z.to_string(),
        format_optional_f64(features.hrv_7d_mean),
        format_optional_f64(features.hrv_drop),
        format_optional_f64(features.training_monotony),
        format_optional_f64(features.training_strain),
        format_optional_f64(features.training_monotony_log),
        format_optional_f64(features.training_strain_log),
        features.recovery_score.to_string(),
        features.history_risk.to_string(),
    ]
}

pub(crate) fn format_optional_f64(value: Option<f64>) -> String {
    value.map_or_else(String::new, |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RiskAssessment, RiskZone};
    use chrono::NaiveDate;

    fn labeled(score: Option<f64>) -> LabeledRecord {
        LabeledRecord {
            record: TelemetryRecord {
                athlete_id: 2,
                date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                daily_load: 310.0,
                resting_hr: 54.0,
                hrv: 68.0,
                sleep_quality: 0.75,
                past_injury: true,
                days_since_injury: 30,
            },
            features: FeatureVector {
                load_7d: Some(5.5),
                ..FeatureVector::default()
            },
            assessment: RiskAssessment {
                risk_score: score,
                risk_zone: RiskZone::from_score(score),
            },
        }
    }

    #[test]
    fn test_labeled_csv_layout() {
        let mut buffer = Vec::new();
        write_labeled_csv(&[labeled(Some(0.5)), labeled(None)], &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("athlete_id,date,daily_load"));
        assert!(lines[0].ends_with("risk_score,risk_zone"));
        assert!(lines[1].starts_with("2,2024-05-01,310,54,68,0.75,1,30"));
        assert!(lines[1].ends_with("0.5,Moderate"));
        assert!(lines[2].ends_with(",Unknown"));
    }

    #[test]
    fn test_enriched_csv_leaves_missing_cells_empty() {
        let record = labeled(None);
        let enriched = EnrichedRecord {
            record: record.record,
            features: record.features,
        };
        let mut buffer = Vec::new();
        write_enriched_csv(&[enriched], &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let row: Vec<&str> = text.lines().nth(1).unwrap().split(',').collect();
        assert_eq!(row.len(), 20);
        assert_eq!(row[9], "5.5");
        assert_eq!(row[10], "");
    }

    #[test]
    fn test_export_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("pdf".parse::<ExportFormat>().is_err());
    }
}
