//! Unified error hierarchy for RiskRadar
//!
//! Engine errors carry the athlete id and the offending field or date so that
//! a failed request can be diagnosed without re-running the pipeline.

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::AthleteId;

/// Top-level error type for all RiskRadar operations
#[derive(Debug, Error)]
pub enum RiskRadarError {
    /// Windowing and normalization engine errors
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Train/test partitioning errors
    #[error("Partition error: {0}")]
    Partition(#[from] PartitionError),

    /// Telemetry import errors
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading/writing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// External classifier failures at serving time
    #[error("Classifier error: {0}")]
    Classifier(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Errors raised by the windowing engine
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// Incremental mode needs a minimum amount of prior history
    #[error("Insufficient history for athlete {athlete_id}: need at least {required} prior records, found {available}")]
    InsufficientHistory {
        athlete_id: AthleteId,
        required: usize,
        available: usize,
    },

    /// Records for an athlete are not strictly ordered by date
    #[error("Ordering violation for athlete {athlete_id}: {date} follows {previous}")]
    OrderingViolation {
        athlete_id: AthleteId,
        date: NaiveDate,
        previous: NaiveDate,
    },

    /// Two records share the same (athlete, date) key
    #[error("Duplicate record for athlete {athlete_id} on {date}")]
    DuplicateRecord { athlete_id: AthleteId, date: NaiveDate },

    /// A record for a different athlete was passed to a single-athlete call
    #[error("Athlete mismatch: expected {expected}, found {found}")]
    AthleteMismatch { expected: AthleteId, found: AthleteId },

    /// A telemetry value is negative where it must not be, or not finite
    #[error("Invalid {field} value {value} for athlete {athlete_id} on {date}")]
    InvalidValue {
        athlete_id: AthleteId,
        date: NaiveDate,
        field: &'static str,
        value: f64,
    },

    /// A feature is undefined or not finite for the requested day
    #[error("Feature {field} is undefined for athlete {athlete_id} on {date}")]
    IncompleteFeatures {
        athlete_id: AthleteId,
        date: NaiveDate,
        field: &'static str,
    },

    /// Engine configuration is out of range
    #[error("Invalid parameter {parameter}={value}")]
    InvalidParameter { parameter: String, value: String },
}

/// Errors raised by the temporal partitioner
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PartitionError {
    /// Train fraction outside [0, 1]
    #[error("Train fraction must be within [0, 1], got {0}")]
    InvalidFraction(f64),

    /// Two records share the same (athlete, date) key
    #[error("Duplicate record for athlete {athlete_id} on {date}")]
    DuplicateRecord { athlete_id: AthleteId, date: NaiveDate },

    /// A train record is dated after a test record of the same athlete
    #[error("Temporal leak for athlete {athlete_id}: train ends {train_end}, test starts {test_start}")]
    TemporalLeak {
        athlete_id: AthleteId,
        train_end: NaiveDate,
        test_start: NaiveDate,
    },
}

/// Telemetry import errors
#[derive(Debug, Error)]
pub enum ImportError {
    /// Required telemetry columns are absent from the input
    #[error("Missing required columns: {}", columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    /// A row could not be parsed
    #[error("Parse error at row {row}: {reason}")]
    ParseError { row: usize, reason: String },

    /// The input contained no telemetry rows
    #[error("No telemetry records found")]
    Empty,
}

/// Result type alias for RiskRadar operations
pub type Result<T> = std::result::Result<T, RiskRadarError>;

impl RiskRadarError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            RiskRadarError::Engine(EngineError::InsufficientHistory { .. }) => {
                ErrorSeverity::Warning
            }
            RiskRadarError::Engine(EngineError::InvalidParameter { .. }) => ErrorSeverity::Critical,
            RiskRadarError::Partition(PartitionError::TemporalLeak { .. }) => {
                ErrorSeverity::Critical
            }
            RiskRadarError::Configuration(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            RiskRadarError::Engine(EngineError::InsufficientHistory {
                athlete_id,
                required,
                ..
            }) => format!(
                "Athlete {} must have at least {} days of history.",
                athlete_id, required
            ),
            RiskRadarError::Import(ImportError::MissingColumns { columns }) => format!(
                "Missing required columns for feature engineering: {}",
                columns.join(", ")
            ),
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Pipeline output cannot be trusted
    Critical,
    /// Request failed
    Error,
    /// Expected rejection of a request
    Warning,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_error_severity() {
        let err = RiskRadarError::Engine(EngineError::InsufficientHistory {
            athlete_id: 3,
            required: 60,
            available: 12,
        });
        assert_eq!(err.severity(), ErrorSeverity::Warning);

        let err = RiskRadarError::Partition(PartitionError::TemporalLeak {
            athlete_id: 1,
            train_end: day(5),
            test_start: day(4),
        });
        assert_eq!(err.severity(), ErrorSeverity::Critical);

        let err = RiskRadarError::from(EngineError::InvalidValue {
            athlete_id: 2,
            date: day(9),
            field: "daily_load",
            value: -5.0,
        });
        assert_eq!(err.severity(), ErrorSeverity::Error);
        assert!(err.to_string().contains("daily_load"));
        assert_eq!(
            RiskRadarError::Classifier("model not loaded".to_string()).severity(),
            ErrorSeverity::Error
        );
    }

    #[test]
    fn test_messages_carry_context() {
        let err = EngineError::OrderingViolation {
            athlete_id: 7,
            date: day(2),
            previous: day(3),
        };
        let msg = err.to_string();
        assert!(msg.contains("athlete 7"));
        assert!(msg.contains("2024-01-02"));

        let err = RiskRadarError::Import(ImportError::MissingColumns {
            columns: vec!["hrv".to_string(), "resting_hr".to_string()],
        });
        assert!(err.user_message().contains("hrv, resting_hr"));
    }

    #[test]
    fn test_insufficient_history_user_message() {
        let err = RiskRadarError::from(EngineError::InsufficientHistory {
            athlete_id: 4,
            required: 60,
            available: 10,
        });
        assert!(err.user_message().contains("at least 60 days"));
    }
}
