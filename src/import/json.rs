use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;

use super::{missing_columns, TelemetryImporter};
use crate::error::{ImportError, Result};
use crate::models::TelemetryRecord;

/// JSON telemetry: a single day object or an array of days
pub struct JsonTelemetryImporter;

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonTelemetry {
    Many(Vec<TelemetryRecord>),
    One(TelemetryRecord),
}

impl JsonTelemetryImporter {
    /// Parse one day or an array of days.
    ///
    /// Objects lacking required fields fail with `MissingColumns`, the same
    /// error the CSV importer raises for absent headers.
    pub fn parse(&self, content: &str) -> Result<Vec<TelemetryRecord>> {
        let value: Value = serde_json::from_str(content)?;

        let objects: Vec<&Map<String, Value>> = match &value {
            Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
            Value::Object(map) => vec![map],
            _ => Vec::new(),
        };
        let mut missing: Vec<String> = Vec::new();
        for object in objects {
            for column in missing_columns(object.keys().map(String::as_str)) {
                if !missing.contains(&column) {
                    missing.push(column);
                }
            }
        }
        if !missing.is_empty() {
            return Err(ImportError::MissingColumns { columns: missing }.into());
        }

        Ok(match serde_json::from_value(value)? {
            JsonTelemetry::Many(records) => records,
            JsonTelemetry::One(record) => vec![record],
        })
    }
}

impl TelemetryImporter for JsonTelemetryImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        file_path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("json"))
    }

    fn import_file(&self, file_path: &Path) -> Result<Vec<TelemetryRecord>> {
        let content = std::fs::read_to_string(file_path)?;
        self.parse(&content)
    }

    fn format_name(&self) -> &'static str {
        "JSON"
    }
}
