//! Serving boundary
//!
//! Accepts one new day for one athlete, pulls that athlete's stored history,
//! runs the engine in incremental mode and hands the five-field contract to a
//! trained classifier. The rule-based scorer is never consulted here.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, warn};

use crate::error::{ErrorSeverity, RiskRadarError};
use crate::features::FeatureEngine;
use crate::import::athlete_history;
use crate::models::{AthleteId, ModelFeatures, RiskZone, TelemetryRecord};

/// Output of a trained classifier for one feature vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierOutput {
    pub label: RiskZone,
    /// Probability of the predicted label, in [0, 1]
    pub confidence: f64,
}

/// A trained statistical classifier fitted on rule-derived labels
pub trait RiskClassifier: Send + Sync {
    fn predict(&self, features: &ModelFeatures) -> anyhow::Result<ClassifierOutput>;
}

/// Successful serving response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskPrediction {
    pub athlete_id: AthleteId,
    pub next_7_days_predicted_risk: RiskZone,
    /// Confidence rounded to two decimals
    pub confidence: f64,
    pub status: String,
}

/// Generic failure response; the original message is kept for operators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServingFailure {
    pub detail: String,
}

impl fmt::Display for ServingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.detail)
    }
}

impl std::error::Error for ServingFailure {}

impl From<RiskRadarError> for ServingFailure {
    fn from(err: RiskRadarError) -> Self {
        ServingFailure {
            detail: err.to_string(),
        }
    }
}

/// Incremental engine plus trained classifier
pub struct PredictionService<C> {
    engine: FeatureEngine,
    classifier: C,
}

impl<C: RiskClassifier> PredictionService<C> {
    pub fn new(engine: FeatureEngine, classifier: C) -> Self {
        Self { engine, classifier }
    }

    /// Predict next-week risk for the athlete of `today`.
    ///
    /// `stored_history` may contain every athlete; only records of
    /// `today.athlete_id` are used.
    pub fn predict_risk(
        &self,
        stored_history: &[TelemetryRecord],
        today: &TelemetryRecord,
    ) -> Result<RiskPrediction, ServingFailure> {
        self.try_predict(stored_history, today).map_err(|err| {
            match err.severity() {
                ErrorSeverity::Warning => {
                    warn!(athlete_id = today.athlete_id, detail = %err, "Risk prediction rejected")
                }
                ErrorSeverity::Error | ErrorSeverity::Critical => {
                    error!(athlete_id = today.athlete_id, detail = %err, "Risk prediction failed")
                }
            }
            ServingFailure::from(err)
        })
    }

    fn try_predict(
        &self,
        stored_history: &[TelemetryRecord],
        today: &TelemetryRecord,
    ) -> Result<RiskPrediction, RiskRadarError> {
        let history = athlete_history(stored_history, today.athlete_id);
        let vector = self.engine.transform_incremental(&history, today)?;
        let features = vector.model_features().ok_or_else(|| {
            RiskRadarError::Classifier("feature vector missing model fields".to_string())
        })?;

        let output = self
            .classifier
            .predict(&features)
            .map_err(|e| RiskRadarError::Classifier(format!("{:#}", e)))?;
        if !(0.0..=1.0).contains(&output.confidence) {
            return Err(RiskRadarError::Classifier(format!(
                "confidence out of range: {}",
                output.confidence
            )));
        }

        info!(
            athlete_id = today.athlete_id,
            date = %today.date,
            label = %output.label,
            confidence = output.confidence,
            "Risk predicted"
        );

        Ok(RiskPrediction {
            athlete_id: today.athlete_id,
            next_7_days_predicted_risk: output.label,
            confidence: round2(output.confidence),
            status: "success".to_string(),
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
