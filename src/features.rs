//! Windowing & Normalization Engine
//!
//! One per-athlete pipeline serves both invocation modes:
//!
//! - **Batch**: the full multi-athlete history is grouped by athlete, each
//!   series is engineered independently (optionally on the rayon pool) and
//!   remaining gaps are closed with a per-athlete forward/backward fill.
//! - **Incremental**: one athlete's stored history plus a new day is
//!   engineered with the same pipeline and only the new day's vector is
//!   returned. No fill is applied; an undefined feature is an error.
//!
//! Because both modes call [`FeatureEngine::engineer_series`] on the same
//! ordered series, the new day's vector from incremental mode equals the
//! batch value for that day when batch mode is fed the identical prefix.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::EngineError;
use crate::models::{AthleteId, EnrichedRecord, FeatureVector, TelemetryRecord};
use crate::window::{
    fill_gaps, rolling_mean, rolling_std, scoped_max_ratio, scoped_z_scores, ScopeKind,
    ScopeProvider, WindowSpec,
};

/// Engine configuration with customizable windows and guards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Short-term load window (default: 7 days, min 3)
    pub load_short: WindowSpec,

    /// Long-term load window (default: 14 days, min 5)
    pub load_long: WindowSpec,

    /// HRV z-score baseline window (default: 7 days, min 3)
    pub hrv_baseline: WindowSpec,

    /// Window over `load_7d` used for the monotony deviation (default: 7 days, min 3)
    pub monotony: WindowSpec,

    /// Added to every denominator that may be zero
    pub epsilon: f64,

    /// Decay constant in days for the past-injury term
    pub injury_decay_days: f64,

    /// Prior records required for an incremental query
    pub min_incremental_history: usize,

    /// Scope for the HRV z-score and recovery normalizers
    pub scope: ScopeKind,

    /// Engineer athletes concurrently in batch mode
    pub parallel: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            load_short: WindowSpec::new(7, 3),
            load_long: WindowSpec::new(14, 5),
            hrv_baseline: WindowSpec::new(7, 3),
            monotony: WindowSpec::new(7, 3),
            epsilon: 1e-6,
            injury_decay_days: 60.0,
            min_incremental_history: 60,
            scope: ScopeKind::WholeSeries,
            parallel: true,
        }
    }
}

impl EngineConfig {
    /// Reject windows and guards that would make features meaningless
    pub fn validate(&self) -> Result<(), EngineError> {
        let windows = [
            ("load_short", self.load_short),
            ("load_long", self.load_long),
            ("hrv_baseline", self.hrv_baseline),
            ("monotony", self.monotony),
        ];
        for (name, spec) in windows {
            if spec.window == 0 || spec.min_periods > spec.window {
                return Err(EngineError::InvalidParameter {
                    parameter: name.to_string(),
                    value: format!("window={} min_periods={}", spec.window, spec.min_periods),
                });
            }
        }
        if let ScopeKind::Trailing { window: 0 } = self.scope {
            return Err(EngineError::InvalidParameter {
                parameter: "scope.window".to_string(),
                value: "0".to_string(),
            });
        }
        if !(self.epsilon > 0.0) {
            return Err(EngineError::InvalidParameter {
                parameter: "epsilon".to_string(),
                value: self.epsilon.to_string(),
            });
        }
        if !(self.injury_decay_days > 0.0) {
            return Err(EngineError::InvalidParameter {
                parameter: "injury_decay_days".to_string(),
                value: self.injury_decay_days.to_string(),
            });
        }
        Ok(())
    }
}

/// How the engine is invoked
#[derive(Debug, Clone)]
pub enum TransformMode {
    /// Full multi-athlete history in, enriched dataset out
    Batch,
    /// One athlete's history plus a new day in, the new day's vector out
    Incremental { new_day: TelemetryRecord },
}

/// Result of [`FeatureEngine::transform`]
#[derive(Debug, Clone)]
pub enum TransformOutput {
    Enriched(EnrichedDataset),
    Single(FeatureVector),
}

/// Batch-mode output
#[derive(Debug, Clone, Default)]
pub struct EnrichedDataset {
    /// Records ordered by athlete id, then date
    pub records: Vec<EnrichedRecord>,

    /// Athletes whose input arrived out of date order and had to be sorted
    pub resorted_athletes: Vec<AthleteId>,
}

/// Core feature engineering engine
#[derive(Clone)]
pub struct FeatureEngine {
    config: EngineConfig,
    scope: Arc<dyn ScopeProvider>,
}

impl FeatureEngine {
    /// Create new engine with default configuration
    pub fn new() -> Self {
        Self::from_parts(EngineConfig::default())
    }

    /// Create new engine with custom configuration
    pub fn with_config(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self::from_parts(config))
    }

    fn from_parts(config: EngineConfig) -> Self {
        let scope: Arc<dyn ScopeProvider> = Arc::new(config.scope);
        FeatureEngine { config, scope }
    }

    /// Replace the normalization scope with a custom provider
    pub fn with_scope_provider(mut self, scope: Arc<dyn ScopeProvider>) -> Self {
        self.scope = scope;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scope_provider(&self) -> &dyn ScopeProvider {
        self.scope.as_ref()
    }

    /// Single entry point for both invocation modes
    pub fn transform(
        &self,
        history: &[TelemetryRecord],
        mode: TransformMode,
    ) -> Result<TransformOutput, EngineError> {
        match mode {
            TransformMode::Batch => self.transform_batch(history).map(TransformOutput::Enriched),
            TransformMode::Incremental { new_day } => self
                .transform_incremental(history, &new_day)
                .map(TransformOutput::Single),
        }
    }

    /// Engineer features for every record of a multi-athlete history
    #[instrument(skip_all, fields(records = history.len()))]
    pub fn transform_batch(
        &self,
        history: &[TelemetryRecord],
    ) -> Result<EnrichedDataset, EngineError> {
        let mut grouped: BTreeMap<AthleteId, Vec<TelemetryRecord>> = BTreeMap::new();
        for record in history {
            check_values(record)?;
            grouped
                .entry(record.athlete_id)
                .or_default()
                .push(record.clone());
        }

        let mut resorted_athletes = Vec::new();
        for (athlete_id, series) in grouped.iter_mut() {
            if check_strict_order(series).is_err() {
                series.sort_by_key(|r| r.date);
                check_strict_order(series)?;
                warn!(
                    athlete_id,
                    scope = self.scope.name(),
                    "Telemetry arrived out of date order; sorted defensively"
                );
                resorted_athletes.push(*athlete_id);
            }
        }

        let series: Vec<Vec<TelemetryRecord>> = grouped.into_values().collect();
        let engineer = |records: Vec<TelemetryRecord>| -> Vec<EnrichedRecord> {
            let mut features = self.engineer_series(&records);
            fill_windowed_gaps(&mut features);
            debug!(
                athlete_id = records.first().map(|r| r.athlete_id),
                days = records.len(),
                "Engineered athlete series"
            );
            records
                .into_iter()
                .zip(features)
                .map(|(record, features)| EnrichedRecord { record, features })
                .collect()
        };

        let athletes = series.len();
        let records: Vec<EnrichedRecord> = if self.config.parallel {
            series.into_par_iter().flat_map_iter(engineer).collect()
        } else {
            series.into_iter().flat_map(engineer).collect()
        };

        info!(
            athletes,
            records = records.len(),
            resorted = resorted_athletes.len(),
            "Batch feature engineering complete"
        );

        Ok(EnrichedDataset {
            records,
            resorted_athletes,
        })
    }

    /// Engineer the feature vector of one new day given the athlete's history.
    ///
    /// `history` must hold only this athlete's records in strict date order,
    /// all dated before `new_day`. Nothing is sorted or filled.
    pub fn transform_incremental(
        &self,
        history: &[TelemetryRecord],
        new_day: &TelemetryRecord,
    ) -> Result<FeatureVector, EngineError> {
        let athlete_id = new_day.athlete_id;
        if let Some(other) = history.iter().find(|r| r.athlete_id != athlete_id) {
            return Err(EngineError::AthleteMismatch {
                expected: athlete_id,
                found: other.athlete_id,
            });
        }

        let required = self.config.min_incremental_history;
        if history.len() < required {
            return Err(EngineError::InsufficientHistory {
                athlete_id,
                required,
                available: history.len(),
            });
        }

        let mut series = Vec::with_capacity(history.len() + 1);
        series.extend_from_slice(history);
        series.push(new_day.clone());
        check_strict_order(&series)?;
        series.iter().try_for_each(check_values)?;

        let features = self
            .engineer_series(&series)
            .pop()
            .ok_or(EngineError::InsufficientHistory {
                athlete_id,
                required,
                available: 0,
            })?;

        if let Some(field) = features.first_missing() {
            return Err(EngineError::IncompleteFeatures {
                athlete_id,
                date: new_day.date,
                field,
            });
        }

        debug!(athlete_id, date = %new_day.date, "Engineered incremental feature vector");
        Ok(features)
    }

    /// Per-athlete pipeline shared by both modes.
    ///
    /// `series` is one athlete's records in strict date order. Windowed values
    /// that lack `min_periods` observations are left as `None`.
    pub fn engineer_series(&self, series: &[TelemetryRecord]) -> Vec<FeatureVector> {
        let cfg = &self.config;
        let eps = cfg.epsilon;
        let scope = self.scope.as_ref();

        let load_log: Vec<f64> = series.iter().map(|r| r.daily_load.ln_1p()).collect();
        let hrv: Vec<f64> = series.iter().map(|r| r.hrv).collect();
        let resting_hr: Vec<f64> = series.iter().map(|r| r.resting_hr).collect();

        let hrv_z = scoped_z_scores(&hrv, scope, eps);

        let load_opt: Vec<Option<f64>> = load_log.iter().copied().map(Some).collect();
        let load_7d = rolling_mean(&load_opt, cfg.load_short);
        let load_14d = rolling_mean(&load_opt, cfg.load_long);

        let hrv_z_opt: Vec<Option<f64>> = hrv_z.iter().copied().map(Some).collect();
        let hrv_7d_mean = rolling_mean(&hrv_z_opt, cfg.hrv_baseline);

        let load_7d_std = rolling_std(&load_7d, cfg.monotony);

        let hrv_ratio = scoped_max_ratio(&hrv_z, &hrv_z, scope, true, eps);
        let hr_ratio = scoped_max_ratio(&resting_hr, &resting_hr, scope, false, eps);

        series
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let hrv_drop = hrv_7d_mean[i].map(|baseline| hrv_z[i] - baseline);
                let training_monotony = match (load_7d[i], load_7d_std[i]) {
                    (Some(load), Some(std)) => Some(load / (std + eps)),
                    _ => None,
                };
                let training_strain = match (load_7d[i], training_monotony) {
                    (Some(load), Some(monotony)) => Some(load * monotony),
                    _ => None,
                };

                FeatureVector {
                    load_log: load_log[i],
                    load_7d: load_7d[i],
                    load_14d: load_14d[i],
                    hrv_z: hrv_z[i],
                    hrv_7d_mean: hrv_7d_mean[i],
                    hrv_drop,
                    training_monotony,
                    training_strain,
                    training_monotony_log: training_monotony.map(f64::ln_1p),
                    training_strain_log: training_strain.map(f64::ln_1p),
                    recovery_score: 0.5 * record.sleep_quality + 0.3 * hrv_ratio[i]
                        - 0.2 * hr_ratio[i],
                    history_risk: history_risk(
                        record.past_injury,
                        record.days_since_injury,
                        cfg.injury_decay_days,
                    ),
                }
            })
            .collect()
    }
}

impl Default for FeatureEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FeatureEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureEngine")
            .field("config", &self.config)
            .field("scope", &self.scope.name())
            .finish()
    }
}

/// Exponential recency decay of a past injury
pub fn history_risk(past_injury: bool, days_since_injury: u32, decay_days: f64) -> f64 {
    if past_injury {
        (-(days_since_injury as f64) / decay_days).exp()
    } else {
        0.0
    }
}

/// Reject telemetry the feature formulas cannot take: non-finite inputs and
/// negative load.
pub fn check_values(record: &TelemetryRecord) -> Result<(), EngineError> {
    let fields = [
        ("daily_load", record.daily_load),
        ("resting_hr", record.resting_hr),
        ("hrv", record.hrv),
        ("sleep_quality", record.sleep_quality),
    ];
    for (field, value) in fields {
        if !value.is_finite() || (field == "daily_load" && value < 0.0) {
            return Err(EngineError::InvalidValue {
                athlete_id: record.athlete_id,
                date: record.date,
                field,
                value,
            });
        }
    }
    Ok(())
}

/// Verify one athlete's series is strictly increasing by date
pub fn check_strict_order(series: &[TelemetryRecord]) -> Result<(), EngineError> {
    for pair in series.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.date == prev.date {
            return Err(EngineError::DuplicateRecord {
                athlete_id: next.athlete_id,
                date: next.date,
            });
        }
        if next.date < prev.date {
            return Err(EngineError::OrderingViolation {
                athlete_id: next.athlete_id,
                date: next.date,
                previous: prev.date,
            });
        }
    }
    Ok(())
}

// Each column is filled on its own so no value crosses into another feature.
fn fill_windowed_gaps(features: &mut [FeatureVector]) {
    type Column = fn(&mut FeatureVector) -> &mut Option<f64>;
    let columns: [Column; 8] = [
        |f| &mut f.load_7d,
        |f| &mut f.load_14d,
        |f| &mut f.hrv_7d_mean,
        |f| &mut f.hrv_drop,
        |f| &mut f.training_monotony,
        |f| &mut f.training_strain,
        |f| &mut f.training_monotony_log,
        |f| &mut f.training_strain_log,
    ];

    for column in columns {
        let mut values: Vec<Option<f64>> = features.iter_mut().map(|f| *column(f)).collect();
        fill_gaps(&mut values);
        for (feature, value) in features.iter_mut().zip(values) {
            *column(feature) = value;
        }
    }
}
