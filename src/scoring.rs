//! Rule-based risk scoring and zone classification
//!
//! The scorer manufactures training labels offline. Every component except
//! `history_risk` is min-max normalized against a [`NormalizationScope`], an
//! immutable snapshot of the batch being labeled. A single-record scope
//! degenerates to zero for every normalized component, which is why
//! serving-time predictions go through the trained classifier instead.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::models::{EnrichedRecord, FeatureVector, LabeledRecord, RiskAssessment, RiskZone};

/// Normalized score components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    /// `load_7d`
    Load,
    /// `-hrv_drop`
    Fatigue,
    /// `training_monotony_log`
    Monotony,
    /// `recovery_score`, inverted after normalization
    Recovery,
}

impl Component {
    pub const ALL: [Component; 4] = [
        Component::Load,
        Component::Fatigue,
        Component::Monotony,
        Component::Recovery,
    ];

    /// Raw value of this component for a feature vector
    pub fn extract(&self, features: &FeatureVector) -> Option<f64> {
        match self {
            Component::Load => features.load_7d,
            Component::Fatigue => features.hrv_drop.map(|drop| -drop),
            Component::Monotony => features.training_monotony_log,
            Component::Recovery => Some(features.recovery_score),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Component::Load => "load_7d",
            Component::Fatigue => "-hrv_drop",
            Component::Monotony => "training_monotony_log",
            Component::Recovery => "recovery_score",
        }
    }
}

/// Observed range of one component
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentRange {
    pub min: f64,
    pub max: f64,
}

impl ComponentRange {
    pub fn is_degenerate(&self) -> bool {
        self.min == self.max
    }

    fn normalize(&self, value: f64, epsilon: f64) -> f64 {
        (value - self.min) / (self.max - self.min + epsilon)
    }
}

/// Immutable min/max snapshot of a scoring batch.
///
/// Built once per labeling pass and shared by reference; nothing mutates it
/// after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationScope {
    load: Option<ComponentRange>,
    fatigue: Option<ComponentRange>,
    monotony: Option<ComponentRange>,
    recovery: Option<ComponentRange>,
    size: usize,
}

impl NormalizationScope {
    /// Snapshot the component ranges over every vector of the batch.
    ///
    /// Missing values are skipped. Components with zero spread are reported
    /// through a warning and [`NormalizationScope::degenerate_components`].
    pub fn from_vectors<'a, I>(vectors: I) -> Self
    where
        I: IntoIterator<Item = &'a FeatureVector>,
    {
        let mut ranges: [Option<ComponentRange>; 4] = [None; 4];
        let mut size = 0;

        for vector in vectors {
            size += 1;
            for (slot, component) in ranges.iter_mut().zip(Component::ALL) {
                let Some(value) = component.extract(vector) else {
                    continue;
                };
                if !value.is_finite() {
                    continue;
                }
                let next = match *slot {
                    Some(range) => ComponentRange {
                        min: range.min.min(value),
                        max: range.max.max(value),
                    },
                    None => ComponentRange {
                        min: value,
                        max: value,
                    },
                };
                *slot = Some(next);
            }
        }

        let [load, fatigue, monotony, recovery] = ranges;
        let scope = NormalizationScope {
            load,
            fatigue,
            monotony,
            recovery,
            size,
        };

        for component in scope.degenerate_components() {
            warn!(
                component = component.name(),
                records = size,
                "Degenerate normalization scope: zero variance, normalized values collapse to 0"
            );
        }

        scope
    }

    /// Range of a component, `None` if the batch never defined it
    pub fn range(&self, component: Component) -> Option<ComponentRange> {
        match component {
            Component::Load => self.load,
            Component::Fatigue => self.fatigue,
            Component::Monotony => self.monotony,
            Component::Recovery => self.recovery,
        }
    }

    /// Components whose minimum equals their maximum
    pub fn degenerate_components(&self) -> Vec<Component> {
        Component::ALL
            .into_iter()
            .filter(|c| self.range(*c).map_or(false, |r| r.is_degenerate()))
            .collect()
    }

    /// Number of vectors the snapshot was taken over
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// Component weights of the risk score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    pub load: f64,
    pub fatigue: f64,
    pub monotony: f64,
    pub recovery: f64,
    /// Applied to `history_risk` without normalization
    pub history: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        RiskWeights {
            load: 0.25,
            fatigue: 0.25,
            monotony: 0.15,
            recovery: 0.20,
            history: 0.15,
        }
    }
}

/// Scoring configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: RiskWeights,

    /// Added to the min-max denominator
    pub epsilon: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            weights: RiskWeights::default(),
            epsilon: 1e-6,
        }
    }
}

/// Deterministic rule-based risk scorer
#[derive(Debug, Clone)]
pub struct RiskScorer {
    config: ScoringConfig,
    parallel: bool,
}

impl RiskScorer {
    pub fn new() -> Self {
        Self::with_config(ScoringConfig::default())
    }

    pub fn with_config(config: ScoringConfig) -> Self {
        RiskScorer {
            config,
            parallel: true,
        }
    }

    /// Score records on the rayon pool (default) or on the calling thread
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Continuous risk score; `None` when any input is undefined
    pub fn risk_score(&self, features: &FeatureVector, scope: &NormalizationScope) -> Option<f64> {
        let eps = self.config.epsilon;
        let w = &self.config.weights;
        let normalized = |component: Component| -> Option<f64> {
            let value = component.extract(features)?;
            Some(scope.range(component)?.normalize(value, eps))
        };

        let load = normalized(Component::Load)?;
        let fatigue = normalized(Component::Fatigue)?;
        let monotony = normalized(Component::Monotony)?;
        let recovery = normalized(Component::Recovery)?;

        let score = w.load * load
            + w.fatigue * fatigue
            + w.monotony * monotony
            + w.recovery * (1.0 - recovery)
            + w.history * features.history_risk;

        score.is_finite().then_some(score)
    }

    /// Score a vector and classify it into a zone
    pub fn score(&self, features: &FeatureVector, scope: &NormalizationScope) -> RiskAssessment {
        let risk_score = self.risk_score(features, scope);
        RiskAssessment {
            risk_score,
            risk_zone: classify(risk_score),
        }
    }

    /// Label an enriched batch against a snapshot of itself
    pub fn label_batch(&self, records: &[EnrichedRecord]) -> Vec<LabeledRecord> {
        let scope = NormalizationScope::from_vectors(records.iter().map(|r| &r.features));
        self.label_with_scope(records, &scope)
    }

    /// Label records against an already captured scope
    pub fn label_with_scope(
        &self,
        records: &[EnrichedRecord],
        scope: &NormalizationScope,
    ) -> Vec<LabeledRecord> {
        let label = |r: &EnrichedRecord| LabeledRecord {
            record: r.record.clone(),
            features: r.features.clone(),
            assessment: self.score(&r.features, scope),
        };
        let labeled: Vec<LabeledRecord> = if self.parallel {
            records.par_iter().map(label).collect()
        } else {
            records.iter().map(label).collect()
        };

        let summary = ZoneCounts::from_labels(&labeled);
        info!(
            records = labeled.len(),
            safe = summary.safe,
            moderate = summary.moderate,
            high = summary.high,
            unknown = summary.unknown,
            "Risk labels generated"
        );
        labeled
    }
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self::new()
    }
}

/// Zone of a risk score; a pure function of the score alone
pub fn classify(score: Option<f64>) -> RiskZone {
    RiskZone::from_score(score)
}

/// Label distribution of a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneCounts {
    pub safe: usize,
    pub moderate: usize,
    pub high: usize,
    pub unknown: usize,
}

impl ZoneCounts {
    pub fn from_labels(records: &[LabeledRecord]) -> Self {
        let mut counts = ZoneCounts::default();
        for record in records {
            match record.assessment.risk_zone {
                RiskZone::Safe => counts.safe += 1,
                RiskZone::Moderate => counts.moderate += 1,
                RiskZone::High => counts.high += 1,
                RiskZone::Unknown => counts.unknown += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.safe + self.moderate + self.high + self.unknown
    }
}
