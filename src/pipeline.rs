//! Offline label generation: engineer, score, classify, partition

use std::time::Instant;
use tracing::info;

use crate::config::AppConfig;
use crate::error::Result;
use crate::features::FeatureEngine;
use crate::logging::RunReport;
use crate::models::{LabeledRecord, TelemetryRecord};
use crate::partition::{partition, Partition};
use crate::scoring::{NormalizationScope, RiskScorer, ZoneCounts};

/// Everything the classifier trainer needs from one labeling run
#[derive(Debug, Clone)]
pub struct LabelRun {
    pub labeled: Vec<LabeledRecord>,
    pub partition: Partition<LabeledRecord>,
    pub zones: ZoneCounts,
    pub report: RunReport,
}

/// Builds a leakage-free labeled training set from raw telemetry
pub struct LabelPipeline {
    engine: FeatureEngine,
    scorer: RiskScorer,
    train_fraction: f64,
}

impl LabelPipeline {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let engine = FeatureEngine::with_config(config.engine.clone())?;
        Ok(Self {
            engine,
            scorer: RiskScorer::with_config(config.scoring.clone())
                .with_parallelism(config.engine.parallel),
            train_fraction: config.partition.train_fraction,
        })
    }

    pub fn engine(&self) -> &FeatureEngine {
        &self.engine
    }

    pub fn run(&self, telemetry: &[TelemetryRecord]) -> Result<LabelRun> {
        let started = Instant::now();
        let mut report = RunReport::new("label");
        report.record("records", telemetry.len());
        report.record("scope", self.engine.scope_provider().name());

        let dataset = self.engine.transform_batch(telemetry)?;
        for athlete_id in &dataset.resorted_athletes {
            report.warn(format!("athlete {} arrived out of date order", athlete_id));
        }
        if !self.engine.scope_provider().is_causal() {
            report.warn(
                "normalization scope looks ahead: batch z-scores use later days of each athlete",
            );
        }

        let scope = NormalizationScope::from_vectors(dataset.records.iter().map(|r| &r.features));
        for component in scope.degenerate_components() {
            report.warn(format!("degenerate normalization scope: {}", component.name()));
        }

        let labeled = self.scorer.label_with_scope(&dataset.records, &scope);
        let zones = ZoneCounts::from_labels(&labeled);
        let partition = partition(&labeled, self.train_fraction)?;

        report.record("train", partition.train.len());
        report.record("test", partition.test.len());
        report.finish(started.elapsed());

        info!(
            records = labeled.len(),
            train = partition.train.len(),
            test = partition.test.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Label pipeline complete"
        );

        Ok(LabelRun {
            labeled,
            partition,
            zones,
            report,
        })
    }
}
