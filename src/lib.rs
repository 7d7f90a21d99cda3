// Library interface for RiskRadar modules
// Integration tests and the CLI both build on these

pub mod config;
pub mod error;
pub mod export;
pub mod features;
pub mod import;
pub mod logging;
pub mod models;
pub mod partition;
pub mod pipeline;
pub mod scoring;
pub mod serving;
pub mod window;

// Re-export commonly used types for convenience
pub use models::*;
pub use features::{EngineConfig, EnrichedDataset, FeatureEngine, TransformMode, TransformOutput};
pub use scoring::{classify, NormalizationScope, RiskScorer, ScoringConfig};
pub use partition::{partition, Partition, PartitionConfig};
pub use pipeline::{LabelPipeline, LabelRun};
pub use serving::{ClassifierOutput, PredictionService, RiskClassifier, RiskPrediction};
pub use window::{ScopeKind, ScopeProvider, WindowSpec};
pub use error::{RiskRadarError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel, RunReport};
