use chrono::{Duration, NaiveDate};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use riskradar::config::AppConfig;
use riskradar::export::ml::TrainingSetExporter;
use riskradar::export::{export_labeled, ExportFormat};
use riskradar::import::ImportManager;
use riskradar::serving::ServingFailure;
use riskradar::{
    ClassifierOutput, FeatureEngine, LabelPipeline, LabeledRecord, ModelFeatures,
    PredictionService, RiskClassifier, RiskZone, ScopeKind, TelemetryRecord,
};

/// Workflows from telemetry files to labeled training sets and served predictions

fn write_telemetry_csv(dir: &Path, athletes: &[u32], days: usize) -> std::path::PathBuf {
    let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let mut content =
        String::from("athlete_id,date,daily_load,resting_hr,hrv,sleep_quality,past_injury,days_since_injury\n");

    for &athlete in athletes {
        for i in 0..days {
            let t = i as f64 + athlete as f64;
            let injured = athlete == athletes[0];
            content.push_str(&format!(
                "{},{},{:.1},{:.1},{:.1},{:.2},{},{}\n",
                athlete,
                start + Duration::days(i as i64),
                300.0 + 120.0 * (0.9 * t).sin(),
                54.0 + 2.5 * (0.4 * t).cos(),
                65.0 + 7.0 * (0.25 * t).sin(),
                0.6 + 0.25 * (1.3 * t).cos(),
                if injured { 1 } else { 0 },
                if injured { 20 + i } else { 999 },
            ));
        }
    }

    let path = dir.join("telemetry.csv");
    fs::write(&path, content).unwrap();
    path
}

fn load(path: &Path) -> Vec<TelemetryRecord> {
    ImportManager::new().import_file(path).unwrap()
}

/// Labels by load alone, standing in for a trained model
struct LoadThresholdClassifier;

impl RiskClassifier for LoadThresholdClassifier {
    fn predict(&self, features: &ModelFeatures) -> anyhow::Result<ClassifierOutput> {
        let label = if features.load_7d > 6.0 {
            RiskZone::High
        } else {
            RiskZone::Safe
        };
        Ok(ClassifierOutput {
            label,
            confidence: 0.876,
        })
    }
}

#[test]
fn test_label_pipeline_from_csv() {
    let dir = TempDir::new().unwrap();
    let input = write_telemetry_csv(dir.path(), &[1, 2, 3], 40);
    let telemetry = load(&input);
    assert_eq!(telemetry.len(), 120);
    assert!(telemetry.iter().filter(|r| r.athlete_id == 1).all(|r| r.past_injury));

    let run = LabelPipeline::from_config(&AppConfig::default())
        .unwrap()
        .run(&telemetry)
        .unwrap();

    assert_eq!(run.labeled.len(), 120);
    assert_eq!(run.zones.total(), 120);
    assert!(run.report.success);
    assert!(run
        .report
        .warnings
        .iter()
        .any(|w| w.contains("looks ahead")));

    // 40 days per athlete at 0.8 -> 32 train, 8 test
    assert_eq!(run.partition.train.len(), 96);
    assert_eq!(run.partition.test.len(), 24);
    for split in &run.partition.athletes {
        assert_eq!(split.train_len, 32);
        assert!(split.train_end.unwrap() < split.test_start.unwrap());
    }
}

#[test]
fn test_causal_scope_run_has_no_look_ahead_warning() {
    let dir = TempDir::new().unwrap();
    let input = write_telemetry_csv(dir.path(), &[4], 30);

    let mut config = AppConfig::default();
    config.engine.scope = ScopeKind::CausalExpanding;
    let run = LabelPipeline::from_config(&config)
        .unwrap()
        .run(&load(&input))
        .unwrap();

    assert!(run.report.warnings.iter().all(|w| !w.contains("looks ahead")));
    assert_eq!(run.labeled.len(), 30);
}

#[test]
fn test_labeled_export_round_trips_through_json() {
    let dir = TempDir::new().unwrap();
    let input = write_telemetry_csv(dir.path(), &[7, 9], 25);
    let run = LabelPipeline::from_config(&AppConfig::default())
        .unwrap()
        .run(&load(&input))
        .unwrap();

    let json_path = dir.path().join("labeled.json");
    export_labeled(&run.labeled, &json_path, ExportFormat::Json).unwrap();
    let restored: Vec<LabeledRecord> =
        serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(restored.len(), run.labeled.len());
    assert_eq!(restored[0].record, run.labeled[0].record);
    assert_eq!(
        restored[0].assessment.risk_zone,
        run.labeled[0].assessment.risk_zone
    );

    let csv_path = dir.path().join("labeled.csv");
    export_labeled(&run.labeled, &csv_path, ExportFormat::Csv).unwrap();
    let csv = fs::read_to_string(&csv_path).unwrap();
    let header = csv.lines().next().unwrap();
    assert!(header.starts_with("athlete_id,date,daily_load"));
    assert!(header.contains("risk_zone"));
    assert_eq!(csv.lines().count(), run.labeled.len() + 1);
}

#[test]
fn test_training_set_files() {
    let dir = TempDir::new().unwrap();
    let input = write_telemetry_csv(dir.path(), &[1, 2], 50);
    let run = LabelPipeline::from_config(&AppConfig::default())
        .unwrap()
        .run(&load(&input))
        .unwrap();

    let train_path = dir.path().join("train.csv");
    let test_path = dir.path().join("test.csv");
    let exporter = TrainingSetExporter {
        skip_undefined: false,
    };
    let (train_rows, test_rows) = exporter
        .export_partition(&run.partition, &train_path, &test_path)
        .unwrap();
    assert_eq!(train_rows, 80);
    assert_eq!(test_rows, 20);

    let train = fs::read_to_string(&train_path).unwrap();
    assert_eq!(
        train.lines().next().unwrap(),
        "athlete_id,date,load_7d,hrv_drop,training_monotony_log,recovery_score,history_risk,risk_zone,split"
    );
    assert!(train.lines().skip(1).all(|line| line.ends_with(",train")));

    let test = fs::read_to_string(&test_path).unwrap();
    assert!(test.lines().skip(1).all(|line| line.ends_with(",test")));
}

#[test]
fn test_serving_uses_only_requesting_athlete() {
    let dir = TempDir::new().unwrap();
    let input = write_telemetry_csv(dir.path(), &[1, 2], 61);
    let stored = load(&input);

    let today = stored
        .iter()
        .filter(|r| r.athlete_id == 2)
        .last()
        .cloned()
        .unwrap();
    let history: Vec<TelemetryRecord> = stored.into_iter().filter(|r| r.key() != today.key()).collect();

    let service = PredictionService::new(FeatureEngine::new(), LoadThresholdClassifier);
    let prediction = service.predict_risk(&history, &today).unwrap();
    assert_eq!(prediction.athlete_id, 2);
    assert_eq!(prediction.confidence, 0.88);
    assert_eq!(prediction.status, "success");
}

#[test]
fn test_serving_reports_short_history() {
    let dir = TempDir::new().unwrap();
    let input = write_telemetry_csv(dir.path(), &[3], 30);
    let stored = load(&input);
    let today = TelemetryRecord {
        date: stored[29].date + Duration::days(1),
        ..stored[29].clone()
    };

    let service = PredictionService::new(FeatureEngine::new(), LoadThresholdClassifier);
    let failure: ServingFailure = service.predict_risk(&stored, &today).unwrap_err();
    assert!(failure.detail.contains("Insufficient history"));
}

#[test]
fn test_invalid_telemetry_values_fail_the_run() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nan.csv");
    let mut content =
        String::from("athlete_id,date,daily_load,resting_hr,hrv,sleep_quality,past_injury,days_since_injury\n");
    let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    for i in 0..30 {
        let hrv = if i == 12 { "NaN".to_string() } else { "65.0".to_string() };
        content.push_str(&format!(
            "5,{},300.0,54.0,{},0.7,0,999\n",
            start + Duration::days(i),
            hrv
        ));
    }
    fs::write(&path, content).unwrap();

    let telemetry = load(&path);
    let err = LabelPipeline::from_config(&AppConfig::default())
        .unwrap()
        .run(&telemetry)
        .unwrap_err();
    assert!(err.to_string().contains("Invalid hrv"));
}

#[test]
fn test_serving_rejects_negative_load() {
    let dir = TempDir::new().unwrap();
    let input = write_telemetry_csv(dir.path(), &[3], 60);
    let stored = load(&input);
    let today = TelemetryRecord {
        date: stored[59].date + Duration::days(1),
        daily_load: -5.0,
        ..stored[59].clone()
    };

    let service = PredictionService::new(FeatureEngine::new(), LoadThresholdClassifier);
    let failure = service.predict_risk(&stored, &today).unwrap_err();
    assert!(failure.detail.contains("Invalid daily_load"));
}

#[test]
fn test_missing_columns_are_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("partial.csv");
    fs::write(&path, "athlete_id,date,daily_load\n1,2024-01-01,300\n").unwrap();

    let err = ImportManager::new().import_file(&path).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("hrv"));
    assert!(message.contains("sleep_quality"));
}
