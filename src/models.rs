use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Stable athlete key
pub type AthleteId = u32;

/// `days_since_injury` value meaning "no recorded injury"
pub const NO_INJURY_SENTINEL_DAYS: u32 = 999;

/// Names of the five features consumed by the external classifier, in order
pub const MODEL_FEATURES: [&str; 5] = [
    "load_7d",
    "hrv_drop",
    "training_monotony_log",
    "recovery_score",
    "history_risk",
];

/// One athlete-day of raw telemetry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub athlete_id: AthleteId,

    /// Calendar day; unique per athlete
    pub date: NaiveDate,

    /// Daily training load (non-negative, arbitrary units)
    pub daily_load: f64,

    /// Resting heart rate in bpm
    pub resting_hr: f64,

    /// Heart-rate variability
    pub hrv: f64,

    /// Sleep quality, nominally 0-1
    pub sleep_quality: f64,

    /// Whether the athlete has a past injury on record
    #[serde(deserialize_with = "deserialize_flag", serialize_with = "serialize_flag")]
    pub past_injury: bool,

    /// Days since the last injury, `NO_INJURY_SENTINEL_DAYS` when none
    pub days_since_injury: u32,
}

impl TelemetryRecord {
    /// Key identifying this record within a dataset
    pub fn key(&self) -> (AthleteId, NaiveDate) {
        (self.athlete_id, self.date)
    }
}

/// Derived features for a single athlete-day.
///
/// Windowed fields are `None` when the trailing window held fewer than
/// `min_periods` observations and no fill could close the gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FeatureVector {
    pub load_log: f64,
    pub load_7d: Option<f64>,
    pub load_14d: Option<f64>,
    pub hrv_z: f64,
    pub hrv_7d_mean: Option<f64>,
    pub hrv_drop: Option<f64>,
    pub training_monotony: Option<f64>,
    pub training_strain: Option<f64>,
    pub training_monotony_log: Option<f64>,
    pub training_strain_log: Option<f64>,
    pub recovery_score: f64,
    pub history_risk: f64,
}

impl FeatureVector {
    /// Project onto the classifier contract, if every contract field is defined
    pub fn model_features(&self) -> Option<ModelFeatures> {
        Some(ModelFeatures {
            load_7d: self.load_7d?,
            hrv_drop: self.hrv_drop?,
            training_monotony_log: self.training_monotony_log?,
            recovery_score: self.recovery_score,
            history_risk: self.history_risk,
        })
    }

    /// Name of the first field that is undefined or not finite, if any
    pub fn first_missing(&self) -> Option<&'static str> {
        [
            ("load_log", Some(self.load_log)),
            ("load_7d", self.load_7d),
            ("load_14d", self.load_14d),
            ("hrv_7d_mean", self.hrv_7d_mean),
            ("hrv_drop", self.hrv_drop),
            ("training_monotony", self.training_monotony),
            ("training_strain", self.training_strain),
            ("training_monotony_log", self.training_monotony_log),
            ("training_strain_log", self.training_strain_log),
            ("hrv_z", Some(self.hrv_z)),
            ("recovery_score", Some(self.recovery_score)),
            ("history_risk", Some(self.history_risk)),
        ]
        .into_iter()
        .find(|(_, value)| !value.is_some_and(f64::is_finite))
        .map(|(name, _)| name)
    }
}

/// The five-field feature contract passed to the external classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelFeatures {
    pub load_7d: f64,
    pub hrv_drop: f64,
    pub training_monotony_log: f64,
    pub recovery_score: f64,
    pub history_risk: f64,
}

impl ModelFeatures {
    /// Values in `MODEL_FEATURES` order
    pub fn to_array(&self) -> [f64; 5] {
        [
            self.load_7d,
            self.hrv_drop,
            self.training_monotony_log,
            self.recovery_score,
            self.history_risk,
        ]
    }
}

/// A telemetry record with its feature vector attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub record: TelemetryRecord,
    pub features: FeatureVector,
}

/// Discrete risk bucket derived from the continuous score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskZone {
    Safe,
    Moderate,
    High,
    Unknown,
}

impl RiskZone {
    /// Upper bound (exclusive) of the Safe zone
    pub const SAFE_UPPER: f64 = 0.4;
    /// Upper bound (exclusive) of the Moderate zone
    pub const MODERATE_UPPER: f64 = 0.9;

    /// Classify a risk score. Undefined, non-finite and negative scores are Unknown.
    pub fn from_score(score: Option<f64>) -> Self {
        match score {
            Some(s) if s.is_finite() && s >= 0.0 => {
                if s < Self::SAFE_UPPER {
                    RiskZone::Safe
                } else if s < Self::MODERATE_UPPER {
                    RiskZone::Moderate
                } else {
                    RiskZone::High
                }
            }
            _ => RiskZone::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskZone::Safe => "Safe",
            RiskZone::Moderate => "Moderate",
            RiskZone::High => "High",
            RiskZone::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for RiskZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RiskZone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "safe" => Ok(RiskZone::Safe),
            "moderate" => Ok(RiskZone::Moderate),
            "high" => Ok(RiskZone::High),
            "unknown" => Ok(RiskZone::Unknown),
            _ => Err(format!("Invalid risk zone: {}", s)),
        }
    }
}

/// Rule-based risk score and its zone
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_score: Option<f64>,
    pub risk_zone: RiskZone,
}

/// Enriched record carrying its rule-derived label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledRecord {
    pub record: TelemetryRecord,
    pub features: FeatureVector,
    pub assessment: RiskAssessment,
}

/// Anything that can be placed on a per-athlete timeline
pub trait AthleteDay {
    fn athlete_id(&self) -> AthleteId;
    fn date(&self) -> NaiveDate;
}

impl AthleteDay for TelemetryRecord {
    fn athlete_id(&self) -> AthleteId {
        self.athlete_id
    }
    fn date(&self) -> NaiveDate {
        self.date
    }
}

impl AthleteDay for EnrichedRecord {
    fn athlete_id(&self) -> AthleteId {
        self.record.athlete_id
    }
    fn date(&self) -> NaiveDate {
        self.record.date
    }
}

impl AthleteDay for LabeledRecord {
    fn athlete_id(&self) -> AthleteId {
        self.record.athlete_id
    }
    fn date(&self) -> NaiveDate {
        self.record.date
    }
}

// The injury flag arrives as 0/1 from CSV and JSON sources, or as a bool.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    struct FlagVisitor;

    impl<'de> serde::de::Visitor<'de> for FlagVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a boolean or 0/1 flag")
        }

        fn visit_bool<E: serde::de::Error>(self, v: bool) -> Result<bool, E> {
            Ok(v)
        }

        fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<bool, E> {
            match v {
                0 => Ok(false),
                1 => Ok(true),
                _ => Err(E::custom(format!("invalid injury flag: {}", v))),
            }
        }

        fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<bool, E> {
            match v {
                0 => Ok(false),
                1 => Ok(true),
                _ => Err(E::custom(format!("invalid injury flag: {}", v))),
            }
        }

        fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<bool, E> {
            if v == 0.0 {
                Ok(false)
            } else if v == 1.0 {
                Ok(true)
            } else {
                Err(E::custom(format!("invalid injury flag: {}", v)))
            }
        }

        fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<bool, E> {
            match v.trim().to_lowercase().as_str() {
                "0" | "false" => Ok(false),
                "1" | "true" => Ok(true),
                other => Err(E::custom(format!("invalid injury flag: {}", other))),
            }
        }
    }

    deserializer.deserialize_any(FlagVisitor)
}

fn serialize_flag<S>(flag: &bool, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u8(u8::from(*flag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_thresholds() {
        assert_eq!(RiskZone::from_score(Some(-0.1)), RiskZone::Unknown);
        assert_eq!(RiskZone::from_score(None), RiskZone::Unknown);
        assert_eq!(RiskZone::from_score(Some(f64::NAN)), RiskZone::Unknown);
        assert_eq!(RiskZone::from_score(Some(0.0)), RiskZone::Safe);
        assert_eq!(RiskZone::from_score(Some(0.39999)), RiskZone::Safe);
        assert_eq!(RiskZone::from_score(Some(0.4)), RiskZone::Moderate);
        assert_eq!(RiskZone::from_score(Some(0.89999)), RiskZone::Moderate);
        assert_eq!(RiskZone::from_score(Some(0.9)), RiskZone::High);
        assert_eq!(RiskZone::from_score(Some(1.2)), RiskZone::High);
    }

    #[test]
    fn test_zone_parsing() {
        assert_eq!("moderate".parse::<RiskZone>().unwrap(), RiskZone::Moderate);
        assert_eq!(RiskZone::High.to_string(), "High");
        assert!("critical".parse::<RiskZone>().is_err());
    }

    #[test]
    fn test_flag_from_json_int() {
        let json = r#"{
            "athlete_id": 1, "date": "2024-03-01", "daily_load": 300.0,
            "resting_hr": 55.0, "hrv": 70.0, "sleep_quality": 0.7,
            "past_injury": 1, "days_since_injury": 40
        }"#;
        let record: TelemetryRecord = serde_json::from_str(json).unwrap();
        assert!(record.past_injury);
        assert_eq!(record.days_since_injury, 40);
    }

    #[test]
    fn test_model_features_require_windowed_fields() {
        let mut vector = FeatureVector {
            load_7d: Some(5.0),
            hrv_drop: Some(-0.2),
            training_monotony_log: None,
            recovery_score: 0.3,
            history_risk: 0.0,
            ..FeatureVector::default()
        };
        assert!(vector.model_features().is_none());
        assert_eq!(vector.first_missing(), Some("load_14d"));

        vector.training_monotony_log = Some(1.5);
        let features = vector.model_features().unwrap();
        assert_eq!(features.to_array(), [5.0, -0.2, 1.5, 0.3, 0.0]);
    }

    #[test]
    fn test_non_finite_fields_count_as_missing() {
        let complete = FeatureVector {
            load_7d: Some(5.0),
            load_14d: Some(5.1),
            hrv_7d_mean: Some(0.1),
            hrv_drop: Some(-0.2),
            training_monotony: Some(3.0),
            training_strain: Some(15.0),
            training_monotony_log: Some(1.4),
            training_strain_log: Some(2.8),
            ..FeatureVector::default()
        };
        assert_eq!(complete.first_missing(), None);

        let nan_window = FeatureVector {
            load_7d: Some(f64::NAN),
            ..complete.clone()
        };
        assert_eq!(nan_window.first_missing(), Some("load_7d"));

        let infinite_recovery = FeatureVector {
            recovery_score: f64::INFINITY,
            ..complete
        };
        assert_eq!(infinite_recovery.first_missing(), Some("recovery_score"));
    }
}
