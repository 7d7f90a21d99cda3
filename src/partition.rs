//! Temporal train/test partitioning
//!
//! Each athlete's records are split on their own timeline: the earliest
//! `floor(train_fraction * n)` days train, the rest test. Nothing is shuffled
//! and no athlete's records are interleaved with another's.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::error::PartitionError;
use crate::models::{AthleteDay, AthleteId};

/// Partitioning configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    /// Share of each athlete's days assigned to the train slice
    pub train_fraction: f64,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        PartitionConfig {
            train_fraction: 0.8,
        }
    }
}

/// Train and test slices, each ordered by athlete id then date
#[derive(Debug, Clone, PartialEq)]
pub struct Partition<T> {
    pub train: Vec<T>,
    pub test: Vec<T>,
    pub athletes: Vec<AthleteSplit>,
}

/// Where one athlete's timeline was cut
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AthleteSplit {
    pub athlete_id: AthleteId,
    pub train_len: usize,
    pub test_len: usize,
    pub train_end: Option<NaiveDate>,
    pub test_start: Option<NaiveDate>,
}

/// Split every athlete's records by time
pub fn partition<T>(records: &[T], train_fraction: f64) -> Result<Partition<T>, PartitionError>
where
    T: AthleteDay + Clone,
{
    if !(0.0..=1.0).contains(&train_fraction) {
        return Err(PartitionError::InvalidFraction(train_fraction));
    }

    let mut grouped: BTreeMap<AthleteId, Vec<&T>> = BTreeMap::new();
    for record in records {
        grouped.entry(record.athlete_id()).or_default().push(record);
    }

    let mut train = Vec::new();
    let mut test = Vec::new();
    let mut athletes = Vec::with_capacity(grouped.len());

    for (athlete_id, mut series) in grouped {
        series.sort_by_key(|r| r.date());
        if let Some(pair) = series.windows(2).find(|w| w[0].date() == w[1].date()) {
            return Err(PartitionError::DuplicateRecord {
                athlete_id,
                date: pair[0].date(),
            });
        }

        let n = series.len();
        let cut = ((train_fraction * n as f64).floor() as usize).min(n);
        let (head, tail) = series.split_at(cut);

        let split = AthleteSplit {
            athlete_id,
            train_len: head.len(),
            test_len: tail.len(),
            train_end: head.last().map(|r| r.date()),
            test_start: tail.first().map(|r| r.date()),
        };
        verify_split(&split)?;

        train.extend(head.iter().map(|r| (*r).clone()));
        test.extend(tail.iter().map(|r| (*r).clone()));
        athletes.push(split);
    }

    info!(
        athletes = athletes.len(),
        train = train.len(),
        test = test.len(),
        train_fraction,
        "Temporal partition complete"
    );

    Ok(Partition {
        train,
        test,
        athletes,
    })
}

fn verify_split(split: &AthleteSplit) -> Result<(), PartitionError> {
    match (split.train_end, split.test_start) {
        (Some(train_end), Some(test_start)) if train_end > test_start => {
            Err(PartitionError::TemporalLeak {
                athlete_id: split.athlete_id,
                train_end,
                test_start,
            })
        }
        _ => Ok(()),
    }
}
