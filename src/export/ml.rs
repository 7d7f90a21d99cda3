//! Training-set export
//!
//! Writes the five-field model feature contract together with the
//! rule-derived label, one row per athlete-day, tagged with its temporal
//! split. This is the hand-off to the external classifier trainer.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::models::{LabeledRecord, MODEL_FEATURES};
use crate::partition::Partition;

/// Data split type for classifier training
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitType {
    Train,
    Test,
}

impl SplitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitType::Train => "train",
            SplitType::Test => "test",
        }
    }
}

/// Writes classifier-ready CSVs
#[derive(Debug, Default)]
pub struct TrainingSetExporter {
    /// Drop rows whose label is Unknown or whose features are incomplete
    pub skip_undefined: bool,
}

impl TrainingSetExporter {
    pub fn new() -> Self {
        Self {
            skip_undefined: true,
        }
    }

    /// Write train and test slices to separate files
    pub fn export_partition<P: AsRef<Path>>(
        &self,
        partition: &Partition<LabeledRecord>,
        train_path: P,
        test_path: P,
    ) -> Result<(usize, usize)> {
        let train = self.write_rows(
            partition.train.iter().map(|r| (r, SplitType::Train)),
            File::create(train_path.as_ref())?,
        )?;
        let test = self.write_rows(
            partition.test.iter().map(|r| (r, SplitType::Test)),
            File::create(test_path.as_ref())?,
        )?;

        tracing::info!(
            train_rows = train,
            test_rows = test,
            train_path = %train_path.as_ref().display(),
            test_path = %test_path.as_ref().display(),
            "Training set exported"
        );
        Ok((train, test))
    }

    /// Write both slices to one writer with a `split` column
    pub fn write_combined<W: Write>(
        &self,
        partition: &Partition<LabeledRecord>,
        writer: W,
    ) -> Result<usize> {
        let rows = partition
            .train
            .iter()
            .map(|r| (r, SplitType::Train))
            .chain(partition.test.iter().map(|r| (r, SplitType::Test)));
        self.write_rows(rows, writer)
    }

    fn write_rows<'a, I, W>(&self, rows: I, writer: W) -> Result<usize>
    where
        I: Iterator<Item = (&'a LabeledRecord, SplitType)>,
        W: Write,
    {
        let mut writer = csv::Writer::from_writer(writer);

        let mut header = vec!["athlete_id", "date"];
        header.extend(MODEL_FEATURES);
        header.extend(["risk_zone", "split"]);
        writer.write_record(&header)?;

        let mut written = 0;
        for (record, split) in rows {
            let features = record.features.model_features();
            let zone = record.assessment.risk_zone;
            if self.skip_undefined && (features.is_none() || zone == crate::models::RiskZone::Unknown) {
                continue;
            }

            let mut row = vec![record.record.athlete_id.to_string(), record.record.date.to_string()];
            match features {
                Some(f) => row.extend(f.to_array().iter().map(|v| v.to_string())),
                None => row.extend(std::iter::repeat(String::new()).take(MODEL_FEATURES.len())),
            }
            row.push(zone.to_string());
            row.push(split.as_str().to_string());
            writer.write_record(&row)?;
            written += 1;
        }

        writer.flush()?;
        Ok(written)
    }
}
