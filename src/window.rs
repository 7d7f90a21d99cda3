//! Causal rolling-window primitives and normalization scopes
//!
//! Every function here operates on one athlete's date-ordered series. A value
//! at index `i` only ever reads indices `<= i`, except where a
//! [`ScopeProvider`] explicitly widens the scope to the whole series.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::ops::Range;

/// Trailing window specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    /// Number of trailing observations, including the current one
    pub window: usize,
    /// Minimum non-missing observations required to produce a value
    pub min_periods: usize,
}

impl WindowSpec {
    pub const fn new(window: usize, min_periods: usize) -> Self {
        Self {
            window,
            min_periods,
        }
    }

    fn bounds(&self, index: usize) -> Range<usize> {
        (index + 1).saturating_sub(self.window)..index + 1
    }

    fn present(&self, values: &[Option<f64>], index: usize) -> Vec<f64> {
        values[self.bounds(index)].iter().flatten().copied().collect()
    }
}

/// Trailing mean. Missing inputs are skipped; too few observations yield `None`.
pub fn rolling_mean(values: &[Option<f64>], spec: WindowSpec) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            let window = spec.present(values, i);
            if window.is_empty() || window.len() < spec.min_periods {
                None
            } else {
                Some(window.iter().sum::<f64>() / window.len() as f64)
            }
        })
        .collect()
}

/// Trailing sample standard deviation (n - 1 denominator).
///
/// A window needs at least two observations as well as `min_periods`.
pub fn rolling_std(values: &[Option<f64>], spec: WindowSpec) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            let window = spec.present(values, i);
            if window.len() < spec.min_periods.max(2) {
                None
            } else {
                Some(window.iter().std_dev())
            }
        })
        .collect()
}

/// Forward-fill then backward-fill a single column in place
pub fn fill_gaps(values: &mut [Option<f64>]) {
    let mut last = None;
    for value in values.iter_mut() {
        match value {
            Some(v) => last = Some(*v),
            None => *value = last,
        }
    }

    let mut next = None;
    for value in values.iter_mut().rev() {
        match value {
            Some(v) => next = Some(*v),
            None => *value = next,
        }
    }
}

/// Chooses which part of an athlete's series normalizes the value at `index`.
///
/// This is the seam that decides whether expanding statistics may look ahead.
pub trait ScopeProvider: Send + Sync {
    /// Index range forming the scope for the value at `index` in a series of `len`
    fn scope(&self, len: usize, index: usize) -> Range<usize>;

    /// Whether the scope never reaches past `index`
    fn is_causal(&self) -> bool;

    fn name(&self) -> &'static str;
}

/// Built-in normalization scopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    /// Every record currently available for the athlete. In batch mode a day
    /// is normalized with statistics that include later days.
    WholeSeries,
    /// Records up to and including the current day
    CausalExpanding,
    /// The last `window` records up to and including the current day
    Trailing { window: usize },
}

impl Default for ScopeKind {
    fn default() -> Self {
        ScopeKind::WholeSeries
    }
}

impl ScopeProvider for ScopeKind {
    fn scope(&self, len: usize, index: usize) -> Range<usize> {
        match self {
            ScopeKind::WholeSeries => 0..len,
            ScopeKind::CausalExpanding => 0..index + 1,
            ScopeKind::Trailing { window } => (index + 1).saturating_sub(*window)..index + 1,
        }
    }

    fn is_causal(&self) -> bool {
        !matches!(self, ScopeKind::WholeSeries)
    }

    fn name(&self) -> &'static str {
        match self {
            ScopeKind::WholeSeries => "whole_series",
            ScopeKind::CausalExpanding => "causal_expanding",
            ScopeKind::Trailing { .. } => "trailing",
        }
    }
}

/// Epsilon-guarded z-score of every value against its own scope
pub fn scoped_z_scores(values: &[f64], scope: &dyn ScopeProvider, epsilon: f64) -> Vec<f64> {
    let len = values.len();
    let mut cache: Option<(Range<usize>, f64, f64)> = None;

    (0..len)
        .map(|i| {
            let range = scope.scope(len, i);
            let (mean, std) = match &cache {
                Some((cached, mean, std)) if *cached == range => (*mean, *std),
                _ => {
                    let (mean, std) = mean_and_std(&values[range.clone()]);
                    cache = Some((range, mean, std));
                    (mean, std)
                }
            };
            (values[i] - mean) / (std + epsilon)
        })
        .collect()
}

/// Epsilon-guarded ratio of every value to the maximum of `reference` over its scope.
///
/// `abs` compares magnitudes instead of signed values.
pub fn scoped_max_ratio(
    values: &[f64],
    reference: &[f64],
    scope: &dyn ScopeProvider,
    abs: bool,
    epsilon: f64,
) -> Vec<f64> {
    let len = values.len();
    let mut cache: Option<(Range<usize>, f64)> = None;

    (0..len)
        .map(|i| {
            let range = scope.scope(len, i);
            let max = match cache.clone() {
                Some((cached, max)) if cached == range => max,
                // Expanding scopes grow by one day at a time.
                Some((cached, max)) if cached.start == range.start && cached.end + 1 == range.end => {
                    let next = max.max(magnitude(reference[range.end - 1], abs));
                    cache = Some((range, next));
                    next
                }
                _ => {
                    let max = reference[range.clone()]
                        .iter()
                        .map(|v| magnitude(*v, abs))
                        .fold(f64::NEG_INFINITY, f64::max);
                    cache = Some((range, max));
                    max
                }
            };
            values[i] / (max + epsilon)
        })
        .collect()
}

fn magnitude(value: f64, abs: bool) -> f64 {
    if abs {
        value.abs()
    } else {
        value
    }
}

// Fewer than two values give a zero deviation so the epsilon guard applies.
fn mean_and_std(values: &[f64]) -> (f64, f64) {
    match values.len() {
        0 => (0.0, 0.0),
        1 => (values[0], 0.0),
        _ => (values.iter().mean(), values.iter().std_dev()),
    }
}
