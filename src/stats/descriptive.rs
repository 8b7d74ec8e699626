//! Descriptive statistics for one group of outcomes.

#![allow(missing_docs)]

use serde::Serialize;

/// Mean, Bessel-corrected variance and standard deviation, and count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Descriptive {
    pub mean: f64,
    /// Sample variance (divides by `count - 1`).
    pub variance: f64,
    pub std_dev: f64,
    pub count: usize,
}

/// Describe a group of outcome values.
///
/// Returns `None` for fewer than two values: the sample variance divides by
/// `count - 1`. Callers gate on sample size first (see
/// [`super::inference::meets_minimum_sample_size`]).
#[must_use]
pub fn describe(values: &[f64]) -> Option<Descriptive> {
    let count = values.len();
    if count < 2 {
        return None;
    }
    let n = count as f64;
    // Shifted by the first value: a constant group yields exactly its value
    // as mean and exactly zero variance.
    let shift = values[0];
    let mean = shift + values.iter().map(|v| v - shift).sum::<f64>() / n;
    let sum_sq = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
    let variance = sum_sq / (n - 1.0);
    Some(Descriptive {
        mean,
        variance,
        std_dev: variance.sqrt(),
        count,
    })
}
