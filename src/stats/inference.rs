//! Two-sample inference: Welch's t-test, Student-t confidence interval for
//! the difference in means, and Cohen's d.
//!
//! Every function here is pure. Degenerate inputs resolve to fixed policy
//! values rather than errors:
//! - both variances zero: standard error 0, no degrees of freedom, and a
//!   zero-width interval at `delta`;
//! - zero pooled variance: effect size exactly 0.0.

#![allow(missing_docs)]

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};

use super::descriptive::{Descriptive, describe};
use crate::core::errors::{AbError, Result};

/// Smallest group size with a defined sample variance.
pub const MIN_SAMPLE_SIZE: usize = 2;

/// Two-sided confidence level used by [`compute_statistics`].
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// True only when both groups have at least `min_size` observations.
#[must_use]
pub const fn meets_minimum_sample_size(n_a: usize, n_b: usize, min_size: usize) -> bool {
    n_a >= min_size && n_b >= min_size
}

/// Welch's t-test components for `B - A`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WelchTest {
    pub delta: f64,
    pub standard_error: f64,
    /// Welch–Satterthwaite degrees of freedom; `None` when both variances
    /// are zero.
    pub degrees_of_freedom: Option<f64>,
}

/// Welch's unequal-variance test on two described groups.
#[must_use]
pub fn welch_test(a: &Descriptive, b: &Descriptive) -> WelchTest {
    let delta = b.mean - a.mean;
    let n_a = a.count as f64;
    let n_b = b.count as f64;
    let term_a = a.variance / n_a;
    let term_b = b.variance / n_b;
    let standard_error = (term_a + term_b).sqrt();

    if a.variance == 0.0 && b.variance == 0.0 {
        return WelchTest {
            delta,
            standard_error: 0.0,
            degrees_of_freedom: None,
        };
    }

    let denominator = a.variance.powi(2) / (n_a.powi(2) * (n_a - 1.0))
        + b.variance.powi(2) / (n_b.powi(2) * (n_b - 1.0));
    let degrees_of_freedom = (term_a + term_b).powi(2) / denominator;

    WelchTest {
        delta,
        standard_error,
        degrees_of_freedom: Some(degrees_of_freedom),
    }
}

/// Closed interval `[lower, upper]` around a difference in means.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

impl ConfidenceInterval {
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Two-sided Student-t interval for `test.delta` at `confidence_level`.
///
/// A zero standard error yields the degenerate interval `(delta, delta)`
/// without consulting the t-distribution.
pub fn confidence_interval(test: &WelchTest, confidence_level: f64) -> Result<ConfidenceInterval> {
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(AbError::InvalidArgument {
            name: "confidence_level",
            details: format!("{confidence_level} is outside (0, 1)"),
        });
    }

    if test.standard_error == 0.0 {
        return Ok(ConfidenceInterval {
            lower: test.delta,
            upper: test.delta,
        });
    }

    let Some(df) = test.degrees_of_freedom else {
        return Err(AbError::Numeric {
            context: "confidence_interval",
            details: "non-zero standard error without degrees of freedom".to_string(),
        });
    };
    let dist = StudentsT::new(0.0, 1.0, df).map_err(|err| AbError::Numeric {
        context: "students_t",
        details: format!("degrees of freedom {df}: {err}"),
    })?;

    let alpha = 1.0 - confidence_level;
    let critical = dist.inverse_cdf(1.0 - alpha / 2.0);
    let margin = critical * test.standard_error;

    Ok(ConfidenceInterval {
        lower: test.delta - margin,
        upper: test.delta + margin,
    })
}

/// Cohen's d for `B - A` using the pooled standard deviation.
///
/// Requires `a.count + b.count > 2`, which any pair passing the minimum
/// sample-size gate satisfies.
#[must_use]
pub fn effect_size(a: &Descriptive, b: &Descriptive) -> f64 {
    let n_a = a.count as f64;
    let n_b = b.count as f64;
    let pooled_variance = ((n_a - 1.0) * a.std_dev.powi(2) + (n_b - 1.0) * b.std_dev.powi(2))
        / (n_a + n_b - 2.0);

    if pooled_variance == 0.0 {
        return 0.0;
    }
    (b.mean - a.mean) / pooled_variance.sqrt()
}

/// Policy knobs for [`compute_statistics_with`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceOptions {
    pub confidence_level: f64,
    pub min_sample_size: usize,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            min_sample_size: MIN_SAMPLE_SIZE,
        }
    }
}

/// Unrounded comparison of the two variants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatisticsBundle {
    pub mean_a: f64,
    pub mean_b: f64,
    pub delta: f64,
    pub ci: ConfidenceInterval,
    pub n_a: usize,
    pub n_b: usize,
    pub effect_size: f64,
    pub standard_error: f64,
    pub degrees_of_freedom: Option<f64>,
    pub confidence_level: f64,
}

/// Result of [`compute_statistics`]. Insufficient data is a value, not an
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Statistics {
    Insufficient { n_a: usize, n_b: usize },
    Computed(StatisticsBundle),
}

impl Statistics {
    #[must_use]
    pub const fn is_insufficient(&self) -> bool {
        matches!(self, Self::Insufficient { .. })
    }

    #[must_use]
    pub const fn bundle(&self) -> Option<&StatisticsBundle> {
        match self {
            Self::Computed(bundle) => Some(bundle),
            Self::Insufficient { .. } => None,
        }
    }
}

/// Compare two outcome groups at the default 95% level with the minimum
/// sample size of two per group.
pub fn compute_statistics(outcomes_a: &[f64], outcomes_b: &[f64]) -> Result<Statistics> {
    compute_statistics_with(outcomes_a, outcomes_b, &InferenceOptions::default())
}

/// Compare two outcome groups: sample-size gate, descriptive statistics,
/// Welch test, confidence interval, effect size.
pub fn compute_statistics_with(
    outcomes_a: &[f64],
    outcomes_b: &[f64],
    options: &InferenceOptions,
) -> Result<Statistics> {
    let (n_a, n_b) = (outcomes_a.len(), outcomes_b.len());
    if !meets_minimum_sample_size(n_a, n_b, options.min_sample_size) {
        return Ok(Statistics::Insufficient { n_a, n_b });
    }
    let (Some(a), Some(b)) = (describe(outcomes_a), describe(outcomes_b)) else {
        return Ok(Statistics::Insufficient { n_a, n_b });
    };

    let welch = welch_test(&a, &b);
    let ci = confidence_interval(&welch, options.confidence_level)?;
    let effect = effect_size(&a, &b);

    Ok(Statistics::Computed(StatisticsBundle {
        mean_a: a.mean,
        mean_b: b.mean,
        delta: welch.delta,
        ci,
        n_a,
        n_b,
        effect_size: effect,
        standard_error: welch.standard_error,
        degrees_of_freedom: welch.degrees_of_freedom,
        confidence_level: options.confidence_level,
    }))
}
