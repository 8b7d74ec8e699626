//! Evidence compiler: turns a ledger snapshot into a presentation-ready
//! summary.
//!
//! All statistics come from [`crate::stats::compute_statistics_with`]; this
//! module only partitions, rounds and labels.

#![allow(missing_docs)]

use std::fmt;

use serde::Serialize;

use crate::core::errors::Result;
use crate::ledger::{Ledger, StorageBackend};
use crate::stats::{InferenceOptions, Statistics, StatisticsBundle, compute_statistics_with};

/// Human-readable message carried by [`Evidence::InsufficientData`].
pub const NOT_ENOUGH_DATA: &str = "Not enough data to compute statistics.";

/// Decimal places kept in presented figures.
pub const PRESENTATION_DECIMALS: i32 = 4;

/// Rounded comparison of the two variants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceReport {
    pub experiment_id: String,
    pub mean_a: f64,
    pub mean_b: f64,
    pub delta: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub confidence_level: f64,
    pub n_a: usize,
    pub n_b: usize,
    pub effect_size: f64,
}

impl EvidenceReport {
    fn from_bundle(experiment_id: &str, bundle: &StatisticsBundle) -> Self {
        Self {
            experiment_id: experiment_id.to_string(),
            mean_a: round_for_presentation(bundle.mean_a),
            mean_b: round_for_presentation(bundle.mean_b),
            delta: round_for_presentation(bundle.delta),
            ci_lower: round_for_presentation(bundle.ci.lower),
            ci_upper: round_for_presentation(bundle.ci.upper),
            confidence_level: bundle.confidence_level,
            n_a: bundle.n_a,
            n_b: bundle.n_b,
            effect_size: round_for_presentation(bundle.effect_size),
        }
    }

    /// Label for the interval row, e.g. `95% Confidence Interval`.
    #[must_use]
    pub fn interval_label(&self) -> String {
        format!("{}% Confidence Interval", format_percent(self.confidence_level))
    }

    /// Labelled rows in presentation order.
    #[must_use]
    pub fn labeled_fields(&self) -> Vec<(String, String)> {
        vec![
            ("Model A Mean Outcome".to_string(), self.mean_a.to_string()),
            ("Model B Mean Outcome".to_string(), self.mean_b.to_string()),
            ("Difference in Means (B - A)".to_string(), self.delta.to_string()),
            (
                self.interval_label(),
                format!("({}, {})", self.ci_lower, self.ci_upper),
            ),
            ("Number of Outcomes for Model A".to_string(), self.n_a.to_string()),
            ("Number of Outcomes for Model B".to_string(), self.n_b.to_string()),
            ("Effect Size".to_string(), self.effect_size.to_string()),
        ]
    }
}

/// Outcome of evidence compilation. Not having enough data is a regular
/// result, distinct from every error in [`crate::core::errors::AbError`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Evidence {
    InsufficientData {
        experiment_id: String,
        n_a: usize,
        n_b: usize,
        message: String,
    },
    Report(EvidenceReport),
}

impl Evidence {
    /// Present already-computed statistics.
    #[must_use]
    pub fn from_statistics(experiment_id: &str, statistics: &Statistics) -> Self {
        match statistics {
            Statistics::Insufficient { n_a, n_b } => Self::InsufficientData {
                experiment_id: experiment_id.to_string(),
                n_a: *n_a,
                n_b: *n_b,
                message: NOT_ENOUGH_DATA.to_string(),
            },
            Statistics::Computed(bundle) => {
                Self::Report(EvidenceReport::from_bundle(experiment_id, bundle))
            }
        }
    }

    #[must_use]
    pub const fn is_insufficient(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }

    #[must_use]
    pub const fn report(&self) -> Option<&EvidenceReport> {
        match self {
            Self::Report(report) => Some(report),
            Self::InsufficientData { .. } => None,
        }
    }
}

impl fmt::Display for Evidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientData {
                experiment_id,
                n_a,
                n_b,
                message,
            } => write!(f, "[{experiment_id}] {message} (A: {n_a}, B: {n_b})"),
            Self::Report(report) => {
                writeln!(f, "Experiment: {}", report.experiment_id)?;
                let fields = report.labeled_fields();
                let width = fields.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
                for (label, value) in fields {
                    writeln!(f, "  {label:<width$}  {value}")?;
                }
                Ok(())
            }
        }
    }
}

/// Snapshot the ledger's outcomes and compile evidence for them.
pub fn compile_evidence<S: StorageBackend>(
    ledger: &Ledger<S>,
    options: &InferenceOptions,
) -> Result<Evidence> {
    let outcomes = ledger.partition_outcomes_by_variant()?;
    let statistics = compute_statistics_with(&outcomes.a, &outcomes.b, options)?;
    let evidence = Evidence::from_statistics(ledger.experiment_id(), &statistics);
    tracing::info!(
        experiment = %ledger.experiment_id(),
        n_a = outcomes.a.len(),
        n_b = outcomes.b.len(),
        sufficient = !evidence.is_insufficient(),
        "compiled evidence"
    );
    Ok(evidence)
}

/// Round half away from zero to [`PRESENTATION_DECIMALS`] places.
#[must_use]
pub fn round_for_presentation(value: f64) -> f64 {
    let scale = 10_f64.powi(PRESENTATION_DECIMALS);
    (value * scale).round() / scale
}

fn format_percent(level: f64) -> String {
    let text = format!("{:.2}", level * 100.0);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}
