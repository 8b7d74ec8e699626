//! Online A/B testing evidence engine.
//!
//! A [`ledger::Ledger`] routes each request to variant A or B by a weighted
//! draw, stores it, and later attaches the delayed outcome. The
//! [`evidence`] compiler partitions recorded outcomes by variant and runs
//! them through [`stats`]: descriptive statistics, Welch's t-test, a Student-t
//! confidence interval for `mean(B) - mean(A)` and Cohen's d.

pub mod core;
pub mod evidence;
pub mod ledger;
pub mod simulate;
pub mod stats;

#[cfg(feature = "cli")]
pub mod cli_app;

pub use crate::core::config::Config;
pub use crate::core::errors::{AbError, Result};
pub use crate::evidence::{Evidence, EvidenceReport, compile_evidence};
pub use crate::ledger::{Ledger, RequestId, Routed, Variant};
pub use crate::stats::{Statistics, compute_statistics};
