//! Synthetic experiment driver.
//!
//! Registers two toy adapters (`x + 1` for A, `x * 2` for B), routes a batch
//! of requests, then feeds back Normal-noise outcomes around a per-variant
//! mean for a fraction of them. The seed fixes outcome noise and which
//! requests resolve; variant assignment always uses the ledger's own draw.

#![allow(missing_docs)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::Serialize;
use serde_json::{Value, json};

use crate::core::errors::{AbError, Result};
use crate::evidence::{Evidence, compile_evidence};
use crate::ledger::{AdapterError, Ledger, StorageBackend, Variant};
use crate::stats::InferenceOptions;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub requests: usize,
    /// Probability of routing to A.
    pub split: f64,
    pub mean_a: f64,
    pub mean_b: f64,
    /// Standard deviation of the outcome noise for both variants.
    pub noise: f64,
    /// Fraction of routed requests whose outcome ever arrives.
    pub outcome_rate: f64,
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            requests: 100,
            split: 0.5,
            mean_a: 0.5,
            mean_b: 0.7,
            noise: 0.01,
            outcome_rate: 1.0,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationSummary {
    pub routed: usize,
    pub resolved: usize,
    pub evidence: Evidence,
}

fn numeric_input(x: &Value) -> std::result::Result<f64, AdapterError> {
    x.as_f64()
        .ok_or_else(|| AdapterError::new(format!("expected a numeric input, got {x}")))
}

/// Variant A toy model.
pub fn increment_model(x: &Value) -> std::result::Result<Value, AdapterError> {
    numeric_input(x).map(|v| json!(v + 1.0))
}

/// Variant B toy model.
pub fn double_model(x: &Value) -> std::result::Result<Value, AdapterError> {
    numeric_input(x).map(|v| json!(v * 2.0))
}

/// Run one simulated experiment against `ledger` and compile its evidence.
pub fn run_simulation<S: StorageBackend>(
    ledger: &Ledger<S>,
    sim: &SimulationConfig,
    options: &InferenceOptions,
) -> Result<SimulationSummary> {
    if !(0.0..=1.0).contains(&sim.outcome_rate) {
        return Err(AbError::InvalidArgument {
            name: "outcome_rate",
            details: format!("{} is outside [0, 1]", sim.outcome_rate),
        });
    }
    let noise_a = normal(sim.mean_a, sim.noise)?;
    let noise_b = normal(sim.mean_b, sim.noise)?;
    let mut rng = sim
        .seed
        .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);

    ledger.register(increment_model, double_model);

    let mut routed = Vec::with_capacity(sim.requests);
    for _ in 0..sim.requests {
        routed.push(ledger.route(json!(1), sim.split)?);
    }

    let mut resolved = 0;
    for request in &routed {
        if !rng.random_bool(sim.outcome_rate) {
            continue;
        }
        let value = match request.variant {
            Variant::A => noise_a.sample(&mut rng),
            Variant::B => noise_b.sample(&mut rng),
        };
        ledger.record_outcome(request.request_id, value)?;
        resolved += 1;
    }
    tracing::info!(routed = routed.len(), resolved, "simulation fed outcomes");

    Ok(SimulationSummary {
        routed: routed.len(),
        resolved,
        evidence: compile_evidence(ledger, options)?,
    })
}

fn normal(mean: f64, std_dev: f64) -> Result<Normal<f64>> {
    Normal::new(mean, std_dev).map_err(|err| AbError::InvalidArgument {
        name: "noise",
        details: format!("normal({mean}, {std_dev}): {err}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toy_models_match_their_definitions() {
        assert_eq!(increment_model(&json!(1)).expect("a"), json!(2.0));
        assert_eq!(double_model(&json!(1)).expect("b"), json!(2.0));
        assert!(double_model(&json!("one")).is_err());
    }

    #[test]
    fn default_simulation_detects_the_planted_lift() {
        let ledger = Ledger::in_memory("sim");
        let sim = SimulationConfig {
            seed: Some(7),
            ..SimulationConfig::default()
        };
        let summary =
            run_simulation(&ledger, &sim, &InferenceOptions::default()).expect("simulate");
        assert_eq!(summary.routed, 100);
        assert_eq!(summary.resolved, 100);
        let report = summary.evidence.report().expect("enough data");
        assert_eq!(report.n_a + report.n_b, 100);
        assert!((report.delta - 0.2).abs() < 0.02, "delta {}", report.delta);
        assert!(report.ci_lower > 0.0);
    }

    #[test]
    fn unresolved_requests_are_excluded() {
        let ledger = Ledger::in_memory("sim");
        let sim = SimulationConfig {
            requests: 200,
            outcome_rate: 0.5,
            seed: Some(11),
            ..SimulationConfig::default()
        };
        let summary =
            run_simulation(&ledger, &sim, &InferenceOptions::default()).expect("simulate");
        assert_eq!(ledger.request_count().expect("count"), 200);
        assert!(summary.resolved < 200);
        let report = summary.evidence.report().expect("enough data");
        assert_eq!(report.n_a + report.n_b, summary.resolved);
    }

    #[test]
    fn negative_noise_is_rejected() {
        let ledger = Ledger::in_memory("sim");
        let sim = SimulationConfig {
            noise: -1.0,
            ..SimulationConfig::default()
        };
        let err = run_simulation(&ledger, &sim, &InferenceOptions::default()).expect_err("noise");
        assert_eq!(err.code(), "ABE-1101");
        assert_eq!(ledger.request_count().expect("count"), 0);
    }
}
