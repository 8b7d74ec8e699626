//! Top-level CLI definition and dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;

use crate::core::config::{CONFIG_ENV, Config};
use crate::core::errors::{AbError, Result};
use crate::evidence::{Evidence, compile_evidence};
use crate::ledger::{
    IdentityAdapter, Ledger, MemoryStorage, OutcomeWrite, RequestId, StorageBackend, open_storage,
};
use crate::simulate::{SimulationConfig, run_simulation};

/// A/B evidence engine: route traffic between two variants and report
/// Welch-test evidence.
#[derive(Parser)]
#[command(name = "abe", version, about)]
pub struct Cli {
    /// Configuration file (falls back to $ABE_CONFIG, then built-in defaults).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Emit JSON instead of labelled text.
    #[arg(long, global = true)]
    pub json: bool,
    /// Debug-level logging on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Run a synthetic experiment with toy models and print its evidence.
    ///
    /// Always runs on a throwaway in-memory ledger; the configured storage is
    /// never touched.
    Simulate(SimulateArgs),
    /// Route one input through identity adapters and print the request id.
    Route {
        /// JSON input payload.
        #[arg(long, default_value = "null")]
        input: String,
        /// Probability of variant A (defaults to experiment.traffic_split).
        #[arg(long)]
        split: Option<f64>,
    },
    /// Record the delayed outcome of a routed request.
    Record {
        /// Request id printed by `route`.
        request_id: String,
        /// Observed outcome value.
        #[arg(allow_negative_numbers = true)]
        value: f64,
    },
    /// Compile evidence from the configured ledger.
    Report,
}

/// Options for `abe simulate`.
#[derive(Args)]
pub struct SimulateArgs {
    /// Number of requests to route.
    #[arg(long, default_value_t = 100)]
    pub requests: usize,
    /// Probability of variant A (defaults to experiment.traffic_split).
    #[arg(long)]
    pub split: Option<f64>,
    /// True mean outcome of variant A.
    #[arg(long, default_value_t = 0.5, allow_negative_numbers = true)]
    pub mean_a: f64,
    /// True mean outcome of variant B.
    #[arg(long, default_value_t = 0.7, allow_negative_numbers = true)]
    pub mean_b: f64,
    /// Standard deviation of outcome noise.
    #[arg(long, default_value_t = 0.01)]
    pub noise: f64,
    /// Fraction of requests whose outcome arrives.
    #[arg(long, default_value_t = 1.0)]
    pub outcome_rate: f64,
    /// Seed for outcome noise.
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Serialize)]
struct RoutePayload<'a> {
    request_id: String,
    variant: &'a str,
    prediction: &'a Value,
}

#[derive(Serialize)]
struct RecordPayload {
    request_id: String,
    value: f64,
    overwrote: Option<f64>,
}

/// Experiment id used for simulated runs of `experiment`.
#[must_use]
pub fn simulation_experiment_id(experiment: &str) -> String {
    format!("{experiment}-simulation")
}

/// Resolve `--config`, then `$ABE_CONFIG`, then defaults.
pub fn load_config(explicit: Option<&PathBuf>) -> Result<Config> {
    let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    match explicit.cloned().or(from_env) {
        Some(path) => Config::load(&path),
        None => Ok(Config::default()),
    }
}

/// Dispatch CLI commands.
///
/// `route`, `record` and `report` work on the configured storage. `simulate`
/// runs on its own in-memory ledger so synthetic outcomes never reach a real
/// experiment's evidence.
pub fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli.config.as_ref())?;
    let options = config.experiment.inference_options();

    match &cli.command {
        Command::Simulate(args) => {
            let ledger = Ledger::new(
                MemoryStorage::new(),
                simulation_experiment_id(&config.experiment.id),
                config.experiment.duplicate_outcomes,
            );
            let sim = SimulationConfig {
                requests: args.requests,
                split: args.split.unwrap_or(config.experiment.traffic_split),
                mean_a: args.mean_a,
                mean_b: args.mean_b,
                noise: args.noise,
                outcome_rate: args.outcome_rate,
                seed: args.seed,
            };
            let summary = run_simulation(&ledger, &sim, &options)?;
            if cli.json {
                println!("{}", serde_json::to_string(&summary)?);
            } else {
                println!(
                    "routed {} requests, {} outcomes recorded",
                    summary.routed, summary.resolved
                );
                print_evidence(&summary.evidence);
            }
        }
        Command::Route { input, split } => {
            let input: Value = serde_json::from_str(input)?;
            let ledger = open_ledger(&config)?;
            ledger.register(IdentityAdapter, IdentityAdapter);
            let routed = ledger.route(input, split.unwrap_or(config.experiment.traffic_split))?;
            if cli.json {
                let payload = RoutePayload {
                    request_id: routed.request_id.to_string(),
                    variant: routed.variant.as_str(),
                    prediction: &routed.prediction,
                };
                println!("{}", serde_json::to_string(&payload)?);
            } else {
                println!("{} {}", routed.request_id, routed.variant);
            }
        }
        Command::Record { request_id, value } => {
            let id: RequestId = request_id.parse()?;
            let write = open_ledger(&config)?.record_outcome(id, *value)?;
            let overwrote = match write {
                OutcomeWrite::Inserted => None,
                OutcomeWrite::Overwrote { previous } => Some(previous),
            };
            if cli.json {
                let payload = RecordPayload {
                    request_id: id.to_string(),
                    value: *value,
                    overwrote,
                };
                println!("{}", serde_json::to_string(&payload)?);
            } else if let Some(previous) = overwrote {
                println!("recorded {value} for {id} (replaced {previous})");
            } else {
                println!("recorded {value} for {id}");
            }
        }
        Command::Report => {
            let evidence = compile_evidence(&open_ledger(&config)?, &options)?;
            if cli.json {
                println!("{}", serde_json::to_string(&evidence)?);
            } else {
                print_evidence(&evidence);
            }
        }
    }
    Ok(())
}

fn open_ledger(config: &Config) -> Result<Ledger<Box<dyn StorageBackend>>> {
    Ok(Ledger::from_config(open_storage(config)?, &config.experiment))
}

fn print_evidence(evidence: &Evidence) {
    print!("{evidence}");
    if evidence.is_insufficient() {
        println!();
    }
}

/// Exit status for a failed command: 2 for caller mistakes, 1 otherwise.
#[must_use]
pub const fn exit_code(err: &AbError) -> i32 {
    match err {
        AbError::InvalidArgument { .. }
        | AbError::InvalidConfig { .. }
        | AbError::MissingConfig { .. }
        | AbError::ConfigParse { .. }
        | AbError::MalformedRequestId { .. }
        | AbError::RequestNotFound { .. }
        | AbError::DuplicateOutcome { .. } => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn record_accepts_negative_values() {
        let cli =
            Cli::try_parse_from(["abe", "record", "00000000000000000000000000000001", "-0.5"])
                .expect("parse");
        let Command::Record { value, .. } = cli.command else {
            panic!("expected record");
        };
        assert!((value + 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn simulate_in_memory_runs() {
        let cli = Cli::try_parse_from([
            "abe", "simulate", "--requests", "40", "--seed", "3", "--json",
        ])
        .expect("parse");
        assert!(cli.json);
        run(&cli).expect("simulate");
    }

    #[test]
    fn simulate_leaves_configured_ledger_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = dir.path().join("checkout.sqlite3");
        let config_path = dir.path().join("abe.toml");
        std::fs::write(
            &config_path,
            format!(
                "[experiment]\nid = \"checkout\"\n\n[storage]\nbackend = \"sqlite\"\npath = {:?}\n",
                db.display().to_string()
            ),
        )
        .expect("write config");
        let config_arg = config_path.display().to_string();

        let cli = Cli::try_parse_from([
            "abe", "--config", &config_arg, "simulate", "--requests", "50", "--seed", "1",
        ])
        .expect("parse");
        run(&cli).expect("simulate");

        let config = Config::load(&config_path).expect("config");
        let ledger = open_ledger(&config).expect("open");
        assert_eq!(ledger.request_count().expect("count"), 0);
        let evidence = compile_evidence(&ledger, &config.experiment.inference_options())
            .expect("report");
        let Evidence::InsufficientData { n_a, n_b, .. } = evidence else {
            panic!("simulated outcomes leaked into the configured ledger");
        };
        assert_eq!((n_a, n_b), (0, 0));
    }

    #[test]
    fn simulation_runs_under_a_separate_experiment_id() {
        assert_eq!(simulation_experiment_id("checkout"), "checkout-simulation");
    }

    #[test]
    fn caller_mistakes_exit_with_two() {
        let err = AbError::MalformedRequestId {
            raw: "x".to_string(),
        };
        assert_eq!(exit_code(&err), 2);
        let err = AbError::Sql {
            context: "t",
            details: "d".to_string(),
        };
        assert_eq!(exit_code(&err), 1);
    }
}
