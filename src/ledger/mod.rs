//! Routing and tracking ledger.
//!
//! A [`Ledger`] owns one experiment's model registry and its storage. It
//! assigns each routed request to a variant by weighted coin flip, persists
//! the request, and later attaches the delayed outcome. Evidence is computed
//! from [`Ledger::partition_outcomes_by_variant`] snapshots; the ledger
//! itself never computes statistics.
//!
//! Routing is record-then-invoke: the request is stored before the adapter
//! runs, so a failing adapter still leaves an unresolved request behind.

pub mod adapter;
pub mod memory;
pub mod records;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod storage;

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;

use crate::core::config::{Config, ExperimentConfig, StorageKind};
use crate::core::errors::{AbError, Result};

pub use adapter::{AdapterError, IdentityAdapter, ModelAdapter, SharedAdapter};
pub use memory::MemoryStorage;
pub use records::{
    DuplicateOutcomePolicy, Outcome, OutcomeWrite, Request, RequestId, RequestState, Variant,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;
pub use storage::{StorageBackend, VariantOutcomes};

#[derive(Clone)]
struct ModelPair {
    a: SharedAdapter,
    b: SharedAdapter,
}

impl ModelPair {
    fn get(&self, variant: Variant) -> &SharedAdapter {
        match variant {
            Variant::A => &self.a,
            Variant::B => &self.b,
        }
    }
}

/// Result of a successful [`Ledger::route`].
#[derive(Debug, Clone, PartialEq)]
pub struct Routed {
    /// Output of the assigned variant's adapter.
    pub prediction: Value,
    /// Key for reporting the delayed outcome.
    pub request_id: RequestId,
    /// Variant the request was assigned to.
    pub variant: Variant,
}

/// Request/outcome ledger for one experiment.
pub struct Ledger<S: StorageBackend = MemoryStorage> {
    experiment_id: String,
    duplicate_outcomes: DuplicateOutcomePolicy,
    storage: S,
    models: RwLock<Option<ModelPair>>,
}

impl<S: StorageBackend> std::fmt::Debug for Ledger<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("experiment_id", &self.experiment_id)
            .field("duplicate_outcomes", &self.duplicate_outcomes)
            .field("storage", &self.storage.name())
            .field("registered", &self.models.read().is_some())
            .finish()
    }
}

impl Ledger<MemoryStorage> {
    /// Ledger backed by fresh in-memory storage with default policy.
    #[must_use]
    pub fn in_memory(experiment_id: impl Into<String>) -> Self {
        Self::new(MemoryStorage::new(), experiment_id, DuplicateOutcomePolicy::default())
    }
}

impl<S: StorageBackend> Ledger<S> {
    /// Ledger over `storage`; no models are registered yet.
    pub fn new(
        storage: S,
        experiment_id: impl Into<String>,
        duplicate_outcomes: DuplicateOutcomePolicy,
    ) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            duplicate_outcomes,
            storage,
            models: RwLock::new(None),
        }
    }

    /// Ledger configured from an `[experiment]` section.
    pub fn from_config(storage: S, config: &ExperimentConfig) -> Self {
        Self::new(storage, config.id.clone(), config.duplicate_outcomes)
    }

    /// Experiment this ledger tracks.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Underlying storage backend.
    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Register both variants, replacing any previous registration.
    pub fn register<A, B>(&self, model_a: A, model_b: B)
    where
        A: ModelAdapter + 'static,
        B: ModelAdapter + 'static,
    {
        self.register_shared(std::sync::Arc::new(model_a), std::sync::Arc::new(model_b));
    }

    /// Register already-shared adapters.
    pub fn register_shared(&self, model_a: SharedAdapter, model_b: SharedAdapter) {
        let replaced = self
            .models
            .write()
            .replace(ModelPair {
                a: model_a,
                b: model_b,
            })
            .is_some();
        tracing::debug!(experiment = %self.experiment_id, replaced, "registered model variants");
    }

    /// Route one input. `split` is the probability of assigning variant A.
    ///
    /// Every call stores exactly one new request, independently of earlier
    /// calls with the same input. The adapter is invoked after the request is
    /// stored; its failure is returned as [`AbError::Adapter`] and the stored
    /// request stays in `Created` state.
    pub fn route(&self, input: Value, split: f64) -> Result<Routed> {
        if !(0.0..=1.0).contains(&split) {
            return Err(AbError::InvalidArgument {
                name: "split",
                details: format!("{split} is outside [0, 1]"),
            });
        }

        let variant = Variant::assign(rand::random::<f64>(), split);
        let adapter = {
            let models = self.models.read();
            let Some(pair) = models.as_ref() else {
                return Err(AbError::ModelsNotRegistered {
                    experiment_id: self.experiment_id.clone(),
                });
            };
            pair.get(variant).clone()
        };

        let request = Request {
            id: RequestId::generate(),
            experiment_id: self.experiment_id.clone(),
            variant,
            input,
            created_at: Utc::now(),
        };
        self.storage.save_request(&request)?;
        tracing::debug!(request = %request.id, %variant, "routed request");

        let prediction = adapter.predict(&request.input).map_err(|err| {
            tracing::warn!(request = %request.id, %variant, error = %err, "model adapter failed");
            AbError::Adapter {
                variant,
                request_id: request.id,
                details: err.to_string(),
            }
        })?;

        Ok(Routed {
            prediction,
            request_id: request.id,
            variant,
        })
    }

    /// Attach the delayed outcome for a routed request.
    ///
    /// Unknown ids fail with [`AbError::RequestNotFound`] and leave the ledger
    /// unchanged. A second outcome for the same request follows the ledger's
    /// [`DuplicateOutcomePolicy`]. No range check is applied to `value`.
    pub fn record_outcome(&self, request_id: RequestId, value: f64) -> Result<OutcomeWrite> {
        let outcome = Outcome {
            request_id,
            value,
            recorded_at: Utc::now(),
        };
        let write = self.storage.save_outcome(&outcome, self.duplicate_outcomes)?;
        match write {
            OutcomeWrite::Inserted => {
                tracing::debug!(request = %request_id, value, "recorded outcome");
            }
            OutcomeWrite::Overwrote { previous } => {
                tracing::warn!(request = %request_id, previous, value, "outcome overwritten");
            }
        }
        Ok(write)
    }

    /// Recorded outcome values grouped by assigned variant. Requests with no
    /// outcome are left out.
    pub fn partition_outcomes_by_variant(&self) -> Result<VariantOutcomes> {
        self.storage.outcomes_partitioned()
    }

    /// Stored request for `request_id`, if routed by this experiment.
    pub fn request(&self, request_id: RequestId) -> Result<Option<Request>> {
        self.storage.get_request(request_id)
    }

    /// Outcome recorded for `request_id`, if any.
    pub fn outcome(&self, request_id: RequestId) -> Result<Option<Outcome>> {
        self.storage.get_outcome(request_id)
    }

    /// Lifecycle state of a routed request.
    pub fn state(&self, request_id: RequestId) -> Result<RequestState> {
        if self.storage.get_request(request_id)?.is_none() {
            return Err(AbError::RequestNotFound { request_id });
        }
        Ok(if self.storage.get_outcome(request_id)?.is_some() {
            RequestState::Resolved
        } else {
            RequestState::Created
        })
    }

    /// Number of routed requests, resolved or not.
    pub fn request_count(&self) -> Result<usize> {
        self.storage.request_count()
    }
}

/// Open the storage backend named by `config.storage`.
pub fn open_storage(config: &Config) -> Result<Box<dyn StorageBackend>> {
    match config.storage.backend {
        StorageKind::Memory => Ok(Box::new(MemoryStorage::new())),
        #[cfg(feature = "sqlite")]
        StorageKind::Sqlite => Ok(Box::new(SqliteStorage::open(
            &config.storage.path,
            config.experiment.id.clone(),
        )?)),
        #[cfg(not(feature = "sqlite"))]
        StorageKind::Sqlite => Err(AbError::InvalidConfig {
            details: "sqlite backend requested but the `sqlite` feature is disabled".to_string(),
        }),
    }
}
