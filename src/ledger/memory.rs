//! In-memory reference backend.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use parking_lot::RwLock;

use crate::core::errors::{AbError, Result};
use crate::ledger::records::{
    DuplicateOutcomePolicy, Outcome, OutcomeWrite, Request, RequestId, Variant,
};
use crate::ledger::storage::{StorageBackend, VariantOutcomes};

/// Requests and outcomes held in two maps keyed by request id.
///
/// Lock order is always `requests` then `outcomes`.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    requests: RwLock<HashMap<RequestId, Request>>,
    outcomes: RwLock<HashMap<RequestId, Outcome>>,
}

impl MemoryStorage {
    /// Empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn save_request(&self, request: &Request) -> Result<()> {
        match self.requests.write().entry(request.id) {
            Entry::Occupied(_) => Err(AbError::DuplicateRequest {
                request_id: request.id,
            }),
            Entry::Vacant(slot) => {
                slot.insert(request.clone());
                Ok(())
            }
        }
    }

    fn save_outcome(
        &self,
        outcome: &Outcome,
        policy: DuplicateOutcomePolicy,
    ) -> Result<OutcomeWrite> {
        let requests = self.requests.read();
        if !requests.contains_key(&outcome.request_id) {
            return Err(AbError::RequestNotFound {
                request_id: outcome.request_id,
            });
        }
        let mut outcomes = self.outcomes.write();
        match outcomes.entry(outcome.request_id) {
            Entry::Vacant(slot) => {
                slot.insert(outcome.clone());
                Ok(OutcomeWrite::Inserted)
            }
            Entry::Occupied(mut slot) => match policy {
                DuplicateOutcomePolicy::Reject => Err(AbError::DuplicateOutcome {
                    request_id: outcome.request_id,
                }),
                DuplicateOutcomePolicy::Overwrite => {
                    let previous = slot.insert(outcome.clone()).value;
                    Ok(OutcomeWrite::Overwrote { previous })
                }
            },
        }
    }

    fn get_request(&self, request_id: RequestId) -> Result<Option<Request>> {
        Ok(self.requests.read().get(&request_id).cloned())
    }

    fn get_outcome(&self, request_id: RequestId) -> Result<Option<Outcome>> {
        Ok(self.outcomes.read().get(&request_id).cloned())
    }

    fn get_all_outcomes(&self) -> Result<Vec<Outcome>> {
        Ok(self.outcomes.read().values().cloned().collect())
    }

    fn get_outcomes_by_variant(&self, variant: Variant) -> Result<Vec<f64>> {
        Ok(self.outcomes_partitioned()?.for_variant(variant).to_vec())
    }

    fn request_count(&self) -> Result<usize> {
        Ok(self.requests.read().len())
    }

    fn outcomes_partitioned(&self) -> Result<VariantOutcomes> {
        let requests = self.requests.read();
        let outcomes = self.outcomes.read();
        let mut split = VariantOutcomes::default();
        for (request_id, outcome) in outcomes.iter() {
            // Outcomes are only ever inserted for existing requests.
            let Some(request) = requests.get(request_id) else {
                continue;
            };
            match request.variant {
                Variant::A => split.a.push(outcome.value),
                Variant::B => split.b.push(outcome.value),
            }
        }
        Ok(split)
    }
}
