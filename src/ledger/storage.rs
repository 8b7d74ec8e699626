//! Storage capability consumed by the ledger.
//!
//! Backends own the per-record atomicity the ledger relies on:
//! `save_outcome` must check that the request exists and apply the
//! duplicate policy in one step with respect to other outcome writes.

use crate::core::errors::Result;
use crate::ledger::records::{
    DuplicateOutcomePolicy, Outcome, OutcomeWrite, Request, RequestId, Variant,
};

/// Outcome values split by the variant their request was routed to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariantOutcomes {
    /// Values recorded for requests routed to A.
    pub a: Vec<f64>,
    /// Values recorded for requests routed to B.
    pub b: Vec<f64>,
}

impl VariantOutcomes {
    /// Values for one variant.
    #[must_use]
    pub fn for_variant(&self, variant: Variant) -> &[f64] {
        match variant {
            Variant::A => &self.a,
            Variant::B => &self.b,
        }
    }
}

/// Request/outcome persistence for one experiment.
pub trait StorageBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Insert a new request. Fails with `DuplicateRequest` if the id exists.
    fn save_request(&self, request: &Request) -> Result<()>;

    /// Attach an outcome to an existing request.
    ///
    /// Fails with `RequestNotFound` (storage unchanged) when the request is
    /// unknown, and with `DuplicateOutcome` when one exists under
    /// [`DuplicateOutcomePolicy::Reject`].
    fn save_outcome(
        &self,
        outcome: &Outcome,
        policy: DuplicateOutcomePolicy,
    ) -> Result<OutcomeWrite>;

    /// Look up a request by id.
    fn get_request(&self, request_id: RequestId) -> Result<Option<Request>>;

    /// Look up the outcome attached to a request, if any.
    fn get_outcome(&self, request_id: RequestId) -> Result<Option<Outcome>>;

    /// Every recorded outcome, in no particular order.
    fn get_all_outcomes(&self) -> Result<Vec<Outcome>>;

    /// Outcome values for requests routed to `variant`.
    fn get_outcomes_by_variant(&self, variant: Variant) -> Result<Vec<f64>>;

    /// Number of routed requests, resolved or not.
    fn request_count(&self) -> Result<usize>;

    /// Both variants' outcome values. Backends that can read both groups
    /// from one snapshot override this.
    fn outcomes_partitioned(&self) -> Result<VariantOutcomes> {
        Ok(VariantOutcomes {
            a: self.get_outcomes_by_variant(Variant::A)?,
            b: self.get_outcomes_by_variant(Variant::B)?,
        })
    }
}

impl<T: StorageBackend + ?Sized> StorageBackend for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn save_request(&self, request: &Request) -> Result<()> {
        (**self).save_request(request)
    }

    fn save_outcome(
        &self,
        outcome: &Outcome,
        policy: DuplicateOutcomePolicy,
    ) -> Result<OutcomeWrite> {
        (**self).save_outcome(outcome, policy)
    }

    fn get_request(&self, request_id: RequestId) -> Result<Option<Request>> {
        (**self).get_request(request_id)
    }

    fn get_outcome(&self, request_id: RequestId) -> Result<Option<Outcome>> {
        (**self).get_outcome(request_id)
    }

    fn get_all_outcomes(&self) -> Result<Vec<Outcome>> {
        (**self).get_all_outcomes()
    }

    fn get_outcomes_by_variant(&self, variant: Variant) -> Result<Vec<f64>> {
        (**self).get_outcomes_by_variant(variant)
    }

    fn request_count(&self) -> Result<usize> {
        (**self).request_count()
    }

    fn outcomes_partitioned(&self) -> Result<VariantOutcomes> {
        (**self).outcomes_partitioned()
    }
}
