//! Ledger records: variants, request identifiers, requests and outcomes.

#![allow(missing_docs)]

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::{AbError, Result};

/// One of the two compared alternatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Variant {
    A,
    B,
}

impl Variant {
    /// Both variants, A first.
    pub const ALL: [Self; 2] = [Self::A, Self::B];

    /// Stable single-letter tag used in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }

    /// Weighted assignment: `draw` is a uniform value in `[0, 1)` and
    /// `split` the probability of landing on A.
    #[must_use]
    pub fn assign(draw: f64, split: f64) -> Self {
        if draw < split { Self::A } else { Self::B }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = AbError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "A" | "a" => Ok(Self::A),
            "B" | "b" => Ok(Self::B),
            other => Err(AbError::Serialization {
                context: "variant",
                details: format!("unknown variant tag {other:?}"),
            }),
        }
    }
}

/// 128-bit random request identifier, rendered as 32 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u128);

impl RequestId {
    /// Fresh identifier from the thread-local CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        Self(rand::random())
    }

    #[must_use]
    pub const fn from_u128(raw: u128) -> Self {
        Self(raw)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = AbError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.len() != 32 || !trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(AbError::MalformedRequestId { raw: s.to_string() });
        }
        u128::from_str_radix(trimmed, 16)
            .map(Self)
            .map_err(|_| AbError::MalformedRequestId { raw: s.to_string() })
    }
}

impl Serialize for RequestId {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A routed request. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub experiment_id: String,
    pub variant: Variant,
    pub input: Value,
    pub created_at: DateTime<Utc>,
}

/// The delayed outcome attached to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub request_id: RequestId,
    pub value: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Request lifecycle: routed, then resolved once an outcome arrives.
///
/// There is no way back to `Created` and no expiry; an unresolved request is
/// simply left out of every evidence computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Created,
    Resolved,
}

/// How a repeated `record_outcome` for the same request is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateOutcomePolicy {
    /// Last write wins.
    #[default]
    Overwrite,
    /// Keep the first outcome and fail with `DuplicateOutcome`.
    Reject,
}

/// What a successful outcome write did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutcomeWrite {
    Inserted,
    Overwrote { previous: f64 },
}
