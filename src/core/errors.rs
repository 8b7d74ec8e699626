//! ABE-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::ledger::records::{RequestId, Variant};

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, AbError>;

/// Top-level error type for the evidence engine.
///
/// "Not enough data" is a normal result value
/// ([`crate::stats::Statistics::Insufficient`]), never an error.
#[derive(Debug, Error)]
pub enum AbError {
    #[error("[ABE-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[ABE-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[ABE-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[ABE-1101] invalid argument {name}: {details}")]
    InvalidArgument {
        name: &'static str,
        details: String,
    },

    #[error("[ABE-2001] request not found: {request_id}")]
    RequestNotFound { request_id: RequestId },

    #[error("[ABE-2002] outcome already recorded for request {request_id}")]
    DuplicateOutcome { request_id: RequestId },

    #[error("[ABE-2003] request id collision: {request_id}")]
    DuplicateRequest { request_id: RequestId },

    #[error("[ABE-2004] no models registered for experiment {experiment_id}")]
    ModelsNotRegistered { experiment_id: String },

    #[error("[ABE-2005] malformed request id {raw:?}")]
    MalformedRequestId { raw: String },

    #[error("[ABE-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[ABE-2102] SQL failure in {context}: {details}")]
    Sql {
        context: &'static str,
        details: String,
    },

    #[error("[ABE-3001] adapter for variant {variant} failed on {request_id}: {details}")]
    Adapter {
        variant: Variant,
        request_id: RequestId,
        details: String,
    },

    #[error("[ABE-3002] numeric failure in {context}: {details}")]
    Numeric {
        context: &'static str,
        details: String,
    },

    #[error("[ABE-3003] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AbError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "ABE-1001",
            Self::MissingConfig { .. } => "ABE-1002",
            Self::ConfigParse { .. } => "ABE-1003",
            Self::InvalidArgument { .. } => "ABE-1101",
            Self::RequestNotFound { .. } => "ABE-2001",
            Self::DuplicateOutcome { .. } => "ABE-2002",
            Self::DuplicateRequest { .. } => "ABE-2003",
            Self::ModelsNotRegistered { .. } => "ABE-2004",
            Self::MalformedRequestId { .. } => "ABE-2005",
            Self::Serialization { .. } => "ABE-2101",
            Self::Sql { .. } => "ABE-2102",
            Self::Adapter { .. } => "ABE-3001",
            Self::Numeric { .. } => "ABE-3002",
            Self::Io { .. } => "ABE-3003",
        }
    }

    /// Whether retrying might resolve the failure. Adapter failures are not:
    /// a retry routes a fresh request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Sql { .. })
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for AbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql {
            context: "rusqlite",
            details: value.to_string(),
        }
    }
}

impl From<serde_json::Error> for AbError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for AbError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_embedded_in_messages() {
        let err = AbError::RequestNotFound {
            request_id: RequestId::from_u128(0xabc),
        };
        assert_eq!(err.code(), "ABE-2001");
        assert!(err.to_string().starts_with("[ABE-2001]"));
        assert!(err.to_string().contains("00000000000000000000000000000abc"));
    }

    #[test]
    fn only_storage_failures_are_retryable() {
        let sql = AbError::Sql {
            context: "test",
            details: "locked".to_string(),
        };
        let adapter = AbError::Adapter {
            variant: Variant::B,
            request_id: RequestId::from_u128(1),
            details: "boom".to_string(),
        };
        assert!(sql.is_retryable());
        assert!(!adapter.is_retryable());
        assert!(
            !AbError::RequestNotFound {
                request_id: RequestId::from_u128(1)
            }
            .is_retryable()
        );
    }

    #[test]
    fn toml_errors_map_to_config_parse() {
        let err: AbError = toml::from_str::<toml::Value>("not = = toml")
            .expect_err("invalid toml")
            .into();
        assert_eq!(err.code(), "ABE-1003");
    }
}
