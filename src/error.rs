//! Retrieval error types and fallback-chain classification.
//!
//! # Error Handling Philosophy
//!
//! Per-source failures are normal operating conditions, not exceptional
//! ones. The orchestrator always produces a merged record; the only
//! caller-visible errors are input-contract violations.
//!
//! Three per-source outcomes must stay distinguishable because callers and
//! metrics branch on all of them:
//!
//! | Error | Cause | Chain behavior |
//! |-------|-------|----------------|
//! | `NotFound` | Source answered, product unknown | Try next source |
//! | `Timeout` | Source exceeded its time budget | Try next source, record for SLO |
//! | `Transport` | Network/DNS/connection failure | Try next source, record for SLO |
//! | `Api` | Source answered with a server error | Try next source |
//! | `Serialization` | Source answered with an unparseable body | Try next source |
//! | `InvalidQuery` | Malformed input from the caller | Abort, surface to caller |
//! | `Config` | Misconfigured client or chain | Abort, surface to caller |

use thiserror::Error;

/// Result type for retrieval operations.
pub type Result<T> = std::result::Result<T, FetchError>;

/// Errors that can occur while fetching nutrition data.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The source answered but does not know the product. A normal outcome.
    #[error("product not found")]
    NotFound,

    /// The source did not answer within its time budget.
    #[error("source timed out")]
    Timeout,

    /// Transport-level failure (connection refused, DNS, TLS).
    #[error("transport error: {0}")]
    Transport(String),

    /// The source answered with a protocol-level error (HTTP 5xx etc.).
    #[error("API error: {0}")]
    Api(String),

    /// The source answered with a body we could not parse.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The caller supplied a malformed query. The only per-request error
    /// ever surfaced to the caller.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A source or chain was misconfigured.
    #[error("configuration error: {0}")]
    Config(String),
}

/// How the fallback chain reacts to a per-source failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainAction {
    /// Keep whatever partial data was gathered and try the next source.
    Continue,

    /// Stop the whole operation and surface the error to the caller.
    Abort,
}

impl FetchError {
    /// Classify this error for fallback progression.
    ///
    /// Every source-level failure maps to [`ChainAction::Continue`]: a
    /// failure in one source must never prevent attempting the next.
    /// Only input-contract and configuration violations abort.
    pub fn chain_action(&self) -> ChainAction {
        match self {
            Self::NotFound
            | Self::Timeout
            | Self::Transport(_)
            | Self::Api(_)
            | Self::Serialization(_) => ChainAction::Continue,

            Self::InvalidQuery(_) | Self::Config(_) => ChainAction::Abort,
        }
    }

    /// Short stable label for metrics and trace events.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Timeout => "timeout",
            Self::Transport(_) => "transport_error",
            Self::Api(_) => "api_error",
            Self::Serialization(_) => "serialization_error",
            Self::InvalidQuery(_) => "invalid_query",
            Self::Config(_) => "config_error",
        }
    }

    /// True when the product is simply unknown to the source.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_connect() {
            FetchError::Transport(format!("connection failed: {}", err))
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}
