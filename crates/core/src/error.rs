//! Centralized error types for the banker workspace.

use crate::types::ClientId;
use thiserror::Error;

/// Top-level error enum.
///
/// Request denials are not errors: they are ordinary outcomes reported by the
/// arbiter. These variants cover misconfiguration and driver bugs only.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BankerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown client {client} (ledger has {clients} clients)")]
    UnknownClient { client: ClientId, clients: usize },

    #[error("Vector has {got} entries, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Client {client} still has outstanding need; release refused")]
    NeedOutstanding { client: ClientId },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("Client {client} stopped because another client failed")]
    Aborted { client: ClientId },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type BankerResult<T> = Result<T, BankerError>;

/// A broken ledger invariant. Seeing one of these means a bookkeeping bug.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error(
        "client {client}, resource {resource}: allocation {allocation} + need {need} != max {max}"
    )]
    AllocationPlusNeed {
        client: ClientId,
        resource: usize,
        allocation: u32,
        need: u32,
        max: u32,
    },

    #[error("client {client}, resource {resource}: released row still has allocation {allocation}, need {need}")]
    ReleasedRow {
        client: ClientId,
        resource: usize,
        allocation: u32,
        need: u32,
    },

    #[error("resource {resource}: available {available} + allocated {allocated} != total {total}")]
    Conservation {
        resource: usize,
        available: u32,
        allocated: u64,
        total: u32,
    },

    #[error("ledger is in an unsafe state")]
    Unsafe,
}
