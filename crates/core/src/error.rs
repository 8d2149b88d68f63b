//! Error types for the wstm runtime.
//!
//! Mirrors the shape of a unified, `thiserror`-derived error hierarchy:
//! one variant per error kind, with small predicate helpers so callers
//! can decide whether to retry without matching on the whole enum.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type surfaced by the STM core.
///
/// Per the error handling design: `ConflictAbort` and `ValidationFailure`
/// are recovered internally via restart and only escape to the caller when
/// the transaction's `no_retry` attribute is set. `ResourceExhaustion` and
/// `InvalidMemory` are always fatal for the current attempt. `Misuse`
/// indicates a programmer error (e.g. commit without start) and is never
/// retried.
#[derive(Debug, Error)]
pub enum Error {
    /// The transaction lost a race for a lock entry and was aborted by the
    /// contention manager, or detected a conflicting writer at commit time.
    #[error("transaction {txn_id} aborted: conflict on word {addr:#x}")]
    ConflictAbort {
        /// Identifier of the aborting transaction.
        txn_id: u64,
        /// Address of the memory word that conflicted.
        addr: usize,
    },

    /// Read-set (or CAS-set) revalidation failed, either during snapshot
    /// extension or at commit time.
    #[error("transaction {txn_id} failed validation: {reason}")]
    ValidationFailure {
        /// Identifier of the failing transaction.
        txn_id: u64,
        /// Human-readable reason (which read-set entry, which check).
        reason: String,
    },

    /// A read-set or write-set could not grow to hold another entry, or an
    /// allocation inside `tx_alloc` failed.
    #[error("resource exhausted in transaction {txn_id}: {reason}")]
    ResourceExhaustion {
        /// Identifier of the transaction that ran out of resources.
        txn_id: u64,
        /// What was exhausted (read set, write set, allocator).
        reason: String,
    },

    /// A load or store touched memory the engine could not safely access.
    #[error("invalid memory access at {addr:#x}: {reason}")]
    InvalidMemory {
        /// Address that faulted.
        addr: usize,
        /// Description of the fault.
        reason: String,
    },

    /// Programmer error: commit without start, store in a read-only
    /// transaction, a stack-bounds contract violation, double `init`, or a
    /// tuning parameter set after the first transaction began.
    #[error("STM misuse: {0}")]
    Misuse(String),
}

impl Error {
    /// Build a [`Error::ConflictAbort`].
    pub fn conflict(txn_id: u64, addr: usize) -> Self {
        Error::ConflictAbort { txn_id, addr }
    }

    /// Build a [`Error::ValidationFailure`].
    pub fn validation(txn_id: u64, reason: impl Into<String>) -> Self {
        Error::ValidationFailure {
            txn_id,
            reason: reason.into(),
        }
    }

    /// Build a [`Error::Misuse`].
    pub fn misuse(reason: impl Into<String>) -> Self {
        Error::Misuse(reason.into())
    }

    /// Whether this error represents a conflict that is safe to retry
    /// (i.e. should drive a restart rather than escape to the caller).
    ///
    /// Used by the closure-based retry driver: only conflict and
    /// validation failures are retried; resource exhaustion, invalid
    /// memory, and misuse propagate immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ConflictAbort { .. } | Error::ValidationFailure { .. }
        )
    }

    /// Whether this is specifically a lock-contention conflict (as opposed
    /// to a read-set validation failure). Used to pick the right counter.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::ConflictAbort { .. })
    }
}
