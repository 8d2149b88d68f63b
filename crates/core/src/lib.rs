//! Shared types, error model, tuning defaults, and observability counters
//! for the `wstm` software transactional memory runtime.
//!
//! This crate has no STM logic of its own; it is the vocabulary the
//! `wstm-vlt`, `wstm-engine`, and `wstm-runtime` crates build on, the way
//! `strata-core` underlies the rest of its workspace.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod limits;
pub mod stats;
pub mod types;

pub use error::{Error, Result};
pub use stats::{AbortCause, Stats, StatsSnapshot};
pub use types::{
    lane_mask, word_base, word_offset, Attributes, TxId, TxIdAllocator, Word, WORD_ALIGN_BITS,
    WORD_SIZE,
};
