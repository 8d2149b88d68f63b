//! Process-wide tuning defaults.
//!
//! Mirrors the teacher's `Limits` struct in spirit (a small, documented
//! bag of size constants) but covers the tuning surface §6 names for the
//! STM core: VLT size, hash shift, and read/write-set initial capacities.

/// Default size of the Versioned Lock Table, in entries. Must be a power
/// of two; see [`RuntimeConfig`](https://docs.rs/wstm-runtime) for the
/// validated, user-facing setting.
pub const DEFAULT_VLT_SIZE: usize = 1 << 20;

/// Default initial capacity of a transaction's read set.
pub const DEFAULT_READ_SET_CAPACITY: usize = 64;

/// Default initial capacity of a transaction's write set.
pub const DEFAULT_WRITE_SET_CAPACITY: usize = 32;

/// Default number of times the closure-based retry driver will
/// re-invoke a transactional block before giving up and surfacing the
/// last conflict to the caller.
pub const DEFAULT_MAX_ATTEMPTS: u64 = 10_000;

/// Maximum number of descriptors kept in a thread's reuse pool.
///
/// Grounded in the teacher's `TransactionPool::MAX_POOL_SIZE`: most
/// threads only ever have one active transaction, so a small cap is
/// sufficient and keeps per-thread memory bounded.
pub const MAX_POOL_SIZE: usize = 8;
