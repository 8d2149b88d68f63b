//! Shared address and identifier types.

use std::sync::atomic::{AtomicU64, Ordering};

/// Size in bytes of one machine word, the engine's unit of conflict
/// detection. Sub-word accesses are widened to the containing word.
pub const WORD_SIZE: usize = std::mem::size_of::<u64>();

/// Number of low bits to strip off an address to get its word-alignment
/// bits (`log2(WORD_SIZE)`).
pub const WORD_ALIGN_BITS: u32 = WORD_SIZE.trailing_zeros();

/// A machine word as manipulated by the engine's word-granularity
/// primitive.
pub type Word = u64;

/// Round `addr` down to the start of its containing word.
#[inline]
pub fn word_base(addr: usize) -> usize {
    addr & !(WORD_SIZE - 1)
}

/// Byte offset of `addr` within its containing word (0..WORD_SIZE).
#[inline]
pub fn word_offset(addr: usize) -> usize {
    addr & (WORD_SIZE - 1)
}

/// Build a byte-granularity mask selecting `len` bytes starting at
/// `offset` within a word. Bits are set for every byte the access
/// touches; a masked store only modifies those byte lanes.
#[inline]
pub fn lane_mask(offset: usize, len: usize) -> Word {
    debug_assert!(offset + len <= WORD_SIZE);
    if len >= WORD_SIZE {
        return Word::MAX;
    }
    let byte_mask: Word = (1u64 << (len * 8)) - 1;
    byte_mask << (offset * 8)
}

/// Unique identifier for a transaction descriptor.
///
/// Allocated once per thread's descriptor (not per attempt); the
/// `attempt` counter on the descriptor tracks retries within one
/// identifier's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxId(pub u64);

impl TxId {
    /// The sentinel "no owner" id, never assigned to a real transaction.
    pub const NONE: TxId = TxId(0);
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tx#{}", self.0)
    }
}

/// Process-wide allocator of [`TxId`]s, shared by every thread's
/// `thread_init`.
#[derive(Debug, Default)]
pub struct TxIdAllocator(AtomicU64);

impl TxIdAllocator {
    /// Create a fresh allocator starting at id 1 (0 is reserved as `NONE`).
    pub fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    /// Allocate the next identifier.
    pub fn next(&self) -> TxId {
        TxId(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

/// Per-transaction attributes supplied to `start`.
///
/// Mirrors §3's `attributes: {id, read_only, visible_reads, no_retry,
/// no_extend}` field group on the transaction descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attributes {
    /// The transaction will not perform any stores; `commit` can take the
    /// read-only fast path and `store` is a misuse error.
    pub read_only: bool,
    /// Reads immediately validate against the current owner rather than
    /// being deferred to commit-time/extension validation. Present for
    /// API completeness; the default (invisible reads) is what the engine
    /// implements, matching the distilled spec's load/store protocol.
    pub visible_reads: bool,
    /// A conflict or validation failure is surfaced to the caller as an
    /// error instead of being retried internally.
    pub no_retry: bool,
    /// Snapshot extension is disabled; any staleness observed after a
    /// load's post-read recheck aborts immediately rather than attempting
    /// to advance `start_ts`.
    pub no_extend: bool,
}

impl Default for Attributes {
    fn default() -> Self {
        Attributes {
            read_only: false,
            visible_reads: false,
            no_retry: false,
            no_extend: false,
        }
    }
}

impl Attributes {
    /// Attributes for a transaction that performs no stores.
    pub fn read_only() -> Self {
        Attributes {
            read_only: true,
            ..Default::default()
        }
    }
}
