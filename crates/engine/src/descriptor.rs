//! The Transaction Descriptor: per-thread state tracked across a
//! transaction's lifetime (§3's "Transaction descriptor").

use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::collections::HashMap;
use wstm_core::{Attributes, TxId, Word};

/// Lifecycle states of one transaction attempt, per §4.2's state machine.
///
/// `Idle -> Active -> (Committing -> Committed | Aborted -> Active)`.
/// From `Committed` or `Aborted` the descriptor is reusable for the next
/// transaction via `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// No transaction is in progress on this descriptor.
    Idle,
    /// A transaction is executing; loads and stores are permitted.
    Active,
    /// `commit` has begun validating the read set and writing back.
    Committing,
    /// The transaction aborted; its writes were discarded.
    Aborted,
    /// The transaction committed; its writes are now visible.
    Committed,
}

/// One entry of the read set: which lock entry was consulted, and the
/// version observed at the time.
#[derive(Debug, Clone, Copy)]
pub struct ReadEntry {
    /// Address of the word that was read (kept for diagnostics and for
    /// the `InvalidMemory`/conflict error reporting).
    pub addr: usize,
    /// VLT index of the lock entry that arbitrates `addr`.
    pub index: usize,
    /// The version observed when this entry was recorded.
    pub version: u64,
}

/// The list of `(lock_entry, observed_version)` pairs a transaction has
/// depended upon. Ordered by insertion; deduplicated by address so a
/// tight read loop over the same word doesn't grow the set unboundedly.
#[derive(Debug, Default)]
pub struct ReadSet {
    entries: Vec<ReadEntry>,
    seen: HashMap<usize, usize>, // addr -> index into `entries`
}

impl ReadSet {
    /// Create an empty read set with room for `capacity` entries without
    /// reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        ReadSet {
            entries: Vec::with_capacity(capacity),
            seen: HashMap::with_capacity(capacity),
        }
    }

    /// Record that `addr` (hashing to VLT index `index`) was read at
    /// `version`. A second read of the same address is a no-op: the
    /// first recorded version already protects it.
    pub fn record(&mut self, addr: usize, index: usize, version: u64) {
        if self.seen.contains_key(&addr) {
            return;
        }
        self.seen.insert(addr, self.entries.len());
        self.entries.push(ReadEntry {
            addr,
            index,
            version,
        });
    }

    /// Iterate the recorded entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ReadEntry> {
        self.entries.iter()
    }

    /// Number of distinct addresses read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been read yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear the set, keeping its allocated capacity for reuse by the
    /// next transaction on this descriptor.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.seen.clear();
    }
}

/// One entry of the write set: the buffered value for one target word,
/// the byte lanes it covers, which lock entry guards it, and the version
/// to restore if the transaction aborts.
#[derive(Debug, Clone, Copy)]
pub struct WriteEntry {
    /// Address of the target word.
    pub addr: usize,
    /// Buffered value. Only the bits selected by `mask` are meaningful;
    /// the rest are write-back filler and are ignored by the masked
    /// store.
    pub value: Word,
    /// Which byte lanes of `value` this entry actually writes.
    pub mask: Word,
    /// VLT index of the lock entry guarding `addr`.
    pub index: usize,
    /// The version observed on `addr`'s lock entry before this
    /// transaction locked it, restored on abort.
    pub prev_version: u64,
}

/// The buffered writes a transaction will apply on commit.
///
/// Logically a mapping from target address to latest buffered value;
/// a side table accelerates the address -> entry lookup so repeated
/// writes to the same address coalesce in place (§8 property P4)
/// instead of growing the set.
#[derive(Debug, Default)]
pub struct WriteSet {
    entries: Vec<WriteEntry>,
    index_of_addr: HashMap<usize, usize>,
}

impl WriteSet {
    /// Create an empty write set with room for `capacity` entries
    /// without reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        WriteSet {
            entries: Vec::with_capacity(capacity),
            index_of_addr: HashMap::with_capacity(capacity),
        }
    }

    /// Look up the buffered entry for `addr`, if any.
    pub fn get(&self, addr: usize) -> Option<&WriteEntry> {
        self.index_of_addr
            .get(&addr)
            .map(|&i| &self.entries[i])
    }

    /// Merge `value` (selected by `mask`) into the entry for `addr`,
    /// creating one via `lock_index`/`prev_version` if this is the first
    /// write to `addr` in this transaction. Byte lanes not covered by
    /// `mask` in a pre-existing entry are left untouched (P4: repeated
    /// stores to the same address coalesce to the union of their lanes,
    /// most-recent value winning on overlap).
    pub fn merge(&mut self, addr: usize, value: Word, mask: Word, lock_index: usize, prev_version: u64) {
        if let Some(&i) = self.index_of_addr.get(&addr) {
            let entry = &mut self.entries[i];
            entry.value = (entry.value & !mask) | (value & mask);
            entry.mask |= mask;
        } else {
            self.index_of_addr.insert(addr, self.entries.len());
            self.entries.push(WriteEntry {
                addr,
                value: value & mask,
                mask,
                index: lock_index,
                prev_version,
            });
        }
    }

    /// Iterate buffered entries in first-write order.
    pub fn iter(&self) -> impl Iterator<Item = &WriteEntry> {
        self.entries.iter()
    }

    /// The `prev_version` already recorded for some other address that
    /// hashed to the same VLT `index`, if this transaction has already
    /// locked that slot once. `try_lock`'s re-entrant branch reports the
    /// caller's own `start_ts` as the "previous" version when the slot is
    /// already self-owned, which is only correct the first time a slot is
    /// locked in this transaction; a second, distinct address colliding
    /// into the same slot must restore to the version recorded then, not
    /// to `start_ts`, or abort would inflate the slot's version.
    pub fn prev_version_for_index(&self, index: usize) -> Option<u64> {
        self.entries.iter().find(|e| e.index == index).map(|e| e.prev_version)
    }

    /// Number of distinct addresses written.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been written yet: a transaction with an
    /// empty write set takes the read-only commit fast path regardless
    /// of its declared `read_only` attribute.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear the set, keeping its allocated capacity for reuse.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index_of_addr.clear();
    }
}

/// An opaque restart point returned by `start`.
///
/// The engine implements the closure-based restart strategy the design
/// notes call out as "strongly preferred": the transactional block
/// itself is the entry context, re-invoked by the driver's
/// `while aborted { block() }` loop. `EntryContext` exists so the public
/// API shape of §6 (`start(attrs) -> EntryContext*`) has a concrete
/// value to return, but it carries no captured machine state: there is
/// nothing to long-jump back to.
#[derive(Debug, Clone, Copy)]
pub struct EntryContext {
    /// The transaction this context belongs to.
    pub txn_id: TxId,
    /// Which attempt this is (1 for the first try).
    pub attempt: u64,
}

/// Per-thread state tracked across a transaction's lifetime: status,
/// read/write sets, start timestamp, retry count, and attributes.
///
/// Created at thread init and reused across every transaction that
/// thread runs; `reset` clears the sets in place without releasing their
/// backing allocations, so a descriptor that has grown to fit a large
/// transaction does not pay reallocation cost on the next one.
#[derive(Debug)]
pub struct TransactionContext {
    /// This descriptor's stable identifier, allocated once at thread
    /// init and reused across every transaction the thread runs.
    pub txn_id: TxId,
    /// Current lifecycle state.
    pub status: TransactionStatus,
    /// GC snapshot taken at `start` or advanced by snapshot extension.
    pub start_ts: u64,
    /// Words read so far this transaction.
    pub read_set: ReadSet,
    /// Words buffered for write-back at commit.
    pub write_set: WriteSet,
    /// How many times this transaction has been attempted (1-based).
    pub attempt: u64,
    /// Attributes supplied to `start`.
    pub attrs: Attributes,
    /// Contention-manager backoff state, seeded once per descriptor and
    /// advanced on every backoff decision.
    pub rng_state: SmallRng,
}

impl TransactionContext {
    /// Create a fresh, idle descriptor for `txn_id` with default set
    /// capacities.
    pub fn new(txn_id: TxId) -> Self {
        Self::with_capacity(
            txn_id,
            wstm_core::limits::DEFAULT_READ_SET_CAPACITY,
            wstm_core::limits::DEFAULT_WRITE_SET_CAPACITY,
        )
    }

    /// Create a fresh, idle descriptor for `txn_id`, reserving
    /// `read_capacity`/`write_capacity` entries up front.
    pub fn with_capacity(txn_id: TxId, read_capacity: usize, write_capacity: usize) -> Self {
        TransactionContext {
            txn_id,
            status: TransactionStatus::Idle,
            start_ts: 0,
            read_set: ReadSet::with_capacity(read_capacity),
            write_set: WriteSet::with_capacity(write_capacity),
            attempt: 0,
            attrs: Attributes::default(),
            rng_state: SmallRng::seed_from_u64(txn_id.0 ^ 0x9E37_79B9_7F4A_7C15),
        }
    }

    /// Rebind this descriptor to a new identity, clearing its sets in
    /// place so the backing allocations (and any capacity they grew to)
    /// are kept. Used by the runtime crate's descriptor pool to recycle
    /// a descriptor across distinct thread lifetimes rather than
    /// reallocating its read/write sets from scratch.
    pub fn reset(&mut self, txn_id: TxId) {
        self.txn_id = txn_id;
        self.status = TransactionStatus::Idle;
        self.start_ts = 0;
        self.read_set.clear();
        self.write_set.clear();
        self.attempt = 0;
        self.attrs = Attributes::default();
        self.rng_state = SmallRng::seed_from_u64(txn_id.0 ^ 0x9E37_79B9_7F4A_7C15);
    }

    /// Whether this transaction has buffered any writes.
    pub fn is_read_only(&self) -> bool {
        self.write_set.is_empty()
    }
}
