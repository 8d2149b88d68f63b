//! The Transaction Engine: `start`, `load`, `store`, `commit`, `abort`,
//! and the snapshot-extension helper that backs all of them.
//!
//! Locking is encounter-time, not commit-time: `store` acquires a word's
//! lock entry the moment it is first written (§4.2's Store algorithm),
//! so `commit` only has to validate the read set and write back; it
//! never has to acquire anything.

use std::thread;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;

use wstm_core::{word_base, AbortCause, Attributes, Error, Result, Stats, TxId, Word};
use wstm_vlt::{LockState, TryLockError, VersionedLockTable};

use crate::contention::{ContentionManager, Decision};
use crate::descriptor::{EntryContext, TransactionContext, TransactionStatus};
use crate::memory;

/// Hooks the engine fires at the boundaries of a transaction's lifetime.
///
/// `wstm-runtime`'s callback registry implements this trait; the engine
/// itself only ever sees the trait object, so it has no dependency on
/// the registry's ordering or user-data bookkeeping.
pub trait LifecycleHooks: Send + Sync {
    /// Called once `start` has installed a fresh snapshot.
    fn on_start(&self, _tx: &TransactionContext) {}
    /// Called after `commit` decides to proceed past the read-only fast
    /// path, before the read set is validated.
    fn on_precommit(&self, _tx: &TransactionContext) {}
    /// Called after a transaction reaches `Committed`.
    fn on_commit(&self, _tx: &TransactionContext) {}
    /// Called after a transaction reaches `Aborted`, before its sets are
    /// cleared.
    fn on_abort(&self, _tx: &TransactionContext) {}
}

/// No-op hooks, for engines built without a registered module.
#[derive(Debug, Default)]
pub struct NoHooks;

impl LifecycleHooks for NoHooks {}

/// Tuning parameters consumed by [`Engine::new`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of entries in the Versioned Lock Table. Must be a power of
    /// two.
    pub vlt_size: usize,
    /// Address bits to discard before hashing into the VLT.
    pub hash_shift: u32,
    /// Which contention-manager policy to run on every conflict.
    pub contention_manager: ContentionManager,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            vlt_size: wstm_core::limits::DEFAULT_VLT_SIZE,
            hash_shift: wstm_core::WORD_ALIGN_BITS,
            contention_manager: ContentionManager::default(),
        }
    }
}

/// The shared, process-wide Transaction Engine: one Versioned Lock
/// Table, one Global Clock, and the policy/bookkeeping state every
/// thread's transactions consult.
pub struct Engine {
    vlt: VersionedLockTable,
    clock: wstm_vlt::GlobalClock,
    contention_manager: ContentionManager,
    stats: Stats,
    /// `start_ts` of every currently active transaction, keyed by
    /// descriptor id. Consulted by `TimestampPriority` to compare ages
    /// without threading the value through every lock entry.
    active_txns: DashMap<TxId, u64>,
    hooks: Box<dyn LifecycleHooks>,
    /// At most one irrevocable transaction may run at a time; holding
    /// this mutex is how a thread claims that slot.
    irrevocable: Mutex<()>,
}

impl Engine {
    /// Build an engine with the given tuning and lifecycle hooks.
    pub fn new(config: EngineConfig, hooks: Box<dyn LifecycleHooks>) -> Self {
        Engine {
            vlt: VersionedLockTable::new(config.vlt_size, config.hash_shift),
            clock: wstm_vlt::GlobalClock::new(),
            contention_manager: config.contention_manager,
            stats: Stats::default(),
            active_txns: DashMap::new(),
            hooks,
            irrevocable: Mutex::new(()),
        }
    }

    /// Reset the clock and every lock entry to their initial state.
    /// Only valid before any thread has started a transaction.
    pub fn reset(&self) {
        self.vlt.reset();
        self.clock.reset();
    }

    /// The clock's current value, for diagnostics.
    pub fn current_version(&self) -> u64 {
        self.clock.load()
    }

    /// Observability counters accumulated across every transaction this
    /// engine has run.
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Number of entries in the underlying lock table.
    pub fn vlt_len(&self) -> usize {
        self.vlt.len()
    }

    fn require_active(&self, tx: &TransactionContext) -> Result<()> {
        if tx.status != TransactionStatus::Active {
            return Err(Error::misuse(format!(
                "operation requires an active transaction, found {:?}",
                tx.status
            )));
        }
        Ok(())
    }

    fn other_start_ts(&self, owner: TxId) -> u64 {
        self.active_txns.get(&owner).map(|r| *r).unwrap_or(0)
    }

    /// Begin a new attempt on `tx`. Nested calls on an already-active
    /// descriptor are flattened: the outer transaction's snapshot keeps
    /// running and the same [`EntryContext`] is handed back.
    pub fn start(&self, tx: &mut TransactionContext, attrs: Attributes) -> EntryContext {
        if tx.status == TransactionStatus::Active {
            return EntryContext {
                txn_id: tx.txn_id,
                attempt: tx.attempt,
            };
        }
        tx.start_ts = self.clock.load();
        tx.read_set.clear();
        tx.write_set.clear();
        tx.attrs = attrs;
        tx.status = TransactionStatus::Active;
        tx.attempt += 1;
        self.stats.observe_attempt(tx.attempt);
        self.active_txns.insert(tx.txn_id, tx.start_ts);
        self.hooks.on_start(tx);
        EntryContext {
            txn_id: tx.txn_id,
            attempt: tx.attempt,
        }
    }

    /// Revalidate every entry in `tx`'s read set against the clock's
    /// current value and, if every entry still checks out, advance
    /// `start_ts` to that value instead of aborting (§4.2's snapshot
    /// extension).
    ///
    /// An entry passes if it is unlocked with a version no newer than
    /// the candidate timestamp, or locked by `tx` itself. Note this does
    /// *not* require the version to match what was originally observed:
    /// a later writer that committed strictly before the candidate
    /// timestamp doesn't invalidate anything `tx` has already used, it
    /// only means `tx`'s serialization point can be placed just ahead of
    /// that commit instead of at the original `start_ts`.
    fn extend_snapshot(&self, tx: &mut TransactionContext) -> bool {
        if tx.attrs.no_extend {
            return false;
        }
        let candidate = self.clock.load();
        for re in tx.read_set.iter() {
            match self.vlt.entry_at(re.index).read() {
                LockState::Unlocked(v) if v <= candidate => {}
                LockState::Locked(owner) if owner == tx.txn_id => {}
                _ => return false,
            }
        }
        tx.start_ts = candidate;
        self.active_txns.insert(tx.txn_id, candidate);
        self.stats.record_extension();
        true
    }

    /// Release every lock `tx` holds, restoring the version each entry
    /// had before it was acquired, then fire `on_abort` and record the
    /// abort. The single funnel every conflict/validation/invalid-memory
    /// path routes through, per §4.2.
    fn do_abort(&self, tx: &mut TransactionContext, cause: AbortCause) {
        for we in tx.write_set.iter() {
            self.vlt.entry_at(we.index).unlock_restore(we.prev_version);
        }
        tx.status = TransactionStatus::Aborted;
        self.stats.record_abort(cause);
        self.hooks.on_abort(tx);
        tx.write_set.clear();
        tx.read_set.clear();
        self.active_txns.remove(&tx.txn_id);
    }

    /// Explicitly abort an in-progress transaction. A no-op if `tx` is
    /// not currently active or committing.
    pub fn abort(&self, tx: &mut TransactionContext) {
        if matches!(
            tx.status,
            TransactionStatus::Active | TransactionStatus::Committing
        ) {
            self.do_abort(tx, AbortCause::Explicit);
        }
    }

    /// Ask the contention manager what to do about `owner` holding the
    /// entry `tx` wants, given `waits_so_far` on this operation.
    fn resolve(&self, tx: &mut TransactionContext, owner: TxId, waits_so_far: u32) -> Decision {
        let other_start_ts = self.other_start_ts(owner);
        self.contention_manager.on_conflict(
            tx.txn_id,
            tx.start_ts,
            owner,
            other_start_ts,
            waits_so_far,
            &mut tx.rng_state,
        )
    }

    /// Read the word containing `addr` as `tx` would see it: its own
    /// buffered write merged over memory if it has written there,
    /// otherwise the most recent committed value no newer than its
    /// snapshot (§4.2's Load algorithm).
    pub fn load_word(&self, tx: &mut TransactionContext, addr: usize) -> Result<Word> {
        self.require_active(tx)?;
        let base = word_base(addr);

        if let Some(we) = tx.write_set.get(base) {
            // Safe: we hold this word's lock, so memory cannot change
            // underneath us; merge the buffered lanes over the rest.
            let mem = unsafe { memory::read_word(base) };
            return Ok((mem & !we.mask) | we.value);
        }

        let mut waits: u32 = 0;
        loop {
            let index = self.vlt.index_of(base);
            let entry = self.vlt.entry_of(base);
            match entry.read() {
                LockState::Locked(owner) if owner == tx.txn_id => {
                    // A different address hash-collided with one we
                    // already hold. No other transaction can touch it
                    // while we hold the entry, so a direct read is safe;
                    // there is no version to record in the read set.
                    return Ok(unsafe { memory::read_word(base) });
                }
                LockState::Locked(owner) => match self.resolve(tx, owner, waits) {
                    Decision::Wait(delay) => {
                        thread::sleep(delay);
                        waits += 1;
                        continue;
                    }
                    Decision::Abort | Decision::KillOther => {
                        self.do_abort(tx, AbortCause::LockedRead);
                        return Err(Error::conflict(tx.txn_id.0, base));
                    }
                },
                LockState::Unlocked(version) if version <= tx.start_ts => {
                    let value = unsafe { memory::read_word(base) };
                    // Re-check: a writer could have locked and committed
                    // between the read above and this recheck.
                    match entry.read() {
                        LockState::Unlocked(v2) if v2 == version => {
                            tx.read_set.record(base, index, version);
                            return Ok(value);
                        }
                        _ => {
                            if self.extend_snapshot(tx) {
                                continue;
                            }
                            self.do_abort(tx, AbortCause::ValidateRead);
                            return Err(Error::validation(
                                tx.txn_id.0,
                                "read raced with a concurrent writer",
                            ));
                        }
                    }
                }
                LockState::Unlocked(_version) => {
                    // Newer than our snapshot: only a wider snapshot can
                    // make this address legible without aborting.
                    if self.extend_snapshot(tx) {
                        continue;
                    }
                    self.do_abort(tx, AbortCause::ValidateRead);
                    return Err(Error::validation(
                        tx.txn_id.0,
                        "snapshot stale and extension failed",
                    ));
                }
            }
        }
    }

    /// Buffer `value` (selected by `mask`) for write-back to the word
    /// containing `addr` at commit, acquiring that word's lock entry on
    /// first write (§4.2's Store algorithm).
    pub fn store_word_masked(&self, tx: &mut TransactionContext, addr: usize, value: Word, mask: Word) -> Result<()> {
        self.require_active(tx)?;
        if tx.attrs.read_only {
            return Err(Error::misuse("store in a read-only transaction"));
        }
        let base = word_base(addr);

        if tx.write_set.get(base).is_some() {
            tx.write_set.merge(base, value, mask, 0, 0);
            return Ok(());
        }

        let mut waits: u32 = 0;
        loop {
            let index = self.vlt.index_of(base);
            let entry = self.vlt.entry_of(base);
            match entry.try_lock(tx.txn_id, tx.start_ts) {
                Ok(prev_version) => {
                    // If this slot is already locked by us under a
                    // different address (a hash collision), `try_lock`
                    // just reported our own `start_ts` back rather than
                    // the slot's true prior version; use the version
                    // recorded when we first locked it instead.
                    let prev_version = tx.write_set.prev_version_for_index(index).unwrap_or(prev_version);
                    tx.write_set.merge(base, value, mask, index, prev_version);
                    return Ok(());
                }
                Err(TryLockError::LockedByOther(owner)) => match self.resolve(tx, owner, waits) {
                    Decision::Wait(delay) => {
                        thread::sleep(delay);
                        waits += 1;
                        continue;
                    }
                    Decision::Abort | Decision::KillOther => {
                        self.do_abort(tx, AbortCause::LockedWrite);
                        return Err(Error::conflict(tx.txn_id.0, base));
                    }
                },
                Err(TryLockError::VersionExceeded(_)) => {
                    if self.extend_snapshot(tx) {
                        continue;
                    }
                    self.do_abort(tx, AbortCause::ValidateWrite);
                    return Err(Error::validation(
                        tx.txn_id.0,
                        "snapshot extension failed acquiring a write lock",
                    ));
                }
            }
        }
    }

    /// Validate the read set, write back every buffered word, and
    /// release the locks `tx` acquired along the way (§4.2's Commit
    /// algorithm). A transaction with an empty write set takes the
    /// read-only fast path regardless of its declared attributes: there
    /// is nothing to validate against, since nothing it read can have
    /// been invalidated by its own writes.
    pub fn commit(&self, tx: &mut TransactionContext) -> Result<u64> {
        self.require_active(tx)?;

        if tx.write_set.is_empty() {
            tx.status = TransactionStatus::Committed;
            tx.read_set.clear();
            self.active_txns.remove(&tx.txn_id);
            self.stats.record_commit();
            self.hooks.on_commit(tx);
            return Ok(tx.start_ts);
        }

        tx.status = TransactionStatus::Committing;
        self.hooks.on_precommit(tx);

        let end_ts = self.clock.fetch_advance();

        // If exactly one tick elapsed between our snapshot and now, no
        // other writer could have committed in between: validation
        // would always pass, so skip it.
        if end_ts != tx.start_ts + 1 {
            for re in tx.read_set.iter() {
                match self.vlt.entry_at(re.index).read() {
                    LockState::Unlocked(v) if v <= tx.start_ts => {}
                    LockState::Locked(owner) if owner == tx.txn_id => {}
                    _ => {
                        self.do_abort(tx, AbortCause::ValidateCommit);
                        return Err(Error::validation(
                            tx.txn_id.0,
                            "read set invalidated before commit",
                        ));
                    }
                }
            }
        }

        for we in tx.write_set.iter() {
            unsafe { memory::write_word_masked(we.addr, we.value, we.mask) };
        }
        for we in tx.write_set.iter() {
            self.vlt.entry_at(we.index).unlock_with(end_ts);
        }

        tx.status = TransactionStatus::Committed;
        tx.read_set.clear();
        tx.write_set.clear();
        self.active_txns.remove(&tx.txn_id);
        self.stats.record_commit();
        self.hooks.on_commit(tx);
        Ok(end_ts)
    }

    /// Claim the engine's single irrevocable slot, blocking the caller
    /// until no other thread holds it.
    ///
    /// An irrevocable transaction is the only one running with stores
    /// pending, so its commit can skip read-set validation entirely:
    /// there is no concurrent writer left to race against. Mirrors the
    /// teacher's single `commit_locks` permit per branch, scoped here to
    /// one permit for the whole engine since irrevocability is a
    /// whole-engine property, not a per-address one.
    pub fn enter_irrevocable(&self) -> IrrevocablePermit<'_> {
        let guard = self.irrevocable.lock();
        IrrevocablePermit {
            engine: self,
            _guard: guard,
        }
    }

    /// Commit `tx` while holding an irrevocable permit: write back and
    /// release locks without revalidating the read set.
    pub fn commit_irrevocable(&self, tx: &mut TransactionContext, _permit: &IrrevocablePermit<'_>) -> Result<u64> {
        self.require_active(tx)?;
        tx.status = TransactionStatus::Committing;
        self.hooks.on_precommit(tx);

        let end_ts = self.clock.fetch_advance();
        for we in tx.write_set.iter() {
            unsafe { memory::write_word_masked(we.addr, we.value, we.mask) };
        }
        for we in tx.write_set.iter() {
            self.vlt.entry_at(we.index).unlock_with(end_ts);
        }

        tx.status = TransactionStatus::Committed;
        tx.read_set.clear();
        tx.write_set.clear();
        self.active_txns.remove(&tx.txn_id);
        self.stats.record_commit();
        self.hooks.on_commit(tx);
        Ok(end_ts)
    }
}

/// Proof that this thread holds the engine's irrevocable slot. Dropping
/// it releases the slot for the next claimant.
pub struct IrrevocablePermit<'e> {
    #[allow(dead_code)]
    engine: &'e Engine,
    _guard: parking_lot::MutexGuard<'e, ()>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wstm_core::TxIdAllocator;

    fn engine(contention_manager: ContentionManager) -> Engine {
        Engine::new(
            EngineConfig {
                vlt_size: 1024,
                hash_shift: wstm_core::WORD_ALIGN_BITS,
                contention_manager,
            },
            Box::new(NoHooks),
        )
    }

    fn descriptor(alloc: &TxIdAllocator) -> TransactionContext {
        TransactionContext::new(alloc.next())
    }

    #[test]
    fn store_then_load_sees_own_write_before_commit() {
        let e = engine(ContentionManager::Suicide);
        let alloc = TxIdAllocator::new();
        let mut tx = descriptor(&alloc);
        let cell = std::sync::atomic::AtomicU64::new(0);
        let addr = &cell as *const _ as usize;

        e.start(&mut tx, Attributes::default());
        e.store_word_masked(&mut tx, addr, 0x42, Word::MAX).unwrap();
        assert_eq!(e.load_word(&mut tx, addr).unwrap(), 0x42);
        assert_eq!(e.commit(&mut tx).unwrap(), 1);
        assert_eq!(unsafe { memory::read_word(addr) }, 0x42);
    }

    #[test]
    fn read_only_commit_takes_the_fast_path() {
        let e = engine(ContentionManager::Suicide);
        let alloc = TxIdAllocator::new();
        let mut tx = descriptor(&alloc);
        let cell = std::sync::atomic::AtomicU64::new(7);
        let addr = &cell as *const _ as usize;

        e.start(&mut tx, Attributes::read_only());
        assert_eq!(e.load_word(&mut tx, addr).unwrap(), 7);
        e.commit(&mut tx).unwrap();
        assert_eq!(e.stats().snapshot().nb_commits, 1);
    }

    #[test]
    fn store_in_read_only_transaction_is_misuse() {
        let e = engine(ContentionManager::Suicide);
        let alloc = TxIdAllocator::new();
        let mut tx = descriptor(&alloc);
        e.start(&mut tx, Attributes::read_only());
        let err = e.store_word_masked(&mut tx, 0x1000, 1, 1).unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn second_writer_aborts_under_suicide_policy() {
        let e = engine(ContentionManager::Suicide);
        let alloc = TxIdAllocator::new();
        let mut t1 = descriptor(&alloc);
        let mut t2 = descriptor(&alloc);
        let cell = std::sync::atomic::AtomicU64::new(0);
        let addr = &cell as *const _ as usize;

        e.start(&mut t1, Attributes::default());
        e.start(&mut t2, Attributes::default());
        e.store_word_masked(&mut t1, addr, 1, Word::MAX).unwrap();
        let err = e.store_word_masked(&mut t2, addr, 2, Word::MAX).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(t2.status, TransactionStatus::Aborted);
        e.commit(&mut t1).unwrap();
    }

    #[test]
    fn abort_restores_prior_version_and_unlocks() {
        let e = engine(ContentionManager::Suicide);
        let alloc = TxIdAllocator::new();
        let mut tx = descriptor(&alloc);
        let cell = std::sync::atomic::AtomicU64::new(9);
        let addr = &cell as *const _ as usize;

        e.start(&mut tx, Attributes::default());
        e.store_word_masked(&mut tx, addr, 1, Word::MAX).unwrap();
        e.abort(&mut tx);
        assert_eq!(tx.status, TransactionStatus::Aborted);
        assert_eq!(e.vlt.entry_of(addr).read(), LockState::Unlocked(0));
        assert_eq!(unsafe { memory::read_word(addr) }, 9);
    }

    #[test]
    fn abort_restores_true_version_when_two_addresses_collide_in_one_slot() {
        let e = engine(ContentionManager::Suicide);
        let alloc = TxIdAllocator::new();
        let mut tx = descriptor(&alloc);

        // Two distinct word addresses that hash to the same VLT slot.
        let addr_a = 0x1000usize;
        let addr_b = addr_a + e.vlt_len() * wstm_core::WORD_SIZE;
        assert_eq!(e.vlt.index_of(addr_a), e.vlt.index_of(addr_b));

        e.start(&mut tx, Attributes::default());
        e.store_word_masked(&mut tx, addr_a, 1, Word::MAX).unwrap();
        e.store_word_masked(&mut tx, addr_b, 2, Word::MAX).unwrap();
        e.abort(&mut tx);

        // Both entries share one slot; restoring must not leave it at
        // `start_ts` just because the second store found the slot
        // already self-locked.
        assert_eq!(e.vlt.entry_of(addr_a).read(), LockState::Unlocked(0));
    }

    #[test]
    fn commit_aborts_when_read_set_invalidated_by_another_committer() {
        let e = engine(ContentionManager::Suicide);
        let alloc = TxIdAllocator::new();
        let mut reader = descriptor(&alloc);
        let a = std::sync::atomic::AtomicU64::new(1);
        let b = std::sync::atomic::AtomicU64::new(1);
        let addr_a = &a as *const _ as usize;
        let addr_b = &b as *const _ as usize;

        e.start(&mut reader, Attributes::default());
        e.load_word(&mut reader, addr_a).unwrap();
        // Write something unrelated so the commit below isn't the
        // read-only fast path, which would skip validation entirely.
        e.store_word_masked(&mut reader, addr_b, 9, Word::MAX).unwrap();

        // A spacer commit just to put more than one tick between
        // reader's start_ts and its eventual end_ts.
        let mut spacer = descriptor(&alloc);
        let spacer_cell = std::sync::atomic::AtomicU64::new(0);
        let spacer_addr = &spacer_cell as *const _ as usize;
        e.start(&mut spacer, Attributes::default());
        e.store_word_masked(&mut spacer, spacer_addr, 1, Word::MAX).unwrap();
        e.commit(&mut spacer).unwrap();

        // Overwrite addr_a after reader took its snapshot.
        let mut writer = descriptor(&alloc);
        e.start(&mut writer, Attributes::default());
        e.store_word_masked(&mut writer, addr_a, 2, Word::MAX).unwrap();
        e.commit(&mut writer).unwrap();

        let err = e.commit(&mut reader).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(reader.status, TransactionStatus::Aborted);
    }

    #[test]
    fn irrevocable_commit_skips_validation() {
        let e = engine(ContentionManager::Suicide);
        let alloc = TxIdAllocator::new();
        let mut tx = descriptor(&alloc);
        let cell = std::sync::atomic::AtomicU64::new(0);
        let addr = &cell as *const _ as usize;

        let permit = e.enter_irrevocable();
        e.start(&mut tx, Attributes::default());
        e.store_word_masked(&mut tx, addr, 5, Word::MAX).unwrap();
        e.commit_irrevocable(&mut tx, &permit).unwrap();
        assert_eq!(unsafe { memory::read_word(addr) }, 5);
    }

    // Property tests for the §8 testable properties (P1-P6, R1-R2).
    // Addresses a property exercises must be real memory: `load_word`
    // and commit's write-back dereference them, so every property here
    // backs its address with a live `AtomicU64`, never a bare integer.
    mod proptests {
        use super::*;
        use proptest::prelude::*;
        use std::sync::atomic::AtomicU64;

        proptest! {
            // R1: a store is visible to a load of the same address within
            // the same transaction, for any value.
            #[test]
            fn r1_store_then_load_round_trips(value: Word) {
                let e = engine(ContentionManager::Suicide);
                let alloc = TxIdAllocator::new();
                let mut tx = descriptor(&alloc);
                let cell = AtomicU64::new(0);
                let addr = &cell as *const _ as usize;

                e.start(&mut tx, Attributes::default());
                e.store_word_masked(&mut tx, addr, value, Word::MAX).unwrap();
                prop_assert_eq!(e.load_word(&mut tx, addr).unwrap(), value);
            }

            // R2: masked stores to disjoint byte lanes of one word never
            // clobber each other's lanes.
            #[test]
            fn r2_adjacent_lane_stores_do_not_corrupt_each_other(a: u8, b: u8, c: u8, d: u8) {
                let e = engine(ContentionManager::Suicide);
                let alloc = TxIdAllocator::new();
                let mut tx = descriptor(&alloc);
                let cell = AtomicU64::new(0);
                let addr = &cell as *const _ as usize;

                e.start(&mut tx, Attributes::default());
                e.store_word_masked(&mut tx, addr, a as Word, 0xFF).unwrap();
                e.store_word_masked(&mut tx, addr, (b as Word) << 8, 0xFF00).unwrap();
                e.store_word_masked(&mut tx, addr, (c as Word) << 16, 0xFF_0000).unwrap();
                e.store_word_masked(&mut tx, addr, (d as Word) << 24, 0xFF00_0000).unwrap();
                e.commit(&mut tx).unwrap();

                let word = unsafe { memory::read_word(addr) };
                prop_assert_eq!(word & 0xFF, a as Word);
                prop_assert_eq!((word >> 8) & 0xFF, b as Word);
                prop_assert_eq!((word >> 16) & 0xFF, c as Word);
                prop_assert_eq!((word >> 24) & 0xFF, d as Word);
            }

            // P1: committed transactions are totally ordered by the clock;
            // a run of sequential single-writer commits to one address
            // leaves memory holding the last writer's value and hands out
            // strictly increasing commit timestamps.
            #[test]
            fn p1_sequential_commits_are_totally_ordered_by_clock(values in prop::collection::vec(any::<Word>(), 1..8)) {
                let e = engine(ContentionManager::Suicide);
                let alloc = TxIdAllocator::new();
                let cell = AtomicU64::new(0);
                let addr = &cell as *const _ as usize;

                let mut last_ts = 0u64;
                for &v in &values {
                    let mut tx = descriptor(&alloc);
                    e.start(&mut tx, Attributes::default());
                    e.store_word_masked(&mut tx, addr, v, Word::MAX).unwrap();
                    let ts = e.commit(&mut tx).unwrap();
                    prop_assert!(ts > last_ts);
                    last_ts = ts;
                }
                prop_assert_eq!(unsafe { memory::read_word(addr) }, *values.last().unwrap());
            }

            // P2: an aborted transaction's buffered writes are never
            // observed, whatever value it tried to write.
            #[test]
            fn p2_aborted_writes_are_never_visible(original: Word, attempted: Word) {
                let e = engine(ContentionManager::Suicide);
                let alloc = TxIdAllocator::new();
                let mut tx = descriptor(&alloc);
                let cell = AtomicU64::new(original);
                let addr = &cell as *const _ as usize;

                e.start(&mut tx, Attributes::default());
                e.store_word_masked(&mut tx, addr, attempted, Word::MAX).unwrap();
                e.abort(&mut tx);

                prop_assert_eq!(unsafe { memory::read_word(addr) }, original);
            }

            // P3: a reader whose snapshot is invalidated by an intervening
            // committed writer aborts rather than observing a torn view;
            // the writer (nothing contends with it) always succeeds.
            #[test]
            fn p3_overlapping_read_write_conflict_aborts_the_reader(first: Word, second: Word) {
                prop_assume!(first != second);
                let e = engine(ContentionManager::Suicide);
                let alloc = TxIdAllocator::new();
                let a = AtomicU64::new(first);
                let b = AtomicU64::new(0);
                let addr_a = &a as *const _ as usize;
                let addr_b = &b as *const _ as usize;

                let mut reader = descriptor(&alloc);
                e.start(&mut reader, Attributes::default());
                e.load_word(&mut reader, addr_a).unwrap();
                // Write something unrelated so commit isn't the read-only
                // fast path, which would skip validation entirely.
                e.store_word_masked(&mut reader, addr_b, 9, Word::MAX).unwrap();

                // A spacer commit puts more than one tick between the
                // reader's start_ts and its eventual commit attempt.
                let spacer_cell = AtomicU64::new(0);
                let spacer_addr = &spacer_cell as *const _ as usize;
                let mut spacer = descriptor(&alloc);
                e.start(&mut spacer, Attributes::default());
                e.store_word_masked(&mut spacer, spacer_addr, 1, Word::MAX).unwrap();
                e.commit(&mut spacer).unwrap();

                let mut writer = descriptor(&alloc);
                e.start(&mut writer, Attributes::default());
                e.store_word_masked(&mut writer, addr_a, second, Word::MAX).unwrap();
                e.commit(&mut writer).unwrap();

                let reader_result = e.commit(&mut reader);
                prop_assert!(reader_result.is_err());
                prop_assert_eq!(unsafe { memory::read_word(addr_a) }, second);
            }

            // P4: repeated stores to the same address within one
            // transaction coalesce; only the final value is ever buffered
            // or written back.
            #[test]
            fn p4_repeated_stores_coalesce_to_final_value(values in prop::collection::vec(any::<Word>(), 1..8)) {
                let e = engine(ContentionManager::Suicide);
                let alloc = TxIdAllocator::new();
                let mut tx = descriptor(&alloc);
                let cell = AtomicU64::new(0);
                let addr = &cell as *const _ as usize;

                e.start(&mut tx, Attributes::default());
                for &v in &values {
                    e.store_word_masked(&mut tx, addr, v, Word::MAX).unwrap();
                }
                prop_assert_eq!(tx.write_set.len(), 1);
                prop_assert_eq!(e.load_word(&mut tx, addr).unwrap(), *values.last().unwrap());
                e.commit(&mut tx).unwrap();
                prop_assert_eq!(unsafe { memory::read_word(addr) }, *values.last().unwrap());
            }

            // P5: a read-only transaction's commit touches neither the
            // global clock nor any lock entry it consulted.
            #[test]
            fn p5_read_only_transaction_touches_neither_clock_nor_vlt(n in 1usize..6) {
                let e = engine(ContentionManager::Suicide);
                let alloc = TxIdAllocator::new();
                let mut tx = descriptor(&alloc);

                let cells: Vec<AtomicU64> = (0..n).map(|i| AtomicU64::new(i as u64)).collect();
                let addrs: Vec<usize> = cells.iter().map(|c| c as *const _ as usize).collect();

                let before_clock = e.current_version();
                let before_states: Vec<_> = addrs.iter().map(|&a| e.vlt.entry_of(a).read()).collect();

                e.start(&mut tx, Attributes::read_only());
                for &addr in &addrs {
                    e.load_word(&mut tx, addr).unwrap();
                }
                e.commit(&mut tx).unwrap();

                prop_assert_eq!(e.current_version(), before_clock);
                for (i, &addr) in addrs.iter().enumerate() {
                    prop_assert_eq!(e.vlt.entry_of(addr).read(), before_states[i]);
                }
            }

            // P6: snapshot extension succeeds iff every read-set entry's
            // lock-table slot is, at the moment of extension, unlocked at
            // a version no newer than the candidate timestamp or locked
            // by this transaction itself.
            #[test]
            fn p6_extend_snapshot_matches_per_entry_criterion(
                versions in prop::collection::vec(0u64..50, 1..6),
                self_locked in prop::collection::vec(any::<bool>(), 1..6),
            ) {
                let e = engine(ContentionManager::Suicide);
                let alloc = TxIdAllocator::new();
                let mut tx = descriptor(&alloc);
                e.start(&mut tx, Attributes::default());

                let n = versions.len().min(self_locked.len());
                let mut expect_all_pass = true;
                for i in 0..n {
                    // Consecutive word addresses hash to consecutive VLT
                    // indices (hash_shift matches word granularity), so
                    // these `n` entries are guaranteed to land in `n`
                    // distinct slots for any n well under the table size.
                    let addr = 0x1_0000_0000usize + i * wstm_core::WORD_SIZE;
                    let index = e.vlt.index_of(addr);
                    if self_locked[i] {
                        e.vlt.entry_of(addr).try_lock(tx.txn_id, u64::MAX).unwrap();
                    } else {
                        e.vlt.entry_of(addr).unlock_with(versions[i]);
                        if versions[i] > e.current_version() {
                            expect_all_pass = false;
                        }
                    }
                    tx.read_set.record(addr, index, 0);
                }

                let got = e.extend_snapshot(&mut tx);
                prop_assert_eq!(got, expect_all_pass);
            }
        }
    }
}
