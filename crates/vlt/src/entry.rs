//! A single lock entry: an atomically observable tagged version/owner.

use std::sync::atomic::{AtomicU64, Ordering};
use wstm_core::TxId;

/// The decoded state of a [`LockEntry`] at one instant.
///
/// The tag lives in the low bit so the whole state is observable with a
/// single atomic load, per §3's Data Model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// The word is not locked; `version` is the global-clock timestamp at
    /// which it was last written.
    Unlocked(u64),
    /// A transaction currently intends to write this word.
    Locked(TxId),
}

const TAG_BIT: u64 = 1;

impl LockState {
    #[inline]
    fn encode(self) -> u64 {
        match self {
            LockState::Unlocked(version) => {
                debug_assert!(version <= (u64::MAX >> 1), "version overflowed tag bit");
                version << 1
            }
            LockState::Locked(owner) => (owner.0 << 1) | TAG_BIT,
        }
    }

    #[inline]
    fn decode(raw: u64) -> Self {
        if raw & TAG_BIT == 0 {
            LockState::Unlocked(raw >> 1)
        } else {
            LockState::Locked(TxId(raw >> 1))
        }
    }
}

/// Why a [`LockEntry::try_lock`] call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryLockError {
    /// The entry is locked by a different transaction.
    LockedByOther(TxId),
    /// The entry is unlocked, but its version is newer than the caller's
    /// `start_ts`: a concurrent writer committed since the caller's
    /// snapshot was taken.
    VersionExceeded(u64),
}

/// One entry of the Versioned Lock Table: a single machine word holding
/// either an unlocked version or a locked owner, as a single `AtomicU64`.
#[derive(Debug)]
pub struct LockEntry(AtomicU64);

impl LockEntry {
    /// Create an entry in the unlocked state at version 0.
    pub fn new() -> Self {
        LockEntry(AtomicU64::new(LockState::Unlocked(0).encode()))
    }

    /// Acquire-load the current state.
    #[inline]
    pub fn read(&self) -> LockState {
        LockState::decode(self.0.load(Ordering::Acquire))
    }

    /// Reset to `Unlocked(0)`, used by process-level `init()`.
    pub fn reset(&self) {
        self.0
            .store(LockState::Unlocked(0).encode(), Ordering::Relaxed);
    }

    /// Attempt to acquire the entry for `owner`.
    ///
    /// Succeeds only if the entry is currently `Unlocked(v)` with
    /// `v <= max_version` (the caller's `start_ts`), CASing it to
    /// `Locked(owner)`. Returns the previous version on success so the
    /// caller can restore it on abort.
    pub fn try_lock(&self, owner: TxId, max_version: u64) -> Result<u64, TryLockError> {
        loop {
            let current = self.0.load(Ordering::Acquire);
            match LockState::decode(current) {
                LockState::Locked(other) if other == owner => {
                    // Already held by us (re-entrant store to the same
                    // address within one transaction), nothing to do.
                    return Ok(max_version);
                }
                LockState::Locked(other) => return Err(TryLockError::LockedByOther(other)),
                LockState::Unlocked(version) => {
                    if version > max_version {
                        return Err(TryLockError::VersionExceeded(version));
                    }
                    let new = LockState::Locked(owner).encode();
                    if self
                        .0
                        .compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        return Ok(version);
                    }
                    // Lost the race to a concurrent locker; retry the read.
                }
            }
        }
    }

    /// Release a held lock, publishing `new_version` with release
    /// semantics. Used on commit.
    pub fn unlock_with(&self, new_version: u64) {
        self.0
            .store(LockState::Unlocked(new_version).encode(), Ordering::Release);
    }

    /// Release a held lock, restoring the version observed before it was
    /// acquired. Used on abort.
    pub fn unlock_restore(&self, old_version: u64) {
        self.unlock_with(old_version);
    }
}

impl Default for LockEntry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_entry_is_unlocked_at_zero() {
        let e = LockEntry::new();
        assert_eq!(e.read(), LockState::Unlocked(0));
    }

    #[test]
    fn try_lock_succeeds_within_bound_and_blocks_others() {
        let e = LockEntry::new();
        let t1 = TxId(1);
        let t2 = TxId(2);
        assert_eq!(e.try_lock(t1, 0), Ok(0));
        assert_eq!(e.read(), LockState::Locked(t1));
        assert_eq!(e.try_lock(t2, 0), Err(TryLockError::LockedByOther(t1)));
    }

    #[test]
    fn try_lock_rejects_stale_snapshot() {
        let e = LockEntry::new();
        e.unlock_with(5);
        let t1 = TxId(1);
        assert_eq!(e.try_lock(t1, 4), Err(TryLockError::VersionExceeded(5)));
        // Unchanged: still unlocked at 5.
        assert_eq!(e.read(), LockState::Unlocked(5));
    }

    #[test]
    fn try_lock_is_idempotent_for_the_same_owner() {
        let e = LockEntry::new();
        let t1 = TxId(1);
        assert_eq!(e.try_lock(t1, 0), Ok(0));
        assert_eq!(e.try_lock(t1, 0), Ok(0));
        assert_eq!(e.read(), LockState::Locked(t1));
    }

    #[test]
    fn unlock_restore_reverts_to_prior_version() {
        let e = LockEntry::new();
        let t1 = TxId(1);
        let prev = e.try_lock(t1, 0).unwrap();
        e.unlock_restore(prev);
        assert_eq!(e.read(), LockState::Unlocked(0));
    }

    #[test]
    fn unlock_with_publishes_new_version() {
        let e = LockEntry::new();
        let t1 = TxId(1);
        e.try_lock(t1, 0).unwrap();
        e.unlock_with(42);
        assert_eq!(e.read(), LockState::Unlocked(42));
    }
}
