//! The Versioned Lock Table: a fixed-size, address-hashed array of
//! [`LockEntry`] values.

use crate::entry::LockEntry;
use wstm_core::WORD_ALIGN_BITS;

/// Address-hashed array of lock entries.
///
/// Collisions between two distinct words that hash to the same entry
/// cause false conflicts (one transaction's write makes the other's
/// unrelated word look busy) but never incorrectness — the table is a
/// conservative approximation of per-word locking.
pub struct VersionedLockTable {
    entries: Vec<LockEntry>,
    /// `entries.len() - 1`; `entries.len()` is always a power of two so
    /// this doubles as the hash mask.
    mask: usize,
    hash_shift: u32,
}

impl VersionedLockTable {
    /// Create a table with `size` entries. `size` must be a power of two;
    /// `hash_shift` is the number of low address bits to discard before
    /// hashing (normally [`WORD_ALIGN_BITS`], but configurable so a table
    /// can be tuned for a known access pattern).
    ///
    /// # Panics
    /// Panics if `size` is zero or not a power of two.
    pub fn new(size: usize, hash_shift: u32) -> Self {
        assert!(size.is_power_of_two(), "VLT size must be a power of two");
        let mut entries = Vec::with_capacity(size);
        entries.resize_with(size, LockEntry::new);
        VersionedLockTable {
            entries,
            mask: size - 1,
            hash_shift,
        }
    }

    /// Create a table of `size` entries using the default word-alignment
    /// hash shift.
    pub fn with_default_shift(size: usize) -> Self {
        Self::new(size, WORD_ALIGN_BITS)
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// A table never has zero entries once constructed.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Hash a word address down to its table index.
    #[inline]
    pub fn index_of(&self, addr: usize) -> usize {
        (addr >> self.hash_shift) & self.mask
    }

    /// The lock entry that arbitrates access to the word containing
    /// `addr`.
    #[inline]
    pub fn entry_of(&self, addr: usize) -> &LockEntry {
        &self.entries[self.index_of(addr)]
    }

    /// The lock entry at a previously computed table index. Used to
    /// revisit an entry recorded in a read or write set without
    /// rehashing its address.
    #[inline]
    pub fn entry_at(&self, index: usize) -> &LockEntry {
        &self.entries[index]
    }

    /// Reset every entry to `Unlocked(0)`. Called by process-level
    /// `init()`; never safe to call while any transaction is active.
    pub fn reset(&self) {
        for entry in &self.entries {
            entry.reset();
        }
    }
}
