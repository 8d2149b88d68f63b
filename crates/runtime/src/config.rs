//! Tuning parameters fixed at `init()` and frozen once the first
//! transaction begins.
//!
//! Mirrors the teacher's `DatabaseBuilder` fluent-configuration pattern
//! (`crates/engine/src/database/builder.rs`) and its `check_accepting`
//! pre-flight guard (`crates/engine/src/database/mod.rs`): once a runtime
//! has taken a single transaction, further attempts to change tuning
//! return a [`Misuse`](wstm_core::Error::Misuse) error instead of being
//! silently ignored or applied mid-flight.

use std::sync::atomic::{AtomicBool, Ordering};

use wstm_core::{Error, Result};
use wstm_engine::ContentionManager;

/// Every §6 tuning parameter the engine and runtime consult at `init()`.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Number of entries in the Versioned Lock Table. Must be a power of
    /// two.
    pub vlt_size: usize,
    /// Address bits discarded before hashing into the VLT.
    pub hash_shift: u32,
    /// Contention-manager policy run on every lock conflict.
    pub contention_manager: ContentionManager,
    /// Whether a thread may claim the engine's irrevocable slot.
    pub irrevocable_enabled: bool,
    /// Initial capacity reserved in each descriptor's read set.
    pub read_set_capacity: usize,
    /// Initial capacity reserved in each descriptor's write set.
    pub write_set_capacity: usize,
    /// Upper bound on `atomically`'s internal retry loop before it gives
    /// up and surfaces the last error.
    pub max_attempts: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            vlt_size: wstm_core::limits::DEFAULT_VLT_SIZE,
            hash_shift: wstm_core::WORD_ALIGN_BITS,
            contention_manager: ContentionManager::default(),
            irrevocable_enabled: true,
            read_set_capacity: wstm_core::limits::DEFAULT_READ_SET_CAPACITY,
            write_set_capacity: wstm_core::limits::DEFAULT_WRITE_SET_CAPACITY,
            max_attempts: wstm_core::limits::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Fluent builder for [`RuntimeConfig`].
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfigBuilder {
    config: RuntimeConfig,
}

impl RuntimeConfigBuilder {
    /// Start from the default configuration.
    pub fn new() -> Self {
        RuntimeConfigBuilder::default()
    }

    /// Set the VLT size. Must be a power of two; validated by the engine
    /// at construction.
    pub fn vlt_size(mut self, size: usize) -> Self {
        self.config.vlt_size = size;
        self
    }

    /// Set the address-hash shift.
    pub fn hash_shift(mut self, shift: u32) -> Self {
        self.config.hash_shift = shift;
        self
    }

    /// Select the contention-manager policy.
    pub fn contention_manager(mut self, policy: ContentionManager) -> Self {
        self.config.contention_manager = policy;
        self
    }

    /// Enable or disable irrevocable-mode transactions.
    pub fn irrevocable_enabled(mut self, enabled: bool) -> Self {
        self.config.irrevocable_enabled = enabled;
        self
    }

    /// Set the initial read-set capacity reserved per descriptor.
    pub fn read_set_capacity(mut self, capacity: usize) -> Self {
        self.config.read_set_capacity = capacity;
        self
    }

    /// Set the initial write-set capacity reserved per descriptor.
    pub fn write_set_capacity(mut self, capacity: usize) -> Self {
        self.config.write_set_capacity = capacity;
        self
    }

    /// Set the retry ceiling `atomically` honors.
    pub fn max_attempts(mut self, max_attempts: u64) -> Self {
        self.config.max_attempts = max_attempts;
        self
    }

    /// Finish building.
    pub fn build(self) -> RuntimeConfig {
        self.config
    }
}

/// Guards a [`RuntimeConfig`] against mutation after the runtime has
/// started accepting transactions.
///
/// Not part of `RuntimeConfig` itself: the config is plain data copied
/// into the engine at `init()`, while this guard lives on [`crate::Runtime`]
/// and is flipped by the first call to `start`.
#[derive(Debug, Default)]
pub struct AcceptingGuard(AtomicBool);

impl AcceptingGuard {
    /// A fresh guard, not yet latched.
    pub fn new() -> Self {
        AcceptingGuard(AtomicBool::new(false))
    }

    /// Latch the guard. Idempotent: later calls are no-ops.
    pub fn latch(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Error out if the guard has already latched; otherwise succeed.
    /// Call before applying a configuration change.
    pub fn check_not_latched(&self) -> Result<()> {
        if self.0.load(Ordering::SeqCst) {
            return Err(Error::misuse(
                "runtime configuration cannot change after the first transaction has started",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let cfg = RuntimeConfigBuilder::new()
            .vlt_size(256)
            .hash_shift(4)
            .irrevocable_enabled(false)
            .build();
        assert_eq!(cfg.vlt_size, 256);
        assert_eq!(cfg.hash_shift, 4);
        assert!(!cfg.irrevocable_enabled);
    }

    #[test]
    fn guard_rejects_changes_after_latch() {
        let guard = AcceptingGuard::new();
        guard.check_not_latched().unwrap();
        guard.latch();
        assert!(guard.check_not_latched().is_err());
    }
}
