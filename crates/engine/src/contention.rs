//! The contention manager: a pluggable policy invoked whenever a load or
//! store finds its target word locked by another transaction.
//!
//! Modeled as a closed set of policy variants plus opaque per-descriptor
//! state (the RNG seed on [`crate::descriptor::TransactionContext`])
//! rather than an object hierarchy, per the design notes' guidance that
//! the contention manager is the engine's only polymorphic surface and
//! should stay small.

use rand::rngs::SmallRng;
use rand::Rng;
use std::time::Duration;
use wstm_core::TxId;

/// What a transaction should do after finding a word locked by another
/// owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Back off for the given duration, then retry the operation that
    /// hit contention (not the whole transaction).
    Wait(Duration),
    /// Abort this transaction immediately.
    Abort,
    /// Not implemented by any policy here: would force the other owner
    /// to abort. Reserved for a future priority-inversion policy; no
    /// current policy returns it, so the engine never visits that
    /// branch today, but callers must handle it since the contract
    /// names it.
    KillOther,
}

/// A contention-manager policy.
///
/// The contract (§4.2): a policy must never introduce cyclic waiting.
/// `Suicide` trivially satisfies this by never waiting. `Backoff`
/// satisfies it because it always eventually gives up and aborts rather
/// than waiting forever. `TimestampPriority` satisfies it by only ever
/// waiting on a transaction with an older `start_ts` than the caller's;
/// a cycle of "wait on someone older" is impossible since age is a
/// total, strict order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentionManager {
    /// Abort immediately on any contention. The default policy.
    Suicide,
    /// Wait with exponentially increasing, randomly jittered backoff up
    /// to a bounded number of attempts, then abort.
    Backoff {
        /// Base delay for the first wait.
        base: Duration,
        /// Ceiling on any single wait.
        cap: Duration,
        /// How many times to wait before giving up and aborting.
        max_waits: u32,
    },
    /// Wait on transactions that started before us (older `start_ts`);
    /// abort immediately when the other owner is younger.
    TimestampPriority {
        /// Delay used for each wait while the other owner is older.
        wait: Duration,
    },
}

impl Default for ContentionManager {
    fn default() -> Self {
        ContentionManager::Suicide
    }
}

impl ContentionManager {
    /// Decide what `self_tx` (with `self_start_ts` and `waits_so_far`
    /// already spent on this operation) should do about `other_owner`
    /// (started at `other_start_ts`) holding the lock it wants.
    pub fn on_conflict(
        &self,
        self_tx: TxId,
        self_start_ts: u64,
        other_owner: TxId,
        other_start_ts: u64,
        waits_so_far: u32,
        rng_state: &mut SmallRng,
    ) -> Decision {
        debug_assert_ne!(self_tx, other_owner, "a transaction cannot conflict with itself");
        match *self {
            ContentionManager::Suicide => Decision::Abort,
            ContentionManager::Backoff {
                base,
                cap,
                max_waits,
            } => {
                if waits_so_far >= max_waits {
                    Decision::Abort
                } else {
                    Decision::Wait(jittered_backoff(base, cap, waits_so_far, rng_state))
                }
            }
            ContentionManager::TimestampPriority { wait } => {
                if other_start_ts < self_start_ts {
                    Decision::Wait(wait)
                } else {
                    Decision::Abort
                }
            }
        }
    }
}

/// Exponential backoff with up to 50% jitter, capped at `cap`.
fn jittered_backoff(base: Duration, cap: Duration, attempt: u32, rng: &mut SmallRng) -> Duration {
    let shift = attempt.min(20);
    let scaled = base.saturating_mul(1u32 << shift);
    let bounded = scaled.min(cap);
    let jitter_pct: u32 = rng.gen_range(0..50);
    bounded - (bounded / 100) * jitter_pct
}
