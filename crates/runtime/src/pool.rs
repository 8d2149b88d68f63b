//! Thread-local recycling of [`TransactionContext`] allocations.
//!
//! Grounded in the teacher's `TransactionPool`
//! (`crates/engine/src/transaction/pool.rs`): a thread that calls
//! `thread_init`/`thread_exit` repeatedly (a worker in a thread pool
//! taking on a new logical role each time) gets its descriptor's
//! read/write-set capacity back instead of reallocating it, because
//! `Vec`/`HashMap::clear()` keeps the backing allocation.

use std::cell::RefCell;

use wstm_core::TxId;
use wstm_engine::TransactionContext;

/// Descriptors parked here are a grab-bag of past thread lifetimes'
/// allocations, not state a formerly-running transaction might
/// reference: `reset` wipes identity and set contents before reuse.
pub const MAX_POOL_SIZE: usize = wstm_core::limits::MAX_POOL_SIZE;

thread_local! {
    static POOL: RefCell<Vec<TransactionContext>> = RefCell::new(Vec::with_capacity(MAX_POOL_SIZE));
}

/// Thread-local descriptor pool. All methods operate on the calling
/// thread's own pool; there is no cross-thread sharing.
pub struct DescriptorPool;

impl DescriptorPool {
    /// Take a descriptor bound to `txn_id`, reusing a recycled one's
    /// allocation if the pool has one, else allocating fresh with
    /// `read_capacity`/`write_capacity` reserved.
    pub fn acquire(txn_id: TxId, read_capacity: usize, write_capacity: usize) -> TransactionContext {
        POOL.with(|pool| match pool.borrow_mut().pop() {
            Some(mut ctx) => {
                ctx.reset(txn_id);
                ctx
            }
            None => TransactionContext::with_capacity(txn_id, read_capacity, write_capacity),
        })
    }

    /// Return a descriptor to the pool for the next `acquire` on this
    /// thread. Dropped instead if the pool is already at capacity.
    pub fn release(ctx: TransactionContext) {
        POOL.with(|pool| {
            let mut pool = pool.borrow_mut();
            if pool.len() < MAX_POOL_SIZE {
                pool.push(ctx);
            }
        });
    }

    /// Number of descriptors currently parked in this thread's pool.
    pub fn len() -> usize {
        POOL.with(|pool| pool.borrow().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_then_acquire_reuses_allocation() {
        let txn_id = TxId(1);
        let mut ctx = DescriptorPool::acquire(txn_id, 4, 4);
        ctx.write_set.merge(0x1000, 1, 1, 0, 0);
        let cap_before = ctx.write_set.len();
        DescriptorPool::release(ctx);
        assert_eq!(DescriptorPool::len(), 1);

        let ctx2 = DescriptorPool::acquire(TxId(2), 4, 4);
        assert_eq!(ctx2.txn_id, TxId(2));
        assert!(ctx2.write_set.is_empty());
        assert_eq!(cap_before, 1); // sanity on the prior transaction's state
    }

    #[test]
    fn pool_caps_at_max_size() {
        let mut parked = Vec::new();
        for i in 0..(MAX_POOL_SIZE + 3) {
            parked.push(DescriptorPool::acquire(TxId(i as u64 + 1), 1, 1));
        }
        for ctx in parked {
            DescriptorPool::release(ctx);
        }
        assert_eq!(DescriptorPool::len(), MAX_POOL_SIZE);
    }
}
