//! The dynamic memory module (§4.4): `tx_alloc`/`tx_free` integrated with
//! commit and abort via the callback registry.
//!
//! `tx_alloc` is tracked per-thread and freed immediately if the
//! transaction aborts (the allocation never "happened" from any other
//! transaction's point of view). `tx_free` is deferred: the memory stays
//! valid until commit, since an aborted transaction must still be able
//! to use it: the actual deallocation only runs once the freeing
//! transaction has committed.

use std::alloc::{alloc, dealloc, Layout};
use std::cell::RefCell;

use wstm_engine::TransactionContext;

use crate::callbacks::ModuleCallbacks;

thread_local! {
    static PENDING_ALLOCS: RefCell<Vec<(*mut u8, Layout)>> = RefCell::new(Vec::new());
    static PENDING_FREES: RefCell<Vec<(*mut u8, Layout)>> = RefCell::new(Vec::new());
}

/// Allocate `layout` inside the current transaction.
///
/// # Safety
/// The returned pointer is valid for `layout` until the transaction
/// aborts (at which point it is deallocated automatically) or the
/// caller passes it to [`tx_free`].
pub unsafe fn tx_alloc(layout: Layout) -> *mut u8 {
    let ptr = alloc(layout);
    PENDING_ALLOCS.with(|p| p.borrow_mut().push((ptr, layout)));
    ptr
}

/// Mark `ptr` (allocated with `layout`) for deallocation once the
/// current transaction commits. If the transaction aborts instead, the
/// memory is left untouched; whatever pointed to it before the
/// transaction started may still depend on it.
///
/// # Safety
/// `ptr` must have been allocated with `layout` and must not be used
/// after the transaction that frees it commits.
pub unsafe fn tx_free(ptr: *mut u8, layout: Layout) {
    PENDING_FREES.with(|p| p.borrow_mut().push((ptr, layout)));
}

fn clear_on_start(_tx: &TransactionContext) {
    PENDING_ALLOCS.with(|p| p.borrow_mut().clear());
    PENDING_FREES.with(|p| p.borrow_mut().clear());
}

fn discard_allocs_on_commit(_tx: &TransactionContext) {
    // Allocations survive: ownership passes to whatever the committed
    // transaction's writes point at. Deferred frees run for real now.
    PENDING_FREES.with(|p| {
        for (ptr, layout) in p.borrow_mut().drain(..) {
            unsafe { dealloc(ptr, layout) };
        }
    });
    PENDING_ALLOCS.with(|p| p.borrow_mut().clear());
}

fn free_allocs_on_abort(_tx: &TransactionContext) {
    // Nothing outside this attempt can have observed these allocations;
    // deferred frees are simply dropped, leaving the memory as it was.
    PENDING_ALLOCS.with(|p| {
        for (ptr, layout) in p.borrow_mut().drain(..) {
            unsafe { dealloc(ptr, layout) };
        }
    });
    PENDING_FREES.with(|p| p.borrow_mut().clear());
}

/// Build the [`ModuleCallbacks`] record that wires `tx_alloc`/`tx_free`
/// into commit and abort. Registered once by `Runtime::init`.
pub fn module() -> ModuleCallbacks {
    ModuleCallbacks {
        on_start: Some(Box::new(clear_on_start)),
        on_commit: Some(Box::new(discard_allocs_on_commit)),
        on_abort: Some(Box::new(free_allocs_on_abort)),
        ..ModuleCallbacks::new()
    }
}
