//! `wstm`: a word-granularity software transactional memory runtime.
//!
//! This crate is a thin façade over [`wstm_runtime`]: it re-exports the
//! types an application actually touches (`Runtime`, `Attributes`,
//! `Error`) and the typed load/store free functions bound to a single
//! process-wide runtime instance, the way a caller of a plain C STM
//! library would reach for `TM_START`/`TM_LOAD`/`TM_STORE` without
//! having to thread an engine handle through every call site.
//!
//! Most callers only need [`atomically`]: it starts a transaction, runs
//! the closure, and retries automatically on conflict.
//!
//! ```no_run
//! wstm::init(wstm_runtime::RuntimeConfig::default());
//! wstm::thread_init();
//!
//! static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
//! let addr = &COUNTER as *const _ as usize;
//!
//! wstm::atomically(wstm_core::Attributes::default(), || {
//!     let v: u64 = wstm::load(addr)?;
//!     wstm::store(addr, v + 1)?;
//!     Ok(())
//! }).unwrap();
//!
//! wstm::thread_exit();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::alloc::Layout;

use once_cell::sync::OnceCell;

pub use wstm_core::{Attributes, Error, Result, StatsSnapshot, Word};
pub use wstm_engine::{EntryContext, IrrevocablePermit};
pub use wstm_runtime::{CallbackRegistry, ModuleCallbacks, Runtime, RuntimeConfig, RuntimeConfigBuilder, Scalar};

static RUNTIME: OnceCell<Runtime> = OnceCell::new();

fn runtime() -> &'static Runtime {
    RUNTIME
        .get()
        .expect("wstm::init must be called before any other wstm function")
}

/// Build the process-wide runtime from `config`, registering no
/// extension modules beyond the built-in memory module.
///
/// Panics if called more than once; a process has exactly one runtime.
pub fn init(config: RuntimeConfig) {
    init_with_modules(config, CallbackRegistry::new());
}

/// Build the process-wide runtime from `config` and a registry that has
/// already had every extension module's [`ModuleCallbacks`] registered.
pub fn init_with_modules(config: RuntimeConfig, registry: CallbackRegistry) {
    RUNTIME
        .set(Runtime::init(config, registry))
        .unwrap_or_else(|_| panic!("wstm::init called more than once"));
}

/// Tear down the process-wide runtime's clock and lock table.
pub fn shutdown() {
    runtime().shutdown();
}

/// Register the calling OS thread with the runtime.
pub fn thread_init() {
    runtime().thread_init();
}

/// Unregister the calling OS thread from the runtime.
pub fn thread_exit() {
    runtime().thread_exit();
}

/// Begin a new transaction attempt on this thread.
pub fn start(attrs: Attributes) -> EntryContext {
    runtime().start(attrs)
}

/// Commit the current transaction.
pub fn commit() -> Result<u64> {
    runtime().commit()
}

/// Abort the current transaction explicitly.
pub fn abort() {
    runtime().abort()
}

/// Raw word load, bypassing the typed width wrappers.
pub fn load_word(addr: usize) -> Result<Word> {
    runtime().load_word(addr)
}

/// Raw masked word store, bypassing the typed width wrappers.
pub fn store_word_masked(addr: usize, value: Word, mask: Word) -> Result<()> {
    runtime().store_word_masked(addr, value, mask)
}

/// Typed transactional load of any [`Scalar`] type (every integer width,
/// `f32`/`f64`, `char`).
pub fn load<T: Scalar>(addr: usize) -> Result<T> {
    runtime().load(addr)
}

/// Typed transactional store of any [`Scalar`] type.
pub fn store<T: Scalar>(addr: usize, value: T) -> Result<()> {
    runtime().store(addr, value)
}

/// Transactional bulk byte-region read.
pub fn load_bytes(addr: usize, buf: &mut [u8]) -> Result<()> {
    runtime().load_bytes(addr, buf)
}

/// Transactional bulk byte-region write.
pub fn store_bytes(addr: usize, data: &[u8]) -> Result<()> {
    runtime().store_bytes(addr, data)
}

/// Allocate memory owned by the current transaction.
///
/// # Safety
/// See [`wstm_runtime::memory::tx_alloc`].
pub unsafe fn tx_alloc(layout: Layout) -> *mut u8 {
    runtime().tx_alloc(layout)
}

/// Defer `ptr`'s deallocation to the current transaction's commit.
///
/// # Safety
/// See [`wstm_runtime::memory::tx_free`].
pub unsafe fn tx_free(ptr: *mut u8, layout: Layout) {
    runtime().tx_free(ptr, layout)
}

/// Claim the engine's single irrevocable-mode slot.
pub fn enter_irrevocable() -> Result<IrrevocablePermit<'static>> {
    runtime().enter_irrevocable()
}

/// Commit the current transaction while holding an irrevocable permit.
pub fn commit_irrevocable(permit: &IrrevocablePermit<'_>) -> Result<u64> {
    runtime().commit_irrevocable(permit)
}

/// Read a named observability counter (see [`wstm_core::Stats::names`]).
pub fn get_stats(name: &str) -> Option<u64> {
    runtime().get_stats(name)
}

/// A point-in-time snapshot of every observability counter.
pub fn stats_snapshot() -> StatsSnapshot {
    runtime().stats_snapshot()
}

/// Run `body` to completion, retrying on conflict until it commits or
/// the configured attempt ceiling is reached. The recommended entry
/// point for transactional code.
pub fn atomically<T>(attrs: Attributes, body: impl FnMut() -> Result<T>) -> Result<T> {
    runtime().atomically(attrs, body)
}
