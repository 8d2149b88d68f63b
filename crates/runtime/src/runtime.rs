//! The public-facing runtime: process-wide `init`/`shutdown`, per-thread
//! `thread_init`/`thread_exit`, and the `atomically` closure-based retry
//! driver that the design notes call the strongly preferred restart
//! strategy.

use std::alloc::Layout;
use std::cell::RefCell;
use std::sync::Arc;

use tracing::{debug, trace, trace_span, warn};

use wstm_core::{Attributes, Result, StatsSnapshot, TxIdAllocator, Word};
use wstm_engine::{Engine, EngineConfig, EntryContext, TransactionContext};

use crate::callbacks::CallbackRegistry;
use crate::config::{AcceptingGuard, RuntimeConfig};
use crate::pool::DescriptorPool;
use crate::{memory, width};

thread_local! {
    static CURRENT: RefCell<Option<TransactionContext>> = RefCell::new(None);
}

/// The process-wide runtime: one engine, one transaction-id allocator,
/// and the registered extension modules every thread's transactions
/// run through.
///
/// Cloning shares the same underlying state (it wraps an `Arc`); the
/// usual pattern is to build one at process start and hand clones to
/// every worker thread, mirroring the teacher's `Arc<Database>`.
#[derive(Clone)]
pub struct Runtime(Arc<Inner>);

struct Inner {
    engine: Engine,
    ids: TxIdAllocator,
    config: RuntimeConfig,
    accepting: AcceptingGuard,
    registry: Arc<CallbackRegistry>,
}

impl Runtime {
    /// Build a runtime from `config`, registering the built-in memory
    /// module alongside any caller-supplied ones.
    pub fn init(config: RuntimeConfig, mut registry: CallbackRegistry) -> Self {
        registry.register(memory::module());
        let registry = Arc::new(registry);
        let engine = Engine::new(
            EngineConfig {
                vlt_size: config.vlt_size,
                hash_shift: config.hash_shift,
                contention_manager: config.contention_manager,
            },
            Box::new(Arc::clone(&registry)),
        );
        debug!(vlt_size = config.vlt_size, "wstm runtime initialized");
        Runtime(Arc::new(Inner {
            engine,
            ids: TxIdAllocator::new(),
            config,
            accepting: AcceptingGuard::new(),
            registry,
        }))
    }

    /// Build a runtime with default tuning and no caller-supplied
    /// modules beyond the built-in memory module.
    pub fn with_defaults() -> Self {
        Runtime::init(RuntimeConfig::default(), CallbackRegistry::new())
    }

    /// Shut the runtime down: resets the clock and lock table.
    ///
    /// Only valid once every thread has called `thread_exit` and no
    /// transaction is in flight; the engine does not itself track
    /// thread liveness, so this is advisory on the caller's part, the
    /// way the teacher's `accepting_transactions` flag only stops new
    /// work rather than waiting out what is already running.
    pub fn shutdown(&self) {
        debug!("wstm runtime shutting down");
        self.0.engine.reset();
    }

    fn engine(&self) -> &Engine {
        &self.0.engine
    }

    /// Register this OS thread with the runtime: allocates a descriptor
    /// (recycled from this thread's pool if one is parked there) and
    /// fires every module's `on_thread_init` hook.
    pub fn thread_init(&self) {
        let txn_id = self.0.ids.next();
        let ctx = DescriptorPool::acquire(txn_id, self.0.config.read_set_capacity, self.0.config.write_set_capacity);
        CURRENT.with(|c| *c.borrow_mut() = Some(ctx));
        self.0.registry.fire_thread_init();
        trace!(%txn_id, "thread_init");
    }

    /// Unregister this OS thread: fires `on_thread_exit`, then parks the
    /// descriptor back in this thread's pool.
    pub fn thread_exit(&self) {
        self.0.registry.fire_thread_exit();
        if let Some(ctx) = CURRENT.with(|c| c.borrow_mut().take()) {
            trace!(txn_id = %ctx.txn_id, "thread_exit");
            DescriptorPool::release(ctx);
        }
    }

    fn with_current<R>(&self, f: impl FnOnce(&mut TransactionContext) -> R) -> R {
        CURRENT.with(|c| {
            let mut borrow = c.borrow_mut();
            let ctx = borrow
                .as_mut()
                .expect("thread_init must be called before starting a transaction");
            f(ctx)
        })
    }

    /// Begin a new attempt on this thread's descriptor.
    pub fn start(&self, attrs: Attributes) -> EntryContext {
        self.0.accepting.latch();
        self.with_current(|ctx| self.engine().start(ctx, attrs))
    }

    /// Transactional word load.
    pub fn load_word(&self, addr: usize) -> Result<Word> {
        self.with_current(|ctx| self.engine().load_word(ctx, addr))
    }

    /// Transactional masked word store.
    pub fn store_word_masked(&self, addr: usize, value: Word, mask: Word) -> Result<()> {
        self.with_current(|ctx| self.engine().store_word_masked(ctx, addr, value, mask))
    }

    /// Transactional typed load, per §4.3's width wrappers.
    pub fn load<T: width::Scalar>(&self, addr: usize) -> Result<T> {
        self.with_current(|ctx| width::load(self.engine(), ctx, addr))
    }

    /// Transactional typed store, per §4.3's width wrappers.
    pub fn store<T: width::Scalar>(&self, addr: usize, value: T) -> Result<()> {
        self.with_current(|ctx| width::store(self.engine(), ctx, addr, value))
    }

    /// Transactional bulk byte-region read.
    pub fn load_bytes(&self, addr: usize, buf: &mut [u8]) -> Result<()> {
        self.with_current(|ctx| width::load_bytes(self.engine(), ctx, addr, buf))
    }

    /// Transactional bulk byte-region write.
    pub fn store_bytes(&self, addr: usize, data: &[u8]) -> Result<()> {
        self.with_current(|ctx| width::store_bytes(self.engine(), ctx, addr, data))
    }

    /// Transactional allocation, freed automatically if the current
    /// transaction aborts.
    ///
    /// # Safety
    /// See [`memory::tx_alloc`].
    pub unsafe fn tx_alloc(&self, layout: Layout) -> *mut u8 {
        memory::tx_alloc(layout)
    }

    /// Defer `ptr`'s deallocation to the current transaction's commit.
    ///
    /// # Safety
    /// See [`memory::tx_free`].
    pub unsafe fn tx_free(&self, ptr: *mut u8, layout: Layout) {
        memory::tx_free(ptr, layout)
    }

    /// Commit the current transaction.
    pub fn commit(&self) -> Result<u64> {
        self.with_current(|ctx| self.engine().commit(ctx))
    }

    /// Claim the engine's single irrevocable-mode slot, blocking until
    /// whatever transaction currently holds it releases it.
    ///
    /// Returns a misuse error if `RuntimeConfig::irrevocable_enabled` is
    /// `false`.
    pub fn enter_irrevocable(&self) -> Result<wstm_engine::IrrevocablePermit<'_>> {
        if !self.0.config.irrevocable_enabled {
            return Err(wstm_core::Error::misuse("irrevocable mode is disabled for this runtime"));
        }
        Ok(self.engine().enter_irrevocable())
    }

    /// Commit the current transaction while holding an irrevocable
    /// permit, skipping read-set validation entirely.
    pub fn commit_irrevocable(&self, permit: &wstm_engine::IrrevocablePermit<'_>) -> Result<u64> {
        self.with_current(|ctx| self.engine().commit_irrevocable(ctx, permit))
    }

    /// Abort the current transaction explicitly.
    pub fn abort(&self) {
        self.with_current(|ctx| self.engine().abort(ctx))
    }

    /// A named observability counter, as exposed by §6's `get_stats`.
    pub fn get_stats(&self, name: &str) -> Option<u64> {
        self.engine().stats().get(name)
    }

    /// A typed snapshot of every counter.
    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.engine().stats().snapshot()
    }

    /// Run `body` to completion, retrying on a retryable abort until it
    /// commits, `attrs.no_retry` is set, or `max_attempts` is exhausted.
    ///
    /// This is the closure-based restart strategy the design notes call
    /// strongly preferred: `body` is re-invoked from scratch on each
    /// attempt rather than resumed via any captured machine state.
    pub fn atomically<T>(&self, attrs: Attributes, mut body: impl FnMut() -> Result<T>) -> Result<T> {
        let span = trace_span!("stm_transaction");
        let _enter = span.enter();
        let mut attempt = 0u64;
        loop {
            attempt += 1;
            self.start(attrs);
            match body() {
                Ok(value) => match self.commit() {
                    Ok(_) => return Ok(value),
                    Err(e) if e.is_retryable() && !attrs.no_retry && attempt < self.0.config.max_attempts => {
                        trace!(attempt, "commit validation failed, retrying");
                        continue;
                    }
                    Err(e) => return Err(e),
                },
                Err(e) if e.is_retryable() && !attrs.no_retry && attempt < self.0.config.max_attempts => {
                    warn!(attempt, %e, "transaction aborted, retrying");
                    continue;
                }
                Err(e) => {
                    self.abort();
                    return Err(e);
                }
            }
        }
    }
}
