//! The callback registry: ordered extension points fired at a
//! transaction's lifecycle boundaries (§4.5).
//!
//! A module registers a [`ModuleCallbacks`] record; every hook it sets
//! runs in registration order alongside every other registered module's
//! hook for that same boundary. Registration must complete before any
//! thread starts a transaction, enforced by the same
//! [`crate::config::AcceptingGuard`] the runtime uses for tuning
//! parameters.

use std::any::Any;
use std::sync::Arc;

use wstm_engine::{LifecycleHooks, TransactionContext};

type ThreadHook = Box<dyn Fn() + Send + Sync>;
type TxHook = Box<dyn Fn(&TransactionContext) + Send + Sync>;

/// One module's set of lifecycle hooks, any of which may be absent.
#[derive(Default)]
pub struct ModuleCallbacks {
    /// Fired once when a thread calls `thread_init`.
    pub on_thread_init: Option<ThreadHook>,
    /// Fired once when a thread calls `thread_exit`.
    pub on_thread_exit: Option<ThreadHook>,
    /// Fired at the start of every transaction attempt.
    pub on_start: Option<TxHook>,
    /// Fired once a writing commit has decided to proceed past the
    /// read-only fast path, before read-set validation.
    pub on_precommit: Option<TxHook>,
    /// Fired after a transaction reaches `Committed`.
    pub on_commit: Option<TxHook>,
    /// Fired after a transaction reaches `Aborted`.
    pub on_abort: Option<TxHook>,
    /// Module-private state, opaque to the registry.
    pub user_data: Option<Box<dyn Any + Send + Sync>>,
}

impl ModuleCallbacks {
    /// An empty record with every hook absent.
    pub fn new() -> Self {
        ModuleCallbacks::default()
    }
}

/// An ordered list of registered modules, fired front-to-back at each
/// boundary.
#[derive(Default)]
pub struct CallbackRegistry {
    modules: Vec<ModuleCallbacks>,
}

impl CallbackRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        CallbackRegistry::default()
    }

    /// Append a module to the registration order.
    pub fn register(&mut self, module: ModuleCallbacks) {
        self.modules.push(module);
    }

    /// Run every registered `on_thread_init` hook, in order.
    pub fn fire_thread_init(&self) {
        for m in &self.modules {
            if let Some(f) = &m.on_thread_init {
                f();
            }
        }
    }

    /// Run every registered `on_thread_exit` hook, in order.
    pub fn fire_thread_exit(&self) {
        for m in &self.modules {
            if let Some(f) = &m.on_thread_exit {
                f();
            }
        }
    }
}

impl LifecycleHooks for CallbackRegistry {
    fn on_start(&self, tx: &TransactionContext) {
        for m in &self.modules {
            if let Some(f) = &m.on_start {
                f(tx);
            }
        }
    }

    fn on_precommit(&self, tx: &TransactionContext) {
        for m in &self.modules {
            if let Some(f) = &m.on_precommit {
                f(tx);
            }
        }
    }

    fn on_commit(&self, tx: &TransactionContext) {
        for m in &self.modules {
            if let Some(f) = &m.on_commit {
                f(tx);
            }
        }
    }

    fn on_abort(&self, tx: &TransactionContext) {
        for m in &self.modules {
            if let Some(f) = &m.on_abort {
                f(tx);
            }
        }
    }
}

/// Lets the runtime hand the engine a `Box<dyn LifecycleHooks>` wrapping
/// the same registry it keeps a shared handle to, so `Runtime` can also
/// reach `fire_thread_init`/`fire_thread_exit` (boundaries the engine
/// itself has no notion of).
impl LifecycleHooks for Arc<CallbackRegistry> {
    fn on_start(&self, tx: &TransactionContext) {
        (**self).on_start(tx)
    }

    fn on_precommit(&self, tx: &TransactionContext) {
        (**self).on_precommit(tx)
    }

    fn on_commit(&self, tx: &TransactionContext) {
        (**self).on_commit(tx)
    }

    fn on_abort(&self, tx: &TransactionContext) {
        (**self).on_abort(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use wstm_core::TxId;

    #[test]
    fn hooks_fire_in_registration_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut registry = CallbackRegistry::new();

        let o1 = Arc::clone(&order);
        registry.register(ModuleCallbacks {
            on_start: Some(Box::new(move |_| o1.lock().unwrap().push(1))),
            ..ModuleCallbacks::new()
        });
        let o2 = Arc::clone(&order);
        registry.register(ModuleCallbacks {
            on_start: Some(Box::new(move |_| o2.lock().unwrap().push(2))),
            ..ModuleCallbacks::new()
        });

        let tx = TransactionContext::new(TxId(1));
        registry.on_start(&tx);
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn thread_hooks_are_independent_of_tx_hooks() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut registry = CallbackRegistry::new();
        let c = Arc::clone(&count);
        registry.register(ModuleCallbacks {
            on_thread_init: Some(Box::new(move || {
                c.fetch_add(1, Ordering::Relaxed);
            })),
            ..ModuleCallbacks::new()
        });
        registry.fire_thread_init();
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }
}
