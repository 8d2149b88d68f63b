//! Transaction descriptor, contention manager, raw memory access, and the
//! Transaction Engine algorithms that tie them to a [`wstm_vlt`] table and
//! clock.
//!
//! This crate has no notion of threads, thread-local storage, or a public
//! library surface; that belongs to `wstm-runtime`. It exposes one
//! [`Engine`](engine::Engine) type that runtime wires up per thread.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod contention;
pub mod descriptor;
pub mod engine;
pub mod memory;

pub use contention::{ContentionManager, Decision};
pub use descriptor::{
    EntryContext, ReadEntry, ReadSet, TransactionContext, TransactionStatus, WriteEntry, WriteSet,
};
pub use engine::{Engine, EngineConfig, IrrevocablePermit, LifecycleHooks, NoHooks};
