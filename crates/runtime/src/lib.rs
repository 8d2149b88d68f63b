//! Thread-local plumbing built atop `wstm-engine`: descriptor pooling,
//! the extension-module registry, typed width wrappers, the
//! stack-escape optimization, and the public [`Runtime`] surface that
//! ties them together.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod callbacks;
pub mod config;
pub mod memory;
pub mod pool;
pub mod runtime;
pub mod stack;
pub mod width;

pub use callbacks::{CallbackRegistry, ModuleCallbacks};
pub use config::{AcceptingGuard, RuntimeConfig, RuntimeConfigBuilder};
pub use pool::DescriptorPool;
pub use runtime::Runtime;
pub use width::Scalar;
