//! Interface to the native geomesh engine.
//!
//! The engine itself (transport, routing, consistency, storage) is an
//! external native library; this crate owns the seam to it:
//!
//! - **`driver`**: the [`EngineDriver`] trait with the operations the engine
//!   presents, plus the [`Trampoline`] entry point it calls back through
//! - **`slot`**: the C-layout value slot shared with the engine ABI and the
//!   codec that moves [`geomesh_types::Value`] payloads in and out of it
//! - **`mock`**: an in-process engine; sessions opened on one instance
//!   behave like a tiny fully-connected cluster
//! - **`ffi`** (feature `native`): bindings to the vendor library
//!
//! Lifecycle gating, handle caching, and callback bookkeeping live one layer
//! up in `geomesh-node`.

mod driver;
mod error;
pub mod mock;
pub mod slot;

#[cfg(feature = "native")]
pub mod ffi;

pub use driver::{EngineDriver, Trampoline};
pub use error::{EngineError, EngineResult};
pub use mock::{MockConfig, MockEngine, MAP_OPT_EXCLUSIVE};
pub use slot::RawSlot;
