//! Core type definitions for the geomesh boundary layer.
//!
//! This crate defines the types that cross between the managed side and the
//! native engine:
//! - `Value`, the dynamically-typed payload exchanged with the cluster
//! - Stable integer indices for native sessions and sub-resource handles
//! - The fixed-width node identifier assigned by the engine at connect
//!
//! Everything engine-facing (the wire slot, drivers, dispatch) lives in
//! `geomesh-engine` and `geomesh-node`, not here.

mod ids;
mod value;

pub use ids::{HandleId, LocalId, SessionId, LOCAL_ID_LEN};
pub use value::{Value, ValueKind};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A host value with no engine representation (arrays, objects, …).
    #[error("unsupported value type: {0}")]
    UnsupportedType(String),

    /// A node identifier of the wrong width or alphabet.
    #[error("invalid node identifier: {0}")]
    InvalidId(String),
}
