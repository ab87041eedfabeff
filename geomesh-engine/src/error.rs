//! Raw engine error codes.
//!
//! These are the codes the native layer reports across the boundary. The
//! node layer maps every one of them into its public taxonomy; they never
//! appear in the public API surface.

use thiserror::Error;

/// Result type for driver operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors reported by an engine driver.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Session allocation failed.
    #[error("session allocation failed")]
    Alloc,

    /// The seed refused the connection or the link could not be established.
    #[error("connection refused: {0}")]
    ConnectRefused(String),

    /// The session is not joined to a cluster.
    #[error("session is offline")]
    Offline,

    /// No entry for the requested key.
    #[error("no entry for key")]
    NotFound,

    /// A write was rejected under the requested options.
    #[error("conflicting write: {0}")]
    Conflict(String),

    /// The publish could not be routed.
    #[error("no route for publish: {0}")]
    Unroutable(String),

    /// The session index does not resolve.
    #[error("unknown session")]
    UnknownSession,

    /// The handle index does not resolve.
    #[error("unknown handle")]
    UnknownHandle,

    /// Any other engine-internal failure.
    #[error("engine failure: {0}")]
    Internal(String),
}
