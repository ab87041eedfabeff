//! Public error taxonomy of the boundary layer.

use geomesh_engine::EngineError;
use thiserror::Error;

/// Result type for node, map, and pubsub operations.
pub type NodeResult<T> = Result<T, NodeError>;

/// Errors surfaced by the boundary layer.
///
/// This set is closed: every raw engine code is mapped into one of these
/// kinds before it reaches a caller. Kinds that carry a string hold a
/// human-readable detail from the engine.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Native session allocation failed.
    #[error("node initialization failed: {0}")]
    InitFailed(String),

    /// The engine could not join the cluster. The node stays `Initialized`
    /// and the call may be retried.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// The engine could not leave the cluster cleanly.
    #[error("disconnect failed: {0}")]
    DisconnectFailed(String),

    /// `quit` already ran on this node.
    #[error("node has already quit")]
    AlreadyQuit,

    /// The operation requires a connected node.
    #[error("node is not connected")]
    NotConnected,

    /// A host value with no engine representation.
    #[error("unsupported value type: {0}")]
    UnsupportedType(String),

    /// The map holds no value for the key.
    #[error("key not found")]
    KeyNotFound,

    /// The engine rejected the write under the requested options.
    #[error("set conflict: {0}")]
    SetConflict(String),

    /// The publish could not be delivered.
    #[error("publish failed: {0}")]
    PublishFailed(String),
}

impl NodeError {
    pub(crate) fn init(err: EngineError) -> Self {
        Self::InitFailed(err.to_string())
    }

    pub(crate) fn connect(err: EngineError) -> Self {
        Self::ConnectFailed(err.to_string())
    }

    pub(crate) fn disconnect(err: EngineError) -> Self {
        match err {
            EngineError::Offline => Self::NotConnected,
            other => Self::DisconnectFailed(other.to_string()),
        }
    }

    /// Handle-open and subscription failures: the only conditions the engine
    /// reports here amount to the session not being usable.
    pub(crate) fn access(err: EngineError) -> Self {
        let _ = err;
        Self::NotConnected
    }

    pub(crate) fn map_get(err: EngineError) -> Self {
        match err {
            EngineError::Offline => Self::NotConnected,
            // Anything else the engine reports for a lookup folds into the
            // operation's kind; the taxonomy stays closed.
            _ => Self::KeyNotFound,
        }
    }

    pub(crate) fn map_set(err: EngineError) -> Self {
        match err {
            EngineError::Offline => Self::NotConnected,
            other => Self::SetConflict(other.to_string()),
        }
    }

    pub(crate) fn publish(err: EngineError) -> Self {
        match err {
            EngineError::Offline => Self::NotConnected,
            other => Self::PublishFailed(other.to_string()),
        }
    }
}
