//! Managed-side adapter for the native geomesh engine.
//!
//! The engine implements the distributed protocol (routing, consistency,
//! transport); this crate owns the boundary to it: node lifecycle, handle
//! caching, value marshalling, and routing asynchronous engine deliveries
//! back into registered callbacks without races or dangling dispatch.
//!
//! # Lifecycle
//!
//! A [`Node`] wraps one engine session and moves strictly forward through
//! `Initialized → Connected → Disconnected → Quit`. Accessors ([`Map`],
//! [`Pubsub2D`]) are only obtainable while connected, and every operation on
//! them re-checks the lifecycle, so a disconnected or quit node fails calls
//! deterministically instead of touching a freed session.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use geomesh_node::{MockEngine, Node, Value};
//!
//! let engine = Arc::new(MockEngine::new());
//! let node = Node::new(engine)?;
//! node.connect("ws://seed.example:8080/mesh", "")?;
//!
//! let scores = node.access_map("scores")?;
//! scores.set("alice", 42_i64, 0)?;
//! assert_eq!(scores.get("alice")?, Value::Int(42));
//!
//! let plane = node.access_pubsub2d("presence")?;
//! plane.on("waves", |value| {
//!     println!("received {value:?}");
//! })?;
//! plane.publish("waves", 0.0, 0.0, 10.0, "hello", 0)?;
//!
//! node.quit()?;
//! # Ok::<(), geomesh_node::NodeError>(())
//! ```

mod dispatch;
mod error;
mod handles;
mod map;
mod node;
mod pubsub2d;

pub use error::{NodeError, NodeResult};
pub use map::Map;
pub use node::{Node, NodeState};
pub use pubsub2d::Pubsub2D;

// Re-exported so callers need only this crate for the common path.
pub use geomesh_engine::{EngineDriver, MockConfig, MockEngine, MAP_OPT_EXCLUSIVE};
pub use geomesh_types::{HandleId, LocalId, SessionId, Value, ValueKind, LOCAL_ID_LEN};
