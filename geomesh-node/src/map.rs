//! Accessor for one replicated map.

use crate::error::{NodeError, NodeResult};
use crate::node::NodeShared;
use geomesh_engine::slot::{self, RawSlot};
use geomesh_types::{HandleId, Value};
use std::sync::Arc;

/// A named replicated key-value map.
///
/// Cheap to clone; clones share the same underlying handle. Obtained from
/// [`crate::Node::access_map`], which caches one accessor per name. Every
/// key and value marshals through the slot codec, so nothing the engine
/// sees references managed memory.
#[derive(Clone)]
pub struct Map {
    inner: Arc<MapInner>,
}

struct MapInner {
    node: Arc<NodeShared>,
    handle: HandleId,
    name: String,
}

impl Map {
    pub(crate) fn new(node: Arc<NodeShared>, handle: HandleId, name: &str) -> Self {
        Self {
            inner: Arc::new(MapInner {
                node,
                handle,
                name: name.to_string(),
            }),
        }
    }

    /// The map's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Stable identity of the underlying handle; usable as a bookkeeping
    /// key by callers.
    #[must_use]
    pub fn handle_id(&self) -> HandleId {
        self.inner.handle
    }

    /// Looks up the current value for `key`, blocking until the engine
    /// replies. The result's type is whatever was last stored.
    pub fn get(&self, key: impl Into<Value>) -> NodeResult<Value> {
        let _guard = self.inner.node.connected_guard()?;
        let key = slot::encode(&key.into());
        let mut out = RawSlot::null();
        self.inner
            .node
            .driver
            .map_get(self.inner.handle, &key, &mut out)
            .map_err(NodeError::map_get)?;
        Ok(slot::decode(&out))
    }

    /// Upserts `key` to `value`, blocking until the engine replies. The
    /// option bits are engine policy and pass through unmodified; a
    /// rejected write reports [`NodeError::SetConflict`].
    pub fn set(
        &self,
        key: impl Into<Value>,
        value: impl Into<Value>,
        options: u32,
    ) -> NodeResult<()> {
        let _guard = self.inner.node.connected_guard()?;
        let key = slot::encode(&key.into());
        let value = slot::encode(&value.into());
        self.inner
            .node
            .driver
            .map_set(self.inner.handle, &key, &value, options)
            .map_err(NodeError::map_set)
    }
}

impl std::fmt::Debug for Map {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Map")
            .field("name", &self.inner.name)
            .field("handle", &self.inner.handle)
            .finish()
    }
}
