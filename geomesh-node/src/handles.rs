//! Per-node cache of sub-resource accessors.
//!
//! At most one logical accessor exists per `(kind, name)` for the lifetime
//! of a node: the first request opens the native handle through the driver,
//! repeats return the identical cached object. Callers may therefore use an
//! accessor's handle index for their own bookkeeping.

use crate::error::{NodeError, NodeResult};
use crate::map::Map;
use crate::node::NodeShared;
use crate::pubsub2d::Pubsub2D;
use geomesh_types::HandleId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum HandleKind {
    Map,
    Pubsub2d,
}

enum Cached {
    Map(Map),
    Pubsub2d(Pubsub2D),
}

impl Cached {
    fn handle_id(&self) -> HandleId {
        match self {
            Cached::Map(map) => map.handle_id(),
            Cached::Pubsub2d(pubsub) => pubsub.handle_id(),
        }
    }
}

pub(crate) struct HandleRegistry {
    entries: RwLock<HashMap<(HandleKind, String), Cached>>,
}

impl HandleRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn map(&self, node: &Arc<NodeShared>, name: &str) -> NodeResult<Map> {
        let key = (HandleKind::Map, name.to_string());
        if let Some(Cached::Map(map)) = self.entries.read().get(&key) {
            return Ok(map.clone());
        }
        let mut entries = self.entries.write();
        // Re-check: another thread may have opened it while we upgraded.
        if let Some(Cached::Map(map)) = entries.get(&key) {
            return Ok(map.clone());
        }
        let handle = node
            .driver
            .map_open(node.session, name)
            .map_err(NodeError::access)?;
        let map = Map::new(node.clone(), handle, name);
        entries.insert(key, Cached::Map(map.clone()));
        debug!(name, %handle, "opened replicated map");
        Ok(map)
    }

    pub(crate) fn pubsub2d(&self, node: &Arc<NodeShared>, name: &str) -> NodeResult<Pubsub2D> {
        let key = (HandleKind::Pubsub2d, name.to_string());
        if let Some(Cached::Pubsub2d(pubsub)) = self.entries.read().get(&key) {
            return Ok(pubsub.clone());
        }
        let mut entries = self.entries.write();
        if let Some(Cached::Pubsub2d(pubsub)) = entries.get(&key) {
            return Ok(pubsub.clone());
        }
        let handle = node
            .driver
            .pubsub_open(node.session, name)
            .map_err(NodeError::access)?;
        let pubsub = Pubsub2D::new(node.clone(), handle, name);
        entries.insert(key, Cached::Pubsub2d(pubsub.clone()));
        debug!(name, %handle, "opened pubsub plane");
        Ok(pubsub)
    }

    /// Empties the cache and returns the handle indices it held, so quit
    /// can purge their subscriptions before the session goes away.
    pub(crate) fn drain(&self) -> Vec<HandleId> {
        let mut entries = self.entries.write();
        let ids = entries.values().map(Cached::handle_id).collect();
        entries.clear();
        ids
    }
}
