//! Native-to-managed callback dispatch.
//!
//! A process-wide registry maps subscription identities to managed
//! callbacks. Engine delivery threads enter through [`trampoline`], which
//! decodes the payload and invokes the callback while holding the
//! registry's read lock; unregistration takes the write lock. That pairing
//! is the whole race story: once `off` (or a node's quit) has returned, the
//! callback can no longer be running and will never run again.

use geomesh_engine::slot::{self, RawSlot};
use geomesh_types::{HandleId, Value};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub(crate) type Callback = Arc<dyn Fn(Value) + Send + Sync>;

/// Process-wide subscription table.
pub(crate) struct CallbackRegistry {
    entries: RwLock<HashMap<(HandleId, String), Callback>>,
}

static REGISTRY: OnceCell<CallbackRegistry> = OnceCell::new();

/// The singleton registry, created on first use.
pub(crate) fn registry() -> &'static CallbackRegistry {
    REGISTRY.get_or_init(|| CallbackRegistry {
        entries: RwLock::new(HashMap::new()),
    })
}

impl CallbackRegistry {
    /// Stores a callback, replacing any previous entry for the same
    /// subscription.
    pub(crate) fn register(&self, handle: HandleId, channel: &str, callback: Callback) {
        self.entries
            .write()
            .insert((handle, channel.to_string()), callback);
    }

    /// Removes one subscription. No-op when absent. Blocks until any
    /// in-flight dispatch has released the read side.
    pub(crate) fn unregister(&self, handle: HandleId, channel: &str) {
        self.entries.write().remove(&(handle, channel.to_string()));
    }

    /// Removes every subscription owned by the given handles. Taking the
    /// write lock here is what keeps a node's quit from releasing the
    /// session while a delivery is mid-flight.
    pub(crate) fn purge_handles(&self, handles: &[HandleId]) {
        self.entries
            .write()
            .retain(|(handle, _), _| !handles.contains(handle));
    }

    /// Looks up the subscription and invokes its callback under the read
    /// lock. Unmatched deliveries are dropped silently: the subscription
    /// may have been removed, or its node already quit.
    pub(crate) fn dispatch(&self, handle: HandleId, channel: &str, value: Value) {
        let entries = self.entries.read();
        match entries.get(&(handle, channel.to_string())) {
            Some(callback) => callback(value),
            None => debug!(%handle, channel, "dropping delivery with no subscriber"),
        }
    }
}

/// Fixed entry point handed to the engine at session open.
pub(crate) fn trampoline(handle: HandleId, channel: &str, value: &RawSlot) {
    let value = slot::decode(value);
    registry().dispatch(handle, channel, value);
}
