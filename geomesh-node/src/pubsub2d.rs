//! Accessor for one geospatial pubsub plane.

use crate::dispatch;
use crate::error::{NodeError, NodeResult};
use crate::node::NodeShared;
use geomesh_engine::slot;
use geomesh_types::{HandleId, Value};
use std::sync::Arc;
use tracing::debug;

/// A named pubsub plane addressed geospatially: a publish reaches every
/// subscribed node inside a disc, not a fixed recipient list.
///
/// Cheap to clone; clones share the same underlying handle. Obtained from
/// [`crate::Node::access_pubsub2d`], which caches one accessor per name.
#[derive(Clone)]
pub struct Pubsub2D {
    inner: Arc<PubsubInner>,
}

struct PubsubInner {
    node: Arc<NodeShared>,
    handle: HandleId,
    name: String,
}

impl Pubsub2D {
    pub(crate) fn new(node: Arc<NodeShared>, handle: HandleId, name: &str) -> Self {
        Self {
            inner: Arc::new(PubsubInner {
                node,
                handle,
                name: name.to_string(),
            }),
        }
    }

    /// The plane's name.
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

    /// Delivers `value` to every node subscribed to `channel` within the
    /// disc of `radius` centered at `(x, y)`, blocking until the engine
    /// accepts the publish. Delivery order across publishes is not
    /// guaranteed.
    pub fn publish(
        &self,
        channel: &str,
        x: f64,
        y: f64,
        radius: f64,
        value: impl Into<Value>,
        options: u32,
    ) -> NodeResult<()> {
        let _guard = self.inner.node.connected_guard()?;
        let value = slot::encode(&value.into());
        self.inner
            .node
            .driver
            .publish(self.inner.handle, channel, x, y, radius, &value, options)
            .map_err(NodeError::publish)
    }

    /// Subscribes `callback` to `channel`, replacing any callback already
    /// registered for it. The callback runs synchronously on the engine's
    /// delivery thread with a decoded, owned [`Value`].
    ///
    /// Deliveries hold the dispatch lock for the duration of the callback,
    /// so a callback must not call [`Pubsub2D::on`], [`Pubsub2D::off`], or
    /// quit its own node.
    pub fn on<F>(&self, channel: &str, callback: F) -> NodeResult<()>
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        let _guard = self.inner.node.connected_guard()?;
        // Register first: once the engine enables delivery, events may
        // arrive before this call returns.
        dispatch::registry().register(self.inner.handle, channel, Arc::new(callback));
        if let Err(err) = self.inner.node.driver.subscribe(self.inner.handle, channel) {
            dispatch::registry().unregister(self.inner.handle, channel);
            return Err(NodeError::access(err));
        }
        debug!(plane = %self.inner.name, channel, "subscribed");
        Ok(())
    }

    /// Cancels the subscription for `channel`; no-op when not subscribed.
    /// Once this returns, the callback is not running and will never run
    /// again. An invocation already in progress is waited out, not
    /// interrupted.
    pub fn off(&self, channel: &str) -> NodeResult<()> {
        let _guard = self.inner.node.connected_guard()?;
        // Disable delivery at the engine first, then drop the callback under
        // the write lock so an in-flight dispatch finishes before we return.
        self.inner
            .node
            .driver
            .unsubscribe(self.inner.handle, channel)
            .map_err(NodeError::access)?;
        dispatch::registry().unregister(self.inner.handle, channel);
        debug!(plane = %self.inner.name, channel, "unsubscribed");
        Ok(())
    }
}

impl std::fmt::Debug for Pubsub2D {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pubsub2D")
            .field("name", &self.inner.name)
            .field("handle", &self.inner.handle)
            .finish()
    }
}
