//! Node lifecycle state machine.

use crate::dispatch;
use crate::error::{NodeError, NodeResult};
use crate::handles::HandleRegistry;
use crate::map::Map;
use crate::pubsub2d::Pubsub2D;
use geomesh_engine::EngineDriver;
use geomesh_types::{LocalId, SessionId};
use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lifecycle states of a [`Node`].
///
/// Transitions run strictly forward: `Uninitialized → Initialized →
/// Connected → Disconnected → Quit`, with `quit` reachable from any
/// non-`Quit` state. Reconnecting a disconnected node is not supported by
/// the engine and fails fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// No native session yet (only observable mid-construction).
    Uninitialized,
    /// Session allocated, not joined to a cluster.
    Initialized,
    /// Joined to a cluster; accessors are usable.
    Connected,
    /// Left the cluster; accessors created earlier are dead.
    Disconnected,
    /// Session released; every derived resource is invalid.
    Quit,
}

/// State shared between a node and the accessors derived from it.
///
/// The `state` lock doubles as the node-wide operation guard: accessor
/// operations hold the read side for the whole blocking engine round-trip,
/// lifecycle transitions take the write side. `quit` therefore cannot
/// release the session under a call that is still crossing the boundary.
pub(crate) struct NodeShared {
    pub(crate) driver: Arc<dyn EngineDriver>,
    pub(crate) session: SessionId,
    pub(crate) state: RwLock<NodeState>,
}

impl NodeShared {
    /// Acquires the operation guard, failing unless the node is connected.
    pub(crate) fn connected_guard(&self) -> NodeResult<RwLockReadGuard<'_, NodeState>> {
        let guard = self.state.read();
        if *guard == NodeState::Connected {
            Ok(guard)
        } else {
            Err(NodeError::NotConnected)
        }
    }
}

/// One participant in the distributed mesh, wrapping one native session.
///
/// A node is `Send + Sync`; accessors obtained from it are cheap clones
/// that stay valid until the node disconnects or quits.
pub struct Node {
    shared: Arc<NodeShared>,
    handles: HandleRegistry,
}

impl Node {
    /// Allocates a native session and returns a node in `Initialized`.
    pub fn new(driver: Arc<dyn EngineDriver>) -> NodeResult<Self> {
        let session = driver
            .open_session(dispatch::trampoline)
            .map_err(NodeError::init)?;
        debug!(%session, "node session allocated");
        Ok(Self {
            shared: Arc::new(NodeShared {
                driver,
                session,
                state: RwLock::new(NodeState::Initialized),
            }),
            handles: HandleRegistry::new(),
        })
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> NodeState {
        *self.shared.state.read()
    }

    /// The session index this node wraps.
    #[must_use]
    pub fn session(&self) -> SessionId {
        self.shared.session
    }

    /// Joins the cluster through the given seed URL, blocking until the
    /// engine reports the outcome. An empty token means no authentication.
    ///
    /// On failure the node stays `Initialized` and the call may be retried.
    pub fn connect(&self, url: &str, token: &str) -> NodeResult<()> {
        let mut state = self.shared.state.write();
        match *state {
            NodeState::Initialized => {}
            NodeState::Quit => return Err(NodeError::AlreadyQuit),
            NodeState::Connected => {
                return Err(NodeError::ConnectFailed("already connected".into()));
            }
            NodeState::Disconnected => {
                return Err(NodeError::ConnectFailed(
                    "reconnect after disconnect is not supported".into(),
                ));
            }
            NodeState::Uninitialized => {
                return Err(NodeError::ConnectFailed("session not initialized".into()));
            }
        }
        self.shared
            .driver
            .connect(self.shared.session, url, token)
            .map_err(NodeError::connect)?;
        *state = NodeState::Connected;
        info!(session = %self.shared.session, url, "node connected");
        Ok(())
    }

    /// Leaves the cluster, blocking until acknowledged. Accessors created
    /// before this point become unusable.
    pub fn disconnect(&self) -> NodeResult<()> {
        let mut state = self.shared.state.write();
        match *state {
            NodeState::Connected => {}
            NodeState::Quit => return Err(NodeError::AlreadyQuit),
            _ => return Err(NodeError::NotConnected),
        }
        self.shared
            .driver
            .disconnect(self.shared.session)
            .map_err(NodeError::disconnect)?;
        *state = NodeState::Disconnected;
        info!(session = %self.shared.session, "node disconnected");
        Ok(())
    }

    /// Releases the native session and invalidates every handle and
    /// callback derived from this node. A second call reports
    /// [`NodeError::AlreadyQuit`].
    pub fn quit(&self) -> NodeResult<()> {
        // The write guard waits out in-flight blocking operations; the
        // registry purge below waits out in-flight deliveries. Only then is
        // the session released.
        let mut state = self.shared.state.write();
        if *state == NodeState::Quit {
            return Err(NodeError::AlreadyQuit);
        }
        let owned = self.handles.drain();
        dispatch::registry().purge_handles(&owned);
        *state = NodeState::Quit;
        if let Err(err) = self.shared.driver.close_session(self.shared.session) {
            // The node is terminal either way; the session cannot be retried.
            warn!(session = %self.shared.session, %err, "engine session close reported failure");
        }
        info!(session = %self.shared.session, "node quit");
        Ok(())
    }

    /// The fixed-width identifier the engine assigned at connect. Only
    /// valid while connected.
    pub fn local_id(&self) -> NodeResult<LocalId> {
        let _guard = self.shared.connected_guard()?;
        self.shared
            .driver
            .local_id(self.shared.session)
            .map_err(NodeError::access)
    }

    /// Moves this node in the 2D coordinate space and returns the
    /// coordinates the engine applied.
    pub fn set_position(&self, x: f64, y: f64) -> NodeResult<(f64, f64)> {
        let _guard = self.shared.connected_guard()?;
        self.shared
            .driver
            .set_position(self.shared.session, x, y)
            .map_err(NodeError::access)
    }

    /// Returns the accessor for the named replicated map, opening it on
    /// first use. Repeated calls with the same name return the identical
    /// cached accessor.
    pub fn access_map(&self, name: &str) -> NodeResult<Map> {
        let _guard = self.shared.connected_guard()?;
        self.handles.map(&self.shared, name)
    }

    /// Returns the accessor for the named pubsub plane, opening it on
    /// first use. Repeated calls with the same name return the identical
    /// cached accessor.
    pub fn access_pubsub2d(&self, name: &str) -> NodeResult<Pubsub2D> {
        let _guard = self.shared.connected_guard()?;
        self.handles.pubsub2d(&self.shared, name)
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("session", &self.shared.session)
            .field("state", &self.state())
            .finish()
    }
}
