//! The interface the native engine presents to the boundary layer.

use crate::error::EngineResult;
use crate::slot::RawSlot;
use geomesh_types::{HandleId, LocalId, SessionId};

/// Fixed entry point for asynchronous event delivery.
///
/// The engine thread that discovers a pubsub event calls this with the
/// subscribing handle's index, the channel name, and the payload slot. The
/// slot is only valid for the duration of the call; implementations must
/// decode before returning.
pub type Trampoline = fn(handle: HandleId, channel: &str, value: &RawSlot);

/// One native engine, as presented to the managed side.
///
/// Sessions and sub-resources are addressed by stable integer indices; the
/// driver resolves them through its own table, so no native address ever
/// crosses this interface. All methods block the calling thread until the
/// engine replies.
pub trait EngineDriver: Send + Sync {
    /// Allocates a session. `trampoline` becomes the dispatch entry point
    /// for every asynchronous delivery to this session.
    fn open_session(&self, trampoline: Trampoline) -> EngineResult<SessionId>;

    /// Releases a session unconditionally. Not idempotent: the caller must
    /// not release the same session twice.
    fn close_session(&self, session: SessionId) -> EngineResult<()>;

    /// Joins the cluster through the given seed URL. An empty token means
    /// no authentication.
    fn connect(&self, session: SessionId, url: &str, token: &str) -> EngineResult<()>;

    /// Leaves the cluster.
    fn disconnect(&self, session: SessionId) -> EngineResult<()>;

    /// The fixed-width identifier assigned to this session at connect.
    fn local_id(&self, session: SessionId) -> EngineResult<LocalId>;

    /// Moves the session in the 2D coordinate space and returns the
    /// coordinates the engine actually applied.
    fn set_position(&self, session: SessionId, x: f64, y: f64) -> EngineResult<(f64, f64)>;

    /// Opens the named replicated map.
    fn map_open(&self, session: SessionId, name: &str) -> EngineResult<HandleId>;

    /// Looks up `key`; on success the result is written into `out`.
    fn map_get(&self, handle: HandleId, key: &RawSlot, out: &mut RawSlot) -> EngineResult<()>;

    /// Upserts `key` to `value`. The options bits are engine policy and are
    /// passed through unmodified.
    fn map_set(
        &self,
        handle: HandleId,
        key: &RawSlot,
        value: &RawSlot,
        options: u32,
    ) -> EngineResult<()>;

    /// Opens the named pubsub plane.
    fn pubsub_open(&self, session: SessionId, name: &str) -> EngineResult<HandleId>;

    /// Delivers `value` to every subscriber of `channel` within the disc of
    /// `radius` centered at `(x, y)`.
    fn publish(
        &self,
        handle: HandleId,
        channel: &str,
        x: f64,
        y: f64,
        radius: f64,
        value: &RawSlot,
        options: u32,
    ) -> EngineResult<()>;

    /// Enables delivery of `channel` events to the owning session's
    /// trampoline.
    fn subscribe(&self, handle: HandleId, channel: &str) -> EngineResult<()>;

    /// Stops delivery for `channel`. No-op when not subscribed.
    fn unsubscribe(&self, handle: HandleId, channel: &str) -> EngineResult<()>;
}
