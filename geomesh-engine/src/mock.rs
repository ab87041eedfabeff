//! An in-process engine for tests and examples.
//!
//! Sessions opened on one `MockEngine` share a replicated map namespace and
//! a pubsub space, so several nodes wired to the same instance behave like a
//! tiny fully-connected cluster. Deliveries run synchronously on the
//! publishing thread, through the same trampoline contract the real engine
//! uses.

use crate::driver::{EngineDriver, Trampoline};
use crate::error::{EngineError, EngineResult};
use crate::slot::{self, RawSlot};
use geomesh_types::{HandleId, LocalId, SessionId, Value};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Map option bit: fail when the key already holds a value.
pub const MAP_OPT_EXCLUSIVE: u32 = 0x1;

/// Failure-injection knobs.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Fail every session allocation.
    pub refuse_open: bool,
    /// Refuse every connect attempt.
    pub refuse_connect: bool,
    /// Report every publish as unroutable.
    pub unroutable_publish: bool,
}

/// Indices are allocated from one process-wide counter so that sessions and
/// handles from independent engine instances never collide as registry keys.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandleKind {
    Map,
    Pubsub,
}

struct SessionState {
    trampoline: Trampoline,
    connected: bool,
    local_id: Option<LocalId>,
    position: (f64, f64),
}

struct HandleState {
    session: SessionId,
    kind: HandleKind,
    name: String,
}

/// The in-process engine.
pub struct MockEngine {
    config: RwLock<MockConfig>,
    sessions: RwLock<HashMap<SessionId, SessionState>>,
    handles: RwLock<HashMap<HandleId, HandleState>>,
    /// map name → canonical key bytes → stored value
    maps: Mutex<HashMap<String, HashMap<Vec<u8>, Value>>>,
    /// (pubsub name, channel) → subscribed handles
    subs: Mutex<HashMap<(String, String), HashSet<HandleId>>>,
}

impl MockEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config: RwLock::new(config),
            sessions: RwLock::new(HashMap::new()),
            handles: RwLock::new(HashMap::new()),
            maps: Mutex::new(HashMap::new()),
            subs: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_refuse_open(&self, refuse: bool) {
        self.config.write().refuse_open = refuse;
    }

    pub fn set_refuse_connect(&self, refuse: bool) {
        self.config.write().refuse_connect = refuse;
    }

    pub fn set_unroutable_publish(&self, unroutable: bool) {
        self.config.write().unroutable_publish = unroutable;
    }

    fn handle_session(&self, handle: HandleId, kind: HandleKind) -> EngineResult<(SessionId, String)> {
        let handles = self.handles.read();
        let state = handles.get(&handle).ok_or(EngineError::UnknownHandle)?;
        if state.kind != kind {
            return Err(EngineError::Internal(format!(
                "handle {handle} is not a {kind:?} handle"
            )));
        }
        Ok((state.session, state.name.clone()))
    }

    fn ensure_connected(&self, session: SessionId) -> EngineResult<()> {
        let sessions = self.sessions.read();
        let state = sessions.get(&session).ok_or(EngineError::UnknownSession)?;
        if state.connected {
            Ok(())
        } else {
            Err(EngineError::Offline)
        }
    }

    fn open_handle(
        &self,
        session: SessionId,
        name: &str,
        kind: HandleKind,
    ) -> EngineResult<HandleId> {
        self.ensure_connected(session)?;
        let handle = HandleId::from_raw(next_id());
        self.handles.write().insert(
            handle,
            HandleState {
                session,
                kind,
                name: name.to_string(),
            },
        );
        Ok(handle)
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical key bytes for map storage: one tag byte plus the payload in a
/// fixed-width little-endian form, so `Int(1)` and `Double(1.0)` stay
/// distinct keys.
fn key_bytes(value: &Value) -> Vec<u8> {
    match value {
        Value::Null => vec![0],
        Value::Bool(b) => vec![1, u8::from(*b)],
        Value::Int(i) => {
            let mut buf = vec![2];
            buf.extend_from_slice(&i.to_le_bytes());
            buf
        }
        Value::Double(d) => {
            let mut buf = vec![3];
            buf.extend_from_slice(&d.to_bits().to_le_bytes());
            buf
        }
        Value::String(bytes) => {
            let mut buf = vec![4];
            buf.extend_from_slice(bytes);
            buf
        }
    }
}

fn within_disc(center: (f64, f64), point: (f64, f64), radius: f64) -> bool {
    let dx = center.0 - point.0;
    let dy = center.1 - point.1;
    (dx * dx + dy * dy).sqrt() <= radius
}

impl EngineDriver for MockEngine {
    fn open_session(&self, trampoline: Trampoline) -> EngineResult<SessionId> {
        if self.config.read().refuse_open {
            return Err(EngineError::Alloc);
        }
        let session = SessionId::from_raw(next_id());
        self.sessions.write().insert(
            session,
            SessionState {
                trampoline,
                connected: false,
                local_id: None,
                position: (0.0, 0.0),
            },
        );
        debug!(%session, "mock session opened");
        Ok(session)
    }

    fn close_session(&self, session: SessionId) -> EngineResult<()> {
        if self.sessions.write().remove(&session).is_none() {
            return Err(EngineError::UnknownSession);
        }
        let mut handles = self.handles.write();
        let dead: Vec<HandleId> = handles
            .iter()
            .filter(|(_, state)| state.session == session)
            .map(|(id, _)| *id)
            .collect();
        for id in &dead {
            handles.remove(id);
        }
        drop(handles);
        let mut subs = self.subs.lock();
        for subscribers in subs.values_mut() {
            for id in &dead {
                subscribers.remove(id);
            }
        }
        subs.retain(|_, subscribers| !subscribers.is_empty());
        debug!(%session, "mock session closed");
        Ok(())
    }

    fn connect(&self, session: SessionId, url: &str, token: &str) -> EngineResult<()> {
        if self.config.read().refuse_connect {
            return Err(EngineError::ConnectRefused("seed refused connection".into()));
        }
        if !url.contains("://") {
            return Err(EngineError::ConnectRefused(format!("bad seed url {url:?}")));
        }
        let _ = token; // any token is accepted by the mock seed
        let mut sessions = self.sessions.write();
        let state = sessions.get_mut(&session).ok_or(EngineError::UnknownSession)?;
        if state.connected {
            return Err(EngineError::Internal("session already connected".into()));
        }
        let id = LocalId::from_hex(&format!("{:032x}", next_id()))
            .expect("generated id is valid hex");
        state.connected = true;
        state.local_id = Some(id);
        Ok(())
    }

    fn disconnect(&self, session: SessionId) -> EngineResult<()> {
        let mut sessions = self.sessions.write();
        let state = sessions.get_mut(&session).ok_or(EngineError::UnknownSession)?;
        if !state.connected {
            return Err(EngineError::Offline);
        }
        state.connected = false;
        drop(sessions);

        // A parted session receives nothing further.
        let dead: Vec<HandleId> = {
            let handles = self.handles.read();
            handles
                .iter()
                .filter(|(_, h)| h.session == session)
                .map(|(id, _)| *id)
                .collect()
        };
        let mut subs = self.subs.lock();
        for subscribers in subs.values_mut() {
            for id in &dead {
                subscribers.remove(id);
            }
        }
        subs.retain(|_, subscribers| !subscribers.is_empty());
        Ok(())
    }

    fn local_id(&self, session: SessionId) -> EngineResult<LocalId> {
        let sessions = self.sessions.read();
        let state = sessions.get(&session).ok_or(EngineError::UnknownSession)?;
        state.local_id.ok_or(EngineError::Offline)
    }

    fn set_position(&self, session: SessionId, x: f64, y: f64) -> EngineResult<(f64, f64)> {
        let mut sessions = self.sessions.write();
        let state = sessions.get_mut(&session).ok_or(EngineError::UnknownSession)?;
        if !state.connected {
            return Err(EngineError::Offline);
        }
        state.position = (x, y);
        Ok((x, y))
    }

    fn map_open(&self, session: SessionId, name: &str) -> EngineResult<HandleId> {
        self.open_handle(session, name, HandleKind::Map)
    }

    fn map_get(&self, handle: HandleId, key: &RawSlot, out: &mut RawSlot) -> EngineResult<()> {
        let (session, name) = self.handle_session(handle, HandleKind::Map)?;
        self.ensure_connected(session)?;
        let key = key_bytes(&slot::decode(key));
        let maps = self.maps.lock();
        let stored = maps
            .get(&name)
            .and_then(|entries| entries.get(&key))
            .ok_or(EngineError::NotFound)?;
        *out = slot::encode(stored);
        Ok(())
    }

    fn map_set(
        &self,
        handle: HandleId,
        key: &RawSlot,
        value: &RawSlot,
        options: u32,
    ) -> EngineResult<()> {
        let (session, name) = self.handle_session(handle, HandleKind::Map)?;
        self.ensure_connected(session)?;
        let key = key_bytes(&slot::decode(key));
        let value = slot::decode(value);
        let mut maps = self.maps.lock();
        let entries = maps.entry(name).or_default();
        if options & MAP_OPT_EXCLUSIVE != 0 && entries.contains_key(&key) {
            return Err(EngineError::Conflict("key already holds a value".into()));
        }
        entries.insert(key, value);
        Ok(())
    }

    fn pubsub_open(&self, session: SessionId, name: &str) -> EngineResult<HandleId> {
        self.open_handle(session, name, HandleKind::Pubsub)
    }

    fn publish(
        &self,
        handle: HandleId,
        channel: &str,
        x: f64,
        y: f64,
        radius: f64,
        value: &RawSlot,
        options: u32,
    ) -> EngineResult<()> {
        let _ = options; // no publish options defined by the mock engine
        let (session, name) = self.handle_session(handle, HandleKind::Pubsub)?;
        self.ensure_connected(session)?;
        if self.config.read().unroutable_publish {
            return Err(EngineError::Unroutable("no peer in range".into()));
        }

        let payload = slot::decode(value);

        // Snapshot the recipients, then deliver with no engine lock held so
        // callbacks may reenter the engine.
        let recipients: Vec<(Trampoline, HandleId)> = {
            let subs = self.subs.lock();
            let Some(subscribers) = subs.get(&(name, channel.to_string())) else {
                return Ok(());
            };
            let handles = self.handles.read();
            let sessions = self.sessions.read();
            subscribers
                .iter()
                .filter_map(|sub| {
                    let state = handles.get(sub)?;
                    let owner = sessions.get(&state.session)?;
                    if owner.connected && within_disc((x, y), owner.position, radius) {
                        Some((owner.trampoline, *sub))
                    } else {
                        None
                    }
                })
                .collect()
        };

        debug!(channel, count = recipients.len(), "mock publish delivering");
        for (trampoline, sub) in recipients {
            let delivered = slot::encode(&payload);
            trampoline(sub, channel, &delivered);
        }
        Ok(())
    }

    fn subscribe(&self, handle: HandleId, channel: &str) -> EngineResult<()> {
        let (session, name) = self.handle_session(handle, HandleKind::Pubsub)?;
        self.ensure_connected(session)?;
        self.subs
            .lock()
            .entry((name, channel.to_string()))
            .or_default()
            .insert(handle);
        Ok(())
    }

    fn unsubscribe(&self, handle: HandleId, channel: &str) -> EngineResult<()> {
        let (_, name) = self.handle_session(handle, HandleKind::Pubsub)?;
        let key = (name, channel.to_string());
        let mut subs = self.subs.lock();
        if let Some(subscribers) = subs.get_mut(&key) {
            subscribers.remove(&handle);
            if subscribers.is_empty() {
                subs.remove(&key);
            }
        }
        Ok(())
    }
}
