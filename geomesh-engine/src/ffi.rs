//! Bindings to the vendor engine library.
//!
//! The `sys` module declares the engine's C API; [`NativeDriver`] implements
//! [`EngineDriver`] over it. Native addresses never leave this module: every
//! session and handle is assigned a stable index at creation and resolved
//! through the arena under the driver's lock.
//!
//! Linking requires `libgeomesh_engine`; the `native` feature is therefore
//! off by default.

use crate::driver::{EngineDriver, Trampoline};
use crate::error::{EngineError, EngineResult};
use crate::slot::{self, RawSlot};
use geomesh_types::{HandleId, LocalId, SessionId, LOCAL_ID_LEN};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::ffi::{c_char, c_int, c_void};
use std::sync::atomic::{AtomicU64, Ordering};

/// Raw C API of the engine, as declared by its public header.
pub mod sys {
    #![allow(non_camel_case_types)]

    use super::{c_char, c_int, c_void, RawSlot};

    /// Opaque engine session.
    #[repr(C)]
    pub struct gm_session_t {
        _private: [u8; 0],
    }

    /// Opaque replicated map.
    #[repr(C)]
    pub struct gm_map_t {
        _private: [u8; 0],
    }

    /// Opaque pubsub plane.
    #[repr(C)]
    pub struct gm_pubsub2d_t {
        _private: [u8; 0],
    }

    /// Delivery callback installed with [`gm_pubsub2d_on`].
    pub type gm_pubsub_cb = unsafe extern "C" fn(
        ctx: *mut c_void,
        channel: *const c_char,
        channel_len: usize,
        value: *const RawSlot,
    );

    pub const GM_OK: c_int = 0;
    pub const GM_ERR_ALLOC: c_int = 1;
    pub const GM_ERR_REFUSED: c_int = 2;
    pub const GM_ERR_OFFLINE: c_int = 3;
    pub const GM_ERR_NOT_FOUND: c_int = 4;
    pub const GM_ERR_CONFLICT: c_int = 5;
    pub const GM_ERR_UNROUTABLE: c_int = 6;

    #[link(name = "geomesh_engine")]
    unsafe extern "C" {
        pub unsafe fn gm_session_open() -> *mut gm_session_t;
        pub unsafe fn gm_session_close(session: *mut gm_session_t) -> c_int;
        pub unsafe fn gm_connect(
            session: *mut gm_session_t,
            url: *const c_char,
            url_len: usize,
            token: *const c_char,
            token_len: usize,
        ) -> c_int;
        pub unsafe fn gm_disconnect(session: *mut gm_session_t) -> c_int;
        pub unsafe fn gm_local_id(session: *mut gm_session_t, out: *mut c_char) -> c_int;
        pub unsafe fn gm_set_position(
            session: *mut gm_session_t,
            x: *mut f64,
            y: *mut f64,
        ) -> c_int;
        pub unsafe fn gm_map_open(
            session: *mut gm_session_t,
            name: *const c_char,
            name_len: usize,
        ) -> *mut gm_map_t;
        pub unsafe fn gm_map_get(
            map: *mut gm_map_t,
            key: *const RawSlot,
            out: *mut RawSlot,
        ) -> c_int;
        pub unsafe fn gm_map_set(
            map: *mut gm_map_t,
            key: *const RawSlot,
            value: *const RawSlot,
            options: u32,
        ) -> c_int;
        pub unsafe fn gm_pubsub2d_open(
            session: *mut gm_session_t,
            name: *const c_char,
            name_len: usize,
        ) -> *mut gm_pubsub2d_t;
        pub unsafe fn gm_pubsub2d_publish(
            pubsub: *mut gm_pubsub2d_t,
            channel: *const c_char,
            channel_len: usize,
            x: f64,
            y: f64,
            radius: f64,
            value: *const RawSlot,
            options: u32,
        ) -> c_int;
        pub unsafe fn gm_pubsub2d_on(
            pubsub: *mut gm_pubsub2d_t,
            channel: *const c_char,
            channel_len: usize,
            ctx: *mut c_void,
            callback: gm_pubsub_cb,
        ) -> c_int;
        pub unsafe fn gm_pubsub2d_off(
            pubsub: *mut gm_pubsub2d_t,
            channel: *const c_char,
            channel_len: usize,
        ) -> c_int;
        /// Frees a slot the engine filled and resets its tag to null.
        pub unsafe fn gm_value_free(value: *mut RawSlot);
    }
}

fn check(code: c_int) -> EngineResult<()> {
    match code {
        sys::GM_OK => Ok(()),
        sys::GM_ERR_ALLOC => Err(EngineError::Alloc),
        sys::GM_ERR_REFUSED => Err(EngineError::ConnectRefused("engine refused".into())),
        sys::GM_ERR_OFFLINE => Err(EngineError::Offline),
        sys::GM_ERR_NOT_FOUND => Err(EngineError::NotFound),
        sys::GM_ERR_CONFLICT => Err(EngineError::Conflict("engine rejected write".into())),
        sys::GM_ERR_UNROUTABLE => Err(EngineError::Unroutable("engine reported no route".into())),
        other => Err(EngineError::Internal(format!("engine code {other}"))),
    }
}

static NEXT_INDEX: AtomicU64 = AtomicU64::new(1);

fn next_index() -> u64 {
    NEXT_INDEX.fetch_add(1, Ordering::Relaxed)
}

struct SessionEntry {
    ptr: *mut sys::gm_session_t,
    trampoline: Trampoline,
}

enum HandlePtr {
    Map(*mut sys::gm_map_t),
    Pubsub(*mut sys::gm_pubsub2d_t),
}

struct HandleEntry {
    ptr: HandlePtr,
    session: SessionId,
}

/// Context handed to the engine with each subscription; reclaimed on
/// unsubscribe or session close.
struct DispatchCtx {
    handle: HandleId,
    trampoline: Trampoline,
}

#[derive(Default)]
struct Arena {
    sessions: HashMap<SessionId, SessionEntry>,
    handles: HashMap<HandleId, HandleEntry>,
    contexts: HashMap<(HandleId, String), *mut DispatchCtx>,
}

/// [`EngineDriver`] over the vendor library.
pub struct NativeDriver {
    arena: RwLock<Arena>,
}

// The engine's C API is documented thread-safe; the raw pointers stored in
// the arena are only ever dereferenced through that API.
unsafe impl Send for NativeDriver {}
unsafe impl Sync for NativeDriver {}

/// Entry point the engine invokes on its delivery thread.
unsafe extern "C" fn dispatch_entry(
    ctx: *mut c_void,
    channel: *const c_char,
    channel_len: usize,
    value: *const RawSlot,
) {
    if ctx.is_null() || value.is_null() {
        return;
    }
    let ctx = unsafe { &*(ctx as *const DispatchCtx) };
    let channel = if channel.is_null() || channel_len == 0 {
        String::new()
    } else {
        let bytes = unsafe { std::slice::from_raw_parts(channel as *const u8, channel_len) };
        String::from_utf8_lossy(bytes).into_owned()
    };
    let slot = unsafe { &*value };
    (ctx.trampoline)(ctx.handle, &channel, slot);
}

impl NativeDriver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            arena: RwLock::new(Arena::default()),
        }
    }

    fn session_ptr(&self, session: SessionId) -> EngineResult<*mut sys::gm_session_t> {
        let arena = self.arena.read();
        arena
            .sessions
            .get(&session)
            .map(|entry| entry.ptr)
            .ok_or(EngineError::UnknownSession)
    }

    fn map_ptr(&self, handle: HandleId) -> EngineResult<*mut sys::gm_map_t> {
        let arena = self.arena.read();
        match arena.handles.get(&handle).map(|entry| &entry.ptr) {
            Some(HandlePtr::Map(ptr)) => Ok(*ptr),
            _ => Err(EngineError::UnknownHandle),
        }
    }

    fn pubsub_ptr(&self, handle: HandleId) -> EngineResult<*mut sys::gm_pubsub2d_t> {
        let arena = self.arena.read();
        match arena.handles.get(&handle).map(|entry| &entry.ptr) {
            Some(HandlePtr::Pubsub(ptr)) => Ok(*ptr),
            _ => Err(EngineError::UnknownHandle),
        }
    }
}

impl Default for NativeDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineDriver for NativeDriver {
    fn open_session(&self, trampoline: Trampoline) -> EngineResult<SessionId> {
        let ptr = unsafe { sys::gm_session_open() };
        if ptr.is_null() {
            return Err(EngineError::Alloc);
        }
        let session = SessionId::from_raw(next_index());
        self.arena
            .write()
            .sessions
            .insert(session, SessionEntry { ptr, trampoline });
        Ok(session)
    }

    fn close_session(&self, session: SessionId) -> EngineResult<()> {
        let mut arena = self.arena.write();
        let entry = arena
            .sessions
            .remove(&session)
            .ok_or(EngineError::UnknownSession)?;
        let dead: Vec<HandleId> = arena
            .handles
            .iter()
            .filter(|(_, h)| h.session == session)
            .map(|(id, _)| *id)
            .collect();
        for id in &dead {
            arena.handles.remove(id);
        }
        let stale: Vec<(HandleId, String)> = arena
            .contexts
            .keys()
            .filter(|(h, _)| dead.contains(h))
            .cloned()
            .collect();
        for key in stale {
            if let Some(ctx) = arena.contexts.remove(&key) {
                drop(unsafe { Box::from_raw(ctx) });
            }
        }
        check(unsafe { sys::gm_session_close(entry.ptr) })
    }

    fn connect(&self, session: SessionId, url: &str, token: &str) -> EngineResult<()> {
        let ptr = self.session_ptr(session)?;
        check(unsafe {
            sys::gm_connect(
                ptr,
                url.as_ptr() as *const c_char,
                url.len(),
                token.as_ptr() as *const c_char,
                token.len(),
            )
        })
    }

    fn disconnect(&self, session: SessionId) -> EngineResult<()> {
        let ptr = self.session_ptr(session)?;
        check(unsafe { sys::gm_disconnect(ptr) })
    }

    fn local_id(&self, session: SessionId) -> EngineResult<LocalId> {
        let ptr = self.session_ptr(session)?;
        let mut buf = [0u8; LOCAL_ID_LEN];
        check(unsafe { sys::gm_local_id(ptr, buf.as_mut_ptr() as *mut c_char) })?;
        let text = std::str::from_utf8(&buf)
            .map_err(|_| EngineError::Internal("engine returned a non-ASCII id".into()))?;
        LocalId::from_hex(text).map_err(|err| EngineError::Internal(err.to_string()))
    }

    fn set_position(&self, session: SessionId, x: f64, y: f64) -> EngineResult<(f64, f64)> {
        let ptr = self.session_ptr(session)?;
        let mut applied_x = x;
        let mut applied_y = y;
        check(unsafe { sys::gm_set_position(ptr, &mut applied_x, &mut applied_y) })?;
        Ok((applied_x, applied_y))
    }

    fn map_open(&self, session: SessionId, name: &str) -> EngineResult<HandleId> {
        let ptr = self.session_ptr(session)?;
        let map =
            unsafe { sys::gm_map_open(ptr, name.as_ptr() as *const c_char, name.len()) };
        if map.is_null() {
            return Err(EngineError::Offline);
        }
        let handle = HandleId::from_raw(next_index());
        self.arena.write().handles.insert(
            handle,
            HandleEntry {
                ptr: HandlePtr::Map(map),
                session,
            },
        );
        Ok(handle)
    }

    fn map_get(&self, handle: HandleId, key: &RawSlot, out: &mut RawSlot) -> EngineResult<()> {
        let ptr = self.map_ptr(handle)?;
        let mut native_out = RawSlot::null();
        check(unsafe { sys::gm_map_get(ptr, key, &mut native_out) })?;
        let value = slot::decode(&native_out);
        // The engine allocated the payload; its free resets the tag, so the
        // Rust drop of `native_out` is a no-op.
        unsafe { sys::gm_value_free(&mut native_out) };
        *out = slot::encode(&value);
        Ok(())
    }

    fn map_set(
        &self,
        handle: HandleId,
        key: &RawSlot,
        value: &RawSlot,
        options: u32,
    ) -> EngineResult<()> {
        let ptr = self.map_ptr(handle)?;
        check(unsafe { sys::gm_map_set(ptr, key, value, options) })
    }

    fn pubsub_open(&self, session: SessionId, name: &str) -> EngineResult<HandleId> {
        let ptr = self.session_ptr(session)?;
        let pubsub =
            unsafe { sys::gm_pubsub2d_open(ptr, name.as_ptr() as *const c_char, name.len()) };
        if pubsub.is_null() {
            return Err(EngineError::Offline);
        }
        let handle = HandleId::from_raw(next_index());
        self.arena.write().handles.insert(
            handle,
            HandleEntry {
                ptr: HandlePtr::Pubsub(pubsub),
                session,
            },
        );
        Ok(handle)
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
        let ptr = self.pubsub_ptr(handle)?;
        check(unsafe {
            sys::gm_pubsub2d_publish(
                ptr,
                channel.as_ptr() as *const c_char,
                channel.len(),
                x,
                y,
                radius,
                value,
                options,
            )
        })
    }

    fn subscribe(&self, handle: HandleId, channel: &str) -> EngineResult<()> {
        let (ptr, trampoline) = {
            let arena = self.arena.read();
            let entry = arena.handles.get(&handle).ok_or(EngineError::UnknownHandle)?;
            let HandlePtr::Pubsub(ptr) = &entry.ptr else {
                return Err(EngineError::UnknownHandle);
            };
            let session = arena
                .sessions
                .get(&entry.session)
                .ok_or(EngineError::UnknownSession)?;
            (*ptr, session.trampoline)
        };
        let ctx = Box::into_raw(Box::new(DispatchCtx { handle, trampoline }));
        let code = unsafe {
            sys::gm_pubsub2d_on(
                ptr,
                channel.as_ptr() as *const c_char,
                channel.len(),
                ctx as *mut c_void,
                dispatch_entry,
            )
        };
        if let Err(err) = check(code) {
            drop(unsafe { Box::from_raw(ctx) });
            return Err(err);
        }
        let prior = self
            .arena
            .write()
            .contexts
            .insert((handle, channel.to_string()), ctx);
        if let Some(prior) = prior {
            // Replaced subscription: the engine no longer holds this context.
            drop(unsafe { Box::from_raw(prior) });
        }
        Ok(())
    }

    fn unsubscribe(&self, handle: HandleId, channel: &str) -> EngineResult<()> {
        let ptr = self.pubsub_ptr(handle)?;
        check(unsafe {
            sys::gm_pubsub2d_off(ptr, channel.as_ptr() as *const c_char, channel.len())
        })?;
        if let Some(ctx) = self
            .arena
            .write()
            .contexts
            .remove(&(handle, channel.to_string()))
        {
            drop(unsafe { Box::from_raw(ctx) });
        }
        Ok(())
    }
}
