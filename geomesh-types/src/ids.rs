//! Identifier types crossing the engine boundary.
//!
//! Native objects are addressed by stable integer indices assigned at
//! creation, never by raw native addresses. The driver resolves an index
//! through its own guarded table, so managed code never compares or
//! dereferences native pointers.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Width in bytes of a node identifier (ASCII hex digits).
pub const LOCAL_ID_LEN: usize = 32;

/// Stable index of one native engine session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    /// Wraps a raw index handed out by a driver.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the underlying index.
    #[must_use]
    pub const fn as_raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable index of one native sub-resource (a map or a pubsub plane).
///
/// Handle indices are unique for the lifetime of the process, which makes
/// them usable as bookkeeping keys by callers and by the dispatch registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandleId(u64);

impl HandleId {
    /// Wraps a raw index handed out by a driver.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the underlying index.
    #[must_use]
    pub const fn as_raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fixed-width identifier the engine assigns to a node during connect.
///
/// Always exactly [`LOCAL_ID_LEN`] ASCII hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalId([u8; LOCAL_ID_LEN]);

impl LocalId {
    /// Parses an identifier from its hex form.
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != LOCAL_ID_LEN {
            return Err(Error::InvalidId(format!(
                "expected {LOCAL_ID_LEN} hex digits, got {}",
                bytes.len()
            )));
        }
        if !bytes.iter().all(u8::is_ascii_hexdigit) {
            return Err(Error::InvalidId(format!("non-hex digit in {s:?}")));
        }
        let mut buf = [0u8; LOCAL_ID_LEN];
        buf.copy_from_slice(bytes);
        Ok(Self(buf))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Construction guarantees ASCII hex digits.
        std::str::from_utf8(&self.0).unwrap_or("")
    }

    /// Returns the raw identifier bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; LOCAL_ID_LEN] {
        &self.0
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocalId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for LocalId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LocalId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
