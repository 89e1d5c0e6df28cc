/*! Branded ID types for type-safe references. */

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use ts_rs::TS;

/// Automation event identifier.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, Display, From, Into,
)]
#[ts(export)]
pub struct EventId(pub i32);

impl EventId {
  pub const TOOL_TIP_OPENED: Self = Self(20000);
  pub const TOOL_TIP_CLOSED: Self = Self(20001);
  pub const STRUCTURE_CHANGED: Self = Self(20002);
  pub const MENU_OPENED: Self = Self(20003);
  pub const PROPERTY_CHANGED: Self = Self(20004);
  pub const FOCUS_CHANGED: Self = Self(20005);
  pub const ASYNC_CONTENT_LOADED: Self = Self(20006);
  pub const MENU_CLOSED: Self = Self(20007);
  pub const LAYOUT_INVALIDATED: Self = Self(20008);
  pub const INVOKED: Self = Self(20009);
  pub const WINDOW_OPENED: Self = Self(20016);
  pub const WINDOW_CLOSED: Self = Self(20017);
}

/// Automation property identifier.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, Display, From, Into,
)]
#[ts(export)]
pub struct PropertyId(pub i32);

impl PropertyId {
  pub const RUNTIME_ID: Self = Self(30000);
  pub const BOUNDING_RECTANGLE: Self = Self(30001);
  pub const PROCESS_ID: Self = Self(30002);
  pub const NAME: Self = Self(30005);
  pub const CLASS_NAME: Self = Self(30012);
  pub const WINDOW_VISUAL_STATE: Self = Self(30075);
  pub const WINDOW_INTERACTION_STATE: Self = Self(30076);
}

/// Control pattern identifier.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, Display, From, Into,
)]
#[ts(export)]
pub struct PatternId(pub i32);

/// Native window identifier (opaque to this crate).
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, Display, From, Into,
)]
#[ts(export)]
pub struct WindowHandle(pub u64);

/// Raw remote object reference as it arrives on the wire.
///
/// Owned by whoever holds it until wrapped in a [`RemoteHandle`](crate::RemoteHandle),
/// which releases it through the provider on drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, From, Into)]
pub struct RawHandle(pub u64);

/// Stable identity of a remote element.
///
/// Survives the death of the element's live handle, so listeners can be
/// matched and removed after the source UI is gone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RuntimeId(pub Vec<i32>);

impl RuntimeId {
  pub fn new(parts: impl Into<Vec<i32>>) -> Self {
    Self(parts.into())
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn as_slice(&self) -> &[i32] {
    &self.0
  }
}

impl std::fmt::Display for RuntimeId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let parts: Vec<String> = self.0.iter().map(i32::to_string).collect();
    write!(f, "[{}]", parts.join("."))
  }
}

impl From<Vec<i32>> for RuntimeId {
  fn from(parts: Vec<i32>) -> Self {
    Self(parts)
  }
}

/// Registered listener identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, From, Into)]
pub struct ListenerId(pub u64);

/// Global counter for `ListenerId` generation. Starts at 1 (0 could be confused with "null").
static LISTENER_COUNTER: AtomicU64 = AtomicU64::new(1);

impl ListenerId {
  /// Generate a new unique `ListenerId`.
  pub fn new() -> Self {
    Self(LISTENER_COUNTER.fetch_add(1, Ordering::Relaxed))
  }
}

impl Default for ListenerId {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn runtime_id_display_joins_parts() {
    assert_eq!(RuntimeId::new(vec![42, 7, 3]).to_string(), "[42.7.3]");
    assert_eq!(RuntimeId::default().to_string(), "[]");
  }

  #[test]
  fn listener_ids_are_unique() {
    let a = ListenerId::new();
    let b = ListenerId::new();
    assert_ne!(a, b);
  }
}
