/*! Event arguments and sources. */

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{EventId, PropertyId, PropertyValue, RuntimeId, WindowHandle};

/// Object id meaning "the window itself" rather than a part of it.
pub const OBJECT_ID_WINDOW: i32 = 0;

/// Child id meaning "the object itself" rather than a simple child.
pub const CHILD_ID_SELF: i32 = 0;

/// Structure change kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum StructureChange {
  ChildAdded,
  ChildRemoved,
  ChildrenInvalidated,
  ChildrenBulkAdded,
  ChildrenBulkRemoved,
  ChildrenReordered,
}

/// Event payload. One variant per argument shape, so the dispatch path
/// matches on the variant instead of downcasting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "kind")]
#[ts(export)]
pub enum EventArgs {
  /// Event with no payload beyond its id.
  Basic { event_id: EventId },
  /// Focus moved. `timestamp` is a wrapping millisecond tick from the source.
  Focus { timestamp: u32 },
  PropertyChanged {
    property: PropertyId,
    old_value: Option<PropertyValue>,
    new_value: PropertyValue,
  },
  StructureChanged {
    change: StructureChange,
    runtime_id: RuntimeId,
  },
  /// The window is already gone, so only its identity is carried.
  WindowClosed { runtime_id: RuntimeId },
}

impl EventArgs {
  /// Event id implied by this payload.
  pub const fn event_id(&self) -> EventId {
    match self {
      Self::Basic { event_id } => *event_id,
      Self::Focus { .. } => EventId::FOCUS_CHANGED,
      Self::PropertyChanged { .. } => EventId::PROPERTY_CHANGED,
      Self::StructureChanged { .. } => EventId::STRUCTURE_CHANGED,
      Self::WindowClosed { .. } => EventId::WINDOW_CLOSED,
    }
  }

  /// Property carried by a property-changed payload.
  pub const fn property(&self) -> Option<PropertyId> {
    match self {
      Self::PropertyChanged { property, .. } => Some(*property),
      _ => None,
    }
  }
}

/// Native addressing of an accessible object: a window plus object and child ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NativeTarget {
  pub window: WindowHandle,
  pub object_id: i32,
  pub child_id: i32,
}

impl NativeTarget {
  /// Target for a whole window.
  pub const fn window(window: WindowHandle) -> Self {
    Self {
      window,
      object_id: OBJECT_ID_WINDOW,
      child_id: CHILD_ID_SELF,
    }
  }

  pub const fn is_window(&self) -> bool {
    self.object_id == OBJECT_ID_WINDOW && self.child_id == CHILD_ID_SELF
  }
}

/// Where an event came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventSource {
  /// Source already identified by stable identity.
  Identity(RuntimeId),
  /// Source addressed natively; resolved to an identity through the provider.
  Native(NativeTarget),
}

impl From<RuntimeId> for EventSource {
  fn from(id: RuntimeId) -> Self {
    Self::Identity(id)
  }
}

impl From<NativeTarget> for EventSource {
  fn from(target: NativeTarget) -> Self {
    Self::Native(target)
  }
}
