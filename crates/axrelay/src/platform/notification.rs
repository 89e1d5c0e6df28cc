/*! Native notifications as delivered by an event source. */

use derive_more::{Display, From, Into};

use crate::types::NativeTarget;

/// OS-neutral kinds of low-level notification an event source can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeEventKind {
  FocusChanged,
  ForegroundChanged,
  MenuStart,
  MenuEnd,
  PopupStart,
  PopupEnd,
  ObjectCreated,
  ObjectShown,
  ObjectHidden,
  ObjectDestroyed,
  LocationChanged,
  StateChanged,
  MinimizeStart,
  MinimizeEnd,
}

/// One native callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeNotification {
  pub kind: NativeEventKind,
  pub target: NativeTarget,
  /// Wrapping millisecond tick at which the OS raised the notification.
  pub timestamp: u32,
}

impl NativeNotification {
  pub const fn new(kind: NativeEventKind, target: NativeTarget, timestamp: u32) -> Self {
    Self {
      kind,
      target,
      timestamp,
    }
  }
}

/// Token identifying one native subscription, issued by the event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, From, Into)]
pub struct HookToken(pub u64);
