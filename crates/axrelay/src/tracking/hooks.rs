/*!
Tracker kinds and hook specs.

A hook spec is the native events a tracker listens for plus one closure that
translates a raw notification into an automation event (or drops it).
*/

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::platform::{NativeEventKind, NativeNotification, NativeProvider};
use crate::types::{EventArgs, EventId, EventSource, PropertyId, PropertyValue, WindowHandle};

/// Named tracker slot. At most one native subscription exists per slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerKind {
  Focus,
  Menu,
  WindowShowOrOpen,
  WindowHideOrClose,
  BoundingRect,
  WindowInteractionState,
  WindowVisualState,
}

impl TrackerKind {
  pub const ALL: [Self; 7] = [
    Self::Focus,
    Self::Menu,
    Self::WindowShowOrOpen,
    Self::WindowHideOrClose,
    Self::BoundingRect,
    Self::WindowInteractionState,
    Self::WindowVisualState,
  ];

  /// Native notifications this tracker subscribes to.
  pub const fn native_events(self) -> &'static [NativeEventKind] {
    use NativeEventKind as N;
    match self {
      Self::Focus => &[N::FocusChanged, N::ForegroundChanged],
      Self::Menu => &[N::MenuStart, N::MenuEnd, N::PopupStart, N::PopupEnd],
      Self::WindowShowOrOpen => &[N::ObjectCreated, N::ObjectShown],
      Self::WindowHideOrClose => &[N::ObjectHidden, N::ObjectDestroyed],
      Self::BoundingRect => &[N::LocationChanged],
      Self::WindowInteractionState => &[N::StateChanged],
      Self::WindowVisualState => &[N::LocationChanged, N::MinimizeStart, N::MinimizeEnd],
    }
  }

  /// Property a property tracker reports on.
  pub const fn property(self) -> Option<PropertyId> {
    match self {
      Self::BoundingRect => Some(PropertyId::BOUNDING_RECTANGLE),
      Self::WindowInteractionState => Some(PropertyId::WINDOW_INTERACTION_STATE),
      Self::WindowVisualState => Some(PropertyId::WINDOW_VISUAL_STATE),
      Self::Focus | Self::Menu | Self::WindowShowOrOpen | Self::WindowHideOrClose => None,
    }
  }

  /// Whether notifications for windows with a rich provider are suppressed.
  /// Those windows raise the same events through their own provider.
  pub const fn is_bridged(self) -> bool {
    self.property().is_none()
  }

  /// Trackers a listener for `event_id` filtered to `properties` needs.
  pub fn implied_by(event_id: EventId, properties: &[PropertyId]) -> Vec<Self> {
    match event_id {
      EventId::FOCUS_CHANGED => vec![Self::Focus],
      EventId::MENU_OPENED | EventId::MENU_CLOSED => vec![Self::Menu],
      EventId::WINDOW_OPENED => vec![Self::WindowShowOrOpen],
      EventId::WINDOW_CLOSED => vec![Self::WindowHideOrClose],
      EventId::PROPERTY_CHANGED => Self::ALL
        .into_iter()
        .filter(|k| k.property().is_some_and(|p| properties.contains(&p)))
        .collect(),
      _ => Vec::new(),
    }
  }
}

/// An automation event produced by a tracker.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TrackedEvent {
  pub(crate) source: EventSource,
  pub(crate) args: EventArgs,
}

/// Translates a raw notification. `None` drops it.
pub(crate) type HookHandler = Arc<dyn Fn(&NativeNotification) -> Option<TrackedEvent> + Send + Sync>;

/// What a tracker subscribes to and how it translates notifications.
#[derive(Clone)]
pub(crate) struct HookSpec {
  pub(crate) kind: TrackerKind,
  pub(crate) events: Vec<NativeEventKind>,
  pub(crate) handler: HookHandler,
}

impl fmt::Debug for HookSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("HookSpec")
      .field("kind", &self.kind)
      .field("events", &self.events)
      .finish_non_exhaustive()
  }
}

impl HookSpec {
  pub(crate) fn new(
    kind: TrackerKind,
    handler: impl Fn(&NativeNotification) -> Option<TrackedEvent> + Send + Sync + 'static,
  ) -> Self {
    Self {
      kind,
      events: kind.native_events().to_vec(),
      handler: Arc::new(handler),
    }
  }

  /// Standard translation for a tracker kind.
  pub(crate) fn for_kind(kind: TrackerKind, provider: Arc<dyn NativeProvider>) -> Self {
    match kind {
      TrackerKind::Focus => Self::new(kind, |n| {
        matches!(n.kind, NativeEventKind::FocusChanged | NativeEventKind::ForegroundChanged).then(|| {
          TrackedEvent {
            source: EventSource::Native(n.target),
            args: EventArgs::Focus {
              timestamp: n.timestamp,
            },
          }
        })
      }),
      TrackerKind::Menu => Self::new(kind, |n| {
        let event_id = match n.kind {
          NativeEventKind::MenuStart | NativeEventKind::PopupStart => EventId::MENU_OPENED,
          NativeEventKind::MenuEnd | NativeEventKind::PopupEnd => EventId::MENU_CLOSED,
          _ => return None,
        };
        Some(TrackedEvent {
          source: EventSource::Native(n.target),
          args: EventArgs::Basic { event_id },
        })
      }),
      TrackerKind::WindowShowOrOpen => Self::new(kind, |n| {
        n.target.is_window().then(|| TrackedEvent {
          source: EventSource::Native(n.target),
          args: EventArgs::Basic {
            event_id: EventId::WINDOW_OPENED,
          },
        })
      }),
      TrackerKind::WindowHideOrClose => Self::new(kind, move |n| {
        if !n.target.is_window() {
          return None;
        }
        match provider.identity_of(n.target) {
          Ok(runtime_id) => Some(TrackedEvent {
            source: EventSource::Identity(runtime_id.clone()),
            args: EventArgs::WindowClosed { runtime_id },
          }),
          Err(e) => {
            log::debug!("Dropping window-closed for {}: {e}", n.target.window);
            None
          }
        }
      }),
      TrackerKind::BoundingRect | TrackerKind::WindowInteractionState | TrackerKind::WindowVisualState => {
        property_hook(kind, provider)
      }
    }
  }
}

/// Property trackers re-read the property and only report real changes.
fn property_hook(kind: TrackerKind, provider: Arc<dyn NativeProvider>) -> HookSpec {
  let last: Mutex<HashMap<WindowHandle, PropertyValue>> = Mutex::new(HashMap::new());

  HookSpec::new(kind, move |n| {
    let property = kind.property()?;
    if !n.target.is_window() || !kind.native_events().contains(&n.kind) {
      return None;
    }
    let window = n.target.window;

    let new_value = match provider.window_property(window, property) {
      Ok(value) => value,
      Err(e) => {
        last.lock().remove(&window);
        log::debug!("Dropping {kind:?} change for {window}: {e}");
        return None;
      }
    };

    let old_value = {
      let mut last = last.lock();
      if last.get(&window) == Some(&new_value) {
        return None;
      }
      last.insert(window, new_value.clone())
    };

    Some(TrackedEvent {
      source: EventSource::Native(n.target),
      args: EventArgs::PropertyChanged {
        property,
        old_value,
        new_value,
      },
    })
  })
}
