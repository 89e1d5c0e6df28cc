/*!
Listener records and the delivery work they produce.
*/

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cache::{self, ElementTree};
use crate::platform::{HandleReleaser, NativeProvider};
use crate::tracking::TrackerKind;
use crate::types::{
  CacheSpec, EventArgs, EventId, Fault, ListenerId, PropertyId, RelayError, RelayResult, RuntimeId,
  TreeScope,
};

/// Client callback. Runs on the dispatch worker thread.
pub type ListenerCallback = Arc<dyn Fn(&DeliveredEvent) + Send + Sync>;

/// What a listener receives.
#[derive(Debug)]
pub struct DeliveredEvent {
  pub listener: ListenerId,
  pub event_id: EventId,
  /// Source element prefetched per the listener's cache request. `None` only
  /// for window-closed events whose window is already gone.
  pub element: Option<ElementTree>,
  pub args: EventArgs,
}

/// Everything a subscription asks for, apart from the callback.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct ListenerRequest {
  pub event_id: EventId,
  /// Stable identity of the element the listener is attached to.
  pub element: RuntimeId,
  pub scope: TreeScope,
  /// Property filter. Required for property-changed listeners.
  pub properties: Vec<PropertyId>,
  pub cache: CacheSpec,
}

impl ListenerRequest {
  pub fn new(event_id: EventId, element: RuntimeId) -> Self {
    Self {
      event_id,
      element,
      scope: TreeScope::ELEMENT,
      properties: Vec::new(),
      cache: CacheSpec::default(),
    }
  }

  /// Property-changed listener filtered to `properties`.
  pub fn property_changed(element: RuntimeId, properties: impl Into<Vec<PropertyId>>) -> Self {
    Self {
      properties: properties.into(),
      ..Self::new(EventId::PROPERTY_CHANGED, element)
    }
  }

  pub const fn with_scope(mut self, scope: TreeScope) -> Self {
    self.scope = scope;
    self
  }

  pub fn with_cache(mut self, cache: CacheSpec) -> Self {
    self.cache = cache;
    self
  }

  pub(crate) fn validate(&self) -> RelayResult<()> {
    if self.element.is_empty() {
      return Err(RelayError::InvalidArgument("listener element has no identity".into()));
    }
    if self.scope.is_empty() {
      return Err(RelayError::InvalidArgument("listener scope is empty".into()));
    }
    if self.event_id == EventId::PROPERTY_CHANGED && self.properties.is_empty() {
      return Err(RelayError::InvalidArgument(
        "property-changed listener needs at least one property".into(),
      ));
    }
    Ok(())
  }
}

pub(crate) struct ListenerRecord {
  pub(crate) id: ListenerId,
  pub(crate) event_id: EventId,
  pub(crate) reference: RuntimeId,
  pub(crate) scope: TreeScope,
  pub(crate) properties: Vec<PropertyId>,
  pub(crate) cache: Arc<CacheSpec>,
  pub(crate) callback: ListenerCallback,
  /// Trackers this listener holds a reference on.
  pub(crate) trackers: Vec<TrackerKind>,
  active: AtomicBool,
}

impl fmt::Debug for ListenerRecord {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ListenerRecord")
      .field("id", &self.id)
      .field("event_id", &self.event_id)
      .field("reference", &self.reference)
      .field("scope", &self.scope)
      .field("active", &self.is_active())
      .finish_non_exhaustive()
  }
}

impl ListenerRecord {
  pub(crate) fn new(request: ListenerRequest, callback: ListenerCallback) -> Self {
    let trackers = TrackerKind::implied_by(request.event_id, &request.properties);
    Self {
      id: ListenerId::new(),
      event_id: request.event_id,
      reference: request.element,
      scope: request.scope,
      properties: request.properties,
      cache: Arc::new(request.cache),
      callback,
      trackers,
      active: AtomicBool::new(true),
    }
  }

  pub(crate) fn is_active(&self) -> bool {
    self.active.load(Ordering::Acquire)
  }

  pub(crate) fn deactivate(&self) {
    self.active.store(false, Ordering::Release);
  }

  /// Same registration as `(event_id, reference, callback)`. Compares the
  /// callback by allocation, not by vtable.
  pub(crate) fn matches(&self, event_id: EventId, reference: &RuntimeId, callback: &ListenerCallback) -> bool {
    self.event_id == event_id
      && self.reference == *reference
      && std::ptr::addr_eq(Arc::as_ptr(&self.callback), Arc::as_ptr(callback))
  }

  /// Event id and property filter, before any scope test.
  pub(crate) fn wants(&self, args: &EventArgs) -> bool {
    if self.event_id != args.event_id() {
      return false;
    }
    match args.property() {
      Some(property) => self.properties.contains(&property),
      None => true,
    }
  }
}

/// One event for one listener, decoded and delivered on the worker.
pub(crate) struct Delivery {
  pub(crate) record: Arc<ListenerRecord>,
  pub(crate) source: RuntimeId,
  pub(crate) args: EventArgs,
  pub(crate) provider: Arc<dyn NativeProvider>,
  pub(crate) releaser: Arc<dyn HandleReleaser>,
}

impl fmt::Debug for Delivery {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Delivery")
      .field("listener", &self.record.id)
      .field("source", &self.source)
      .field("event_id", &self.args.event_id())
      .finish()
  }
}

impl Delivery {
  pub(crate) fn deliver(self) -> Result<(), Fault> {
    let record = &self.record;
    if !record.is_active() {
      log::trace!("Listener {} gone, skipping {}", record.id, self.args.event_id());
      return Ok(());
    }

    let element = match self.provider.fetch_cache(&self.source, &record.cache) {
      Ok(response) => {
        let rows = response.matrix.into_rows();
        match cache::decode(&response.shape, rows, &record.cache, &self.releaser) {
          Ok(tree) => tree,
          Err(e) => {
            return Err(Fault::Recoverable(format!(
              "Dropping {} for listener {}: {e}",
              self.args.event_id(),
              record.id
            )))
          }
        }
      }
      Err(e) if e.is_unavailable() && matches!(self.args, EventArgs::WindowClosed { .. }) => None,
      Err(e) => {
        log::debug!(
          "Dropping {} for listener {}: source {} {e}",
          self.args.event_id(),
          record.id,
          self.source
        );
        return Ok(());
      }
    };

    let event = DeliveredEvent {
      listener: record.id,
      event_id: self.args.event_id(),
      element,
      args: self.args,
    };
    (record.callback)(&event);
    Ok(())
  }
}
