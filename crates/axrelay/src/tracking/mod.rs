/*!
Native notification multiplexing.

Trackers live in named slots. Each slot owns at most one native subscription
no matter how many callbacks share it. Subscribing and unsubscribing natively
always happens on the dispatch worker, posted synchronously so the caller sees
the result of its own call.
*/

mod hooks;
mod tracker;

pub(crate) use hooks::{HookSpec, TrackedEvent};
pub use hooks::TrackerKind;
pub use tracker::NativeSink;
pub(crate) use tracker::{CallbackId, Tracker, TrackerCallback};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::dispatch::{DispatchQueue, WorkItem};
use crate::platform::{NativeEventSource, NativeProvider};
use tracker::TrampolineTable;

pub(crate) struct NotificationMultiplexer {
  slots: Mutex<HashMap<TrackerKind, Arc<Tracker>>>,
  trampolines: Arc<TrampolineTable>,
  queue: Arc<DispatchQueue>,
  source: Arc<dyn NativeEventSource>,
  provider: Arc<dyn NativeProvider>,
  sync_timeout: Duration,
}

impl NotificationMultiplexer {
  pub(crate) fn new(
    queue: Arc<DispatchQueue>,
    source: Arc<dyn NativeEventSource>,
    provider: Arc<dyn NativeProvider>,
    sync_timeout: Duration,
  ) -> Self {
    Self {
      slots: Mutex::new(HashMap::new()),
      trampolines: Arc::new(Mutex::new(HashMap::new())),
      queue,
      source,
      provider,
      sync_timeout,
    }
  }

  /// Create the tracker for `kind` if its slot is empty. Never subscribes.
  pub(crate) fn ensure_tracker(&self, kind: TrackerKind, factory: impl FnOnce() -> HookSpec) {
    let mut slots = self.slots.lock();
    if slots.contains_key(&kind) {
      return;
    }
    let hook = factory();
    debug_assert_eq!(hook.kind, kind);
    let tracker = Tracker::new(
      hook,
      self.source.clone(),
      self.provider.clone(),
      Arc::downgrade(&self.trampolines),
    );
    slots.insert(kind, Arc::new(tracker));
  }

  /// Add a callback, starting the native subscription if this is the first.
  /// `None` if the slot has no tracker.
  pub(crate) fn add_callback(&self, kind: TrackerKind, callback: TrackerCallback) -> Option<CallbackId> {
    let tracker = self.slots.lock().get(&kind).cloned()?;
    let (id, was_first) = tracker.add_callback(callback);
    if was_first {
      self.post_sync(WorkItem::StartTracker(tracker));
    }
    Some(id)
  }

  /// Remove a callback. Returns whether it was the last one, in which case
  /// the native subscription is torn down.
  pub(crate) fn remove_callback(&self, kind: TrackerKind, id: CallbackId) -> bool {
    let Some(tracker) = self.slots.lock().get(&kind).cloned() else {
      return false;
    };
    let (found, now_empty) = tracker.remove_callback(id);
    let was_last = found && now_empty;
    if was_last {
      self.post_sync(WorkItem::StopTracker(tracker));
    }
    was_last
  }

  /// Tear every tracker down and empty all slots.
  pub(crate) fn stop_all(&self) {
    let trackers: Vec<Arc<Tracker>> = self.slots.lock().drain().map(|(_, t)| t).collect();
    for tracker in trackers {
      tracker.clear_callbacks();
      if tracker.is_subscribed() {
        self.post_sync(WorkItem::StopTracker(tracker));
      }
    }
  }

  pub(crate) fn is_active(&self, kind: TrackerKind) -> bool {
    self.slots.lock().get(&kind).is_some_and(|t| t.is_subscribed())
  }

  fn post_sync(&self, item: WorkItem) {
    match self.queue.post_and_wait(item, self.sync_timeout) {
      Ok(true) => {}
      Ok(false) => log::warn!(
        "Tracker change did not finish within {:?}; it will complete on the worker",
        self.sync_timeout
      ),
      Err(e) => log::warn!("Tracker change not posted: {e}"),
    }
  }
}

impl Drop for NotificationMultiplexer {
  fn drop(&mut self) {
    // Anything still reachable from a sink goes inert with the table.
    self.trampolines.lock().clear();
  }
}
