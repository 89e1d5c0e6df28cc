/*!
Listener registry.

Owns the listener records and the per-tracker reference counts under one
lock. That lock is never held across a native call or a post to the queue:
each operation decides what to do under the lock, then acts after releasing
it.

## Module Structure

- `mod.rs` - `ListenerRegistry`, subscribe/unsubscribe/dispatch
- `listener.rs` - listener records, requests and deliveries
- `scope.rs` - scope containment
- `focus.rs` - stale focus filter
*/

mod focus;
mod listener;
mod scope;

pub(crate) use listener::{Delivery, ListenerRecord};
pub use listener::{DeliveredEvent, ListenerCallback, ListenerRequest};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::dispatch::{DispatchQueue, WorkItem};
use crate::platform::{HandleReleaser, NativeEventSource, NativeProvider};
use crate::tracking::{CallbackId, HookSpec, NotificationMultiplexer, TrackedEvent, TrackerKind};
use crate::types::{
  EventArgs, EventId, EventSource, ListenerId, RelayError, RelayResult, RuntimeId,
};
use focus::FocusFilter;

/// Reference count on one tracker, plus the callback feeding it into us.
#[derive(Debug, Default)]
struct TrackerUse {
  refs: usize,
  callback: Option<CallbackId>,
}

#[derive(Debug, Default)]
struct RegistryState {
  listeners: Vec<Arc<ListenerRecord>>,
  trackers: HashMap<TrackerKind, TrackerUse>,
}

impl RegistryState {
  /// Take a reference on each tracker; returns the ones that went 0 -> 1.
  fn retain_trackers(&mut self, kinds: &[TrackerKind]) -> Vec<TrackerKind> {
    let mut started = Vec::new();
    for kind in kinds {
      let usage = self.trackers.entry(*kind).or_default();
      usage.refs += 1;
      if usage.refs == 1 {
        started.push(*kind);
      }
    }
    started
  }

  /// Drop a reference on each tracker; returns callbacks of trackers nobody
  /// needs any more.
  fn release_trackers(&mut self, kinds: &[TrackerKind]) -> Vec<(TrackerKind, CallbackId)> {
    let mut stopped = Vec::new();
    for kind in kinds {
      let Some(usage) = self.trackers.get_mut(kind) else {
        continue;
      };
      usage.refs = usage.refs.saturating_sub(1);
      if usage.refs == 0 {
        if let Some(callback) = self.trackers.remove(kind).and_then(|u| u.callback) {
          stopped.push((*kind, callback));
        }
      }
    }
    stopped
  }
}

pub(crate) struct ListenerRegistry {
  state: Mutex<RegistryState>,
  focus: Mutex<FocusFilter>,
  queue: Arc<DispatchQueue>,
  trackers: NotificationMultiplexer,
  provider: Arc<dyn NativeProvider>,
  releaser: Arc<dyn HandleReleaser>,
  this: Weak<Self>,
}

impl std::fmt::Debug for ListenerRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ListenerRegistry")
      .field("listeners", &self.state.lock().listeners.len())
      .finish_non_exhaustive()
  }
}

impl ListenerRegistry {
  pub(crate) fn new(
    queue: Arc<DispatchQueue>,
    provider: Arc<dyn NativeProvider>,
    releaser: Arc<dyn HandleReleaser>,
    source: Arc<dyn NativeEventSource>,
    sync_timeout: Duration,
    focus_window: u32,
  ) -> Arc<Self> {
    Arc::new_cyclic(|this| Self {
      state: Mutex::new(RegistryState::default()),
      focus: Mutex::new(FocusFilter::new(focus_window)),
      trackers: NotificationMultiplexer::new(queue.clone(), source, provider.clone(), sync_timeout),
      queue,
      provider,
      releaser,
      this: this.clone(),
    })
  }

  pub(crate) fn queue(&self) -> &DispatchQueue {
    &self.queue
  }

  pub(crate) fn listener_count(&self) -> usize {
    self.state.lock().listeners.len()
  }

  pub(crate) fn is_tracking(&self, kind: TrackerKind) -> bool {
    self.trackers.is_active(kind)
  }

  /// Register a listener, starting the worker and any implied trackers.
  pub(crate) fn subscribe(&self, request: ListenerRequest, callback: ListenerCallback) -> RelayResult<ListenerId> {
    request.validate()?;
    self.queue.start()?;

    let record = Arc::new(ListenerRecord::new(request, callback));
    let id = record.id;

    // Step 1: record and reference counts (quick, under lock)
    let started = {
      let mut state = self.state.lock();
      let started = state.retain_trackers(&record.trackers);
      state.listeners.push(record);
      started
    };

    // Step 2: tracker start (NO LOCK)
    for kind in started {
      self.start_tracker(kind);
    }

    log::debug!("Listener {id} subscribed");
    Ok(id)
  }

  /// Remove every listener registered as `(event_id, reference, callback)`.
  pub(crate) fn unsubscribe(
    &self,
    event_id: EventId,
    reference: &RuntimeId,
    callback: &ListenerCallback,
  ) -> RelayResult<()> {
    let removed = self.remove_where(|l| l.matches(event_id, reference, callback));
    if removed == 0 {
      return Err(RelayError::ListenerNotFound {
        event_id,
        reference: reference.clone(),
      });
    }
    Ok(())
  }

  /// Remove one listener by id. Returns whether it existed.
  pub(crate) fn remove_listener(&self, id: ListenerId) -> bool {
    self.remove_where(|l| l.id == id) > 0
  }

  /// Remove every listener and tear every tracker down.
  pub(crate) fn unsubscribe_all(&self) {
    let listeners = {
      let mut state = self.state.lock();
      state.trackers.clear();
      std::mem::take(&mut state.listeners)
    };
    for listener in &listeners {
      listener.deactivate();
    }
    self.trackers.stop_all();
    log::debug!("Removed all {} listeners", listeners.len());
  }

  /// Queue one delivery per listener that hears this event. Returns how many
  /// were queued.
  pub(crate) fn dispatch(&self, source: EventSource, args: EventArgs) -> RelayResult<usize> {
    let event_id = args.event_id();
    let candidates: Vec<Arc<ListenerRecord>> = self
      .state
      .lock()
      .listeners
      .iter()
      .filter(|l| l.wants(&args))
      .cloned()
      .collect();
    if candidates.is_empty() {
      return Ok(0);
    }

    let focus_tick = match args {
      EventArgs::Focus { timestamp } => Some(timestamp),
      _ => None,
    };
    if let Some(timestamp) = focus_tick {
      if self.focus.lock().is_stale(timestamp) {
        log::debug!("Dropping stale focus event ({timestamp})");
        return Ok(0);
      }
    }

    let source = match source {
      EventSource::Identity(id) => id,
      EventSource::Native(target) => match self.provider.identity_of(target) {
        Ok(id) => id,
        Err(e) if e.is_unavailable() => {
          log::debug!("Dropping {event_id}: source window {} gone", target.window);
          return Ok(0);
        }
        Err(e) => return Err(e.into()),
      },
    };

    let mut queued = 0;
    for record in candidates {
      if !scope::contains(self.provider.as_ref(), &record.reference, record.scope, &source) {
        continue;
      }
      log::trace!("Queueing {event_id} from {source} for listener {}", record.id);
      self.queue.post(WorkItem::Deliver(Delivery {
        record,
        source: source.clone(),
        args: args.clone(),
        provider: self.provider.clone(),
        releaser: self.releaser.clone(),
      }))?;
      queued += 1;
    }
    if let Some(timestamp) = focus_tick.filter(|_| queued > 0) {
      self.focus.lock().record(timestamp);
    }
    Ok(queued)
  }

  fn remove_where(&self, predicate: impl Fn(&ListenerRecord) -> bool) -> usize {
    // Step 1: unlink records and drop tracker references (quick, under lock)
    let (removed, stopped) = {
      let mut state = self.state.lock();
      let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.listeners)
        .into_iter()
        .partition(|l| predicate(l));
      state.listeners = kept;
      let kinds: Vec<TrackerKind> = removed.iter().flat_map(|l| l.trackers.iter().copied()).collect();
      (removed, state.release_trackers(&kinds))
    };

    for record in &removed {
      record.deactivate();
      log::debug!("Listener {} unsubscribed", record.id);
    }

    // Step 2: tracker teardown (NO LOCK)
    for (kind, callback) in stopped {
      self.trackers.remove_callback(kind, callback);
    }
    removed.len()
  }

  fn start_tracker(&self, kind: TrackerKind) {
    let provider = self.provider.clone();
    self
      .trackers
      .ensure_tracker(kind, move || HookSpec::for_kind(kind, provider));

    let this = self.this.clone();
    let forward = Arc::new(move |event: &TrackedEvent| {
      if let Some(registry) = this.upgrade() {
        registry.on_tracked(event);
      }
    });
    let Some(callback) = self.trackers.add_callback(kind, forward) else {
      return;
    };

    // A racing unsubscribe may have released the tracker, or a racing
    // subscribe may have attached first. Either way ours is surplus.
    let surplus = {
      let mut state = self.state.lock();
      match state.trackers.get_mut(&kind) {
        Some(usage) if usage.callback.is_none() => {
          usage.callback = Some(callback);
          None
        }
        _ => Some(callback),
      }
    };
    if let Some(callback) = surplus {
      self.trackers.remove_callback(kind, callback);
    }
  }

  fn on_tracked(&self, event: &TrackedEvent) {
    if let Err(e) = self.dispatch(event.source.clone(), event.args.clone()) {
      log::debug!("Tracked {} not dispatched: {e}", event.args.event_id());
    }
  }
}

impl Drop for ListenerRegistry {
  fn drop(&mut self) {
    self.unsubscribe_all();
    self.queue.stop();
  }
}
