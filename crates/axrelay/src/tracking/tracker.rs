/*!
One tracker: a callback list, at most one native subscription, and a
reentrancy filter.

The native layer only ever sees a [`NativeSink`]. The sink holds a key into
the multiplexer's trampoline table plus a weak reference to that table, so a
notification racing a teardown finds nothing and is ignored.
*/

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use super::hooks::{HookSpec, TrackedEvent, TrackerKind};
use crate::dispatch::panic_message;
use crate::platform::{HookToken, NativeEventSource, NativeNotification, NativeProvider};
use crate::types::Fault;

/// Called for every event a tracker produces.
pub(crate) type TrackerCallback = Arc<dyn Fn(&TrackedEvent) + Send + Sync>;

/// Identifies a callback within one tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CallbackId(u64);

impl CallbackId {
  fn next() -> Self {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    Self(NEXT.fetch_add(1, Ordering::Relaxed))
  }
}

/// Live subscriptions, keyed by the key handed to their sink.
pub(crate) type TrampolineTable = Mutex<HashMap<u64, Arc<Tracker>>>;

static NEXT_SINK_KEY: AtomicU64 = AtomicU64::new(1);

/// Handle given to the native event source for one subscription.
///
/// Cheap to clone. Inert once the subscription it belongs to is torn down.
#[derive(Clone)]
pub struct NativeSink {
  key: u64,
  table: Weak<TrampolineTable>,
}

impl fmt::Debug for NativeSink {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("NativeSink").field("key", &self.key).finish()
  }
}

impl NativeSink {
  /// Deliver one notification. Safe from any thread.
  pub fn notify(&self, notification: NativeNotification) {
    let Some(table) = self.table.upgrade() else {
      return;
    };
    let tracker = table.lock().get(&self.key).cloned();
    match tracker {
      Some(tracker) => tracker.on_native(notification),
      None => log::trace!("Notification for stale sink {} ignored", self.key),
    }
  }

  /// Whether the subscription behind this sink is still live.
  pub fn is_live(&self) -> bool {
    self
      .table
      .upgrade()
      .is_some_and(|table| table.lock().contains_key(&self.key))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterMode {
  Idle,
  Processing,
  Queuing,
}

/// Serializes notifications that arrive while one is still being handled.
#[derive(Debug)]
struct ReentrancyFilter {
  mode: FilterMode,
  pending: VecDeque<NativeNotification>,
}

impl ReentrancyFilter {
  const fn new() -> Self {
    Self {
      mode: FilterMode::Idle,
      pending: VecDeque::new(),
    }
  }
}

struct Subscription {
  token: HookToken,
  key: u64,
}

pub(crate) struct Tracker {
  hook: HookSpec,
  callbacks: Mutex<Vec<(CallbackId, TrackerCallback)>>,
  subscription: Mutex<Option<Subscription>>,
  filter: Mutex<ReentrancyFilter>,
  source: Arc<dyn NativeEventSource>,
  provider: Arc<dyn NativeProvider>,
  table: Weak<TrampolineTable>,
}

impl fmt::Debug for Tracker {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Tracker")
      .field("kind", &self.kind())
      .field("callbacks", &self.callbacks.lock().len())
      .field("subscribed", &self.is_subscribed())
      .finish()
  }
}

impl Tracker {
  pub(crate) fn new(
    hook: HookSpec,
    source: Arc<dyn NativeEventSource>,
    provider: Arc<dyn NativeProvider>,
    table: Weak<TrampolineTable>,
  ) -> Self {
    Self {
      hook,
      callbacks: Mutex::new(Vec::new()),
      subscription: Mutex::new(None),
      filter: Mutex::new(ReentrancyFilter::new()),
      source,
      provider,
      table,
    }
  }

  pub(crate) fn kind(&self) -> TrackerKind {
    self.hook.kind
  }

  pub(crate) fn is_subscribed(&self) -> bool {
    self.subscription.lock().is_some()
  }

  pub(crate) fn callback_count(&self) -> usize {
    self.callbacks.lock().len()
  }

  /// Returns the new id and whether the list was empty before the push.
  pub(crate) fn add_callback(&self, callback: TrackerCallback) -> (CallbackId, bool) {
    let id = CallbackId::next();
    let mut callbacks = self.callbacks.lock();
    let was_first = callbacks.is_empty();
    callbacks.push((id, callback));
    (id, was_first)
  }

  /// Returns `(found, now_empty)`.
  pub(crate) fn remove_callback(&self, id: CallbackId) -> (bool, bool) {
    let mut callbacks = self.callbacks.lock();
    let before = callbacks.len();
    callbacks.retain(|(cid, _)| *cid != id);
    (callbacks.len() != before, callbacks.is_empty())
  }

  pub(crate) fn clear_callbacks(&self) {
    self.callbacks.lock().clear();
  }

  /// Make the native subscription match the callback list. Runs on the
  /// dispatch worker, so starts and stops are applied in posting order.
  pub(crate) fn reconcile(self: &Arc<Self>) -> Result<(), Fault> {
    let wanted = self.callback_count() > 0;
    let mut subscription = self.subscription.lock();

    match (wanted, subscription.is_some()) {
      (true, false) => {
        let Some(table) = self.table.upgrade() else {
          return Ok(());
        };
        let key = NEXT_SINK_KEY.fetch_add(1, Ordering::Relaxed);
        table.lock().insert(key, self.clone());
        let sink = NativeSink {
          key,
          table: Arc::downgrade(&table),
        };

        match self.source.subscribe(&self.hook.events, sink) {
          Ok(token) => {
            log::debug!("{:?} tracker subscribed ({token})", self.kind());
            *subscription = Some(Subscription { token, key });
            Ok(())
          }
          Err(e) => {
            table.lock().remove(&key);
            Err(Fault::Recoverable(format!(
              "{:?} tracker failed to subscribe: {e}",
              self.kind()
            )))
          }
        }
      }
      (false, true) => {
        let Some(Subscription { token, key }) = subscription.take() else {
          return Ok(());
        };
        if let Some(table) = self.table.upgrade() {
          table.lock().remove(&key);
        }
        match self.source.unsubscribe(token) {
          Ok(()) => {
            log::debug!("{:?} tracker unsubscribed ({token})", self.kind());
            Ok(())
          }
          Err(e) => Err(Fault::Recoverable(format!(
            "{:?} tracker failed to unsubscribe: {e}",
            self.kind()
          ))),
        }
      }
      _ => Ok(()),
    }
  }

  /// Entry point for native notifications.
  ///
  /// A notification arriving while another is in flight (including from the
  /// in-flight handler itself) is queued and handled after it, in order. A
  /// panicking handler is logged and the queue keeps draining.
  pub(crate) fn on_native(&self, notification: NativeNotification) {
    {
      let mut filter = self.filter.lock();
      match filter.mode {
        FilterMode::Idle => filter.mode = FilterMode::Processing,
        FilterMode::Processing | FilterMode::Queuing => {
          filter.pending.push_back(notification);
          filter.mode = FilterMode::Queuing;
          return;
        }
      }
    }

    let mut next = Some(notification);
    while let Some(notification) = next {
      if let Err(payload) = catch_unwind(AssertUnwindSafe(|| self.handle(&notification))) {
        let fault = Fault::Recoverable(panic_message(payload.as_ref()));
        log::warn!("{:?} tracker handler failed: {fault}", self.kind());
      }

      let mut filter = self.filter.lock();
      next = filter.pending.pop_front();
      filter.mode = match (&next, filter.pending.is_empty()) {
        (None, _) => FilterMode::Idle,
        (Some(_), true) => FilterMode::Processing,
        (Some(_), false) => FilterMode::Queuing,
      };
    }
  }

  fn handle(&self, notification: &NativeNotification) {
    if self.kind().is_bridged() && self.provider.has_rich_provider(notification.target.window) {
      log::trace!(
        "{:?} notification for {} left to its rich provider",
        self.kind(),
        notification.target.window
      );
      return;
    }

    let Some(event) = (self.hook.handler)(notification) else {
      return;
    };

    let callbacks: Vec<TrackerCallback> = self.callbacks.lock().iter().map(|(_, cb)| cb.clone()).collect();
    for callback in callbacks {
      callback(&event);
    }
  }
}
