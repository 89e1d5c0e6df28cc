/*! Units of queued work. */

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::Delivery;
use crate::tracking::Tracker;
use crate::types::Fault;

/// Boxed closure run on the worker.
pub(crate) type Task = Box<dyn FnOnce() -> Result<(), Fault> + Send>;

/// One unit of work. Immutable once enqueued; consumed by processing.
pub(crate) enum WorkItem {
  /// Decode and deliver one event to one listener.
  Deliver(Delivery),
  /// Bring the tracker's native subscription up if it has callbacks.
  StartTracker(Arc<Tracker>),
  /// Tear the tracker's native subscription down if it has no callbacks.
  StopTracker(Arc<Tracker>),
  /// Arbitrary work.
  Task(Task),
  /// Wraps another item and signals `done` once it has been processed.
  Sync {
    item: Box<WorkItem>,
    done: Arc<Completion>,
  },
}

impl fmt::Debug for WorkItem {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Deliver(d) => f.debug_tuple("Deliver").field(d).finish(),
      Self::StartTracker(t) => f.debug_tuple("StartTracker").field(&t.kind()).finish(),
      Self::StopTracker(t) => f.debug_tuple("StopTracker").field(&t.kind()).finish(),
      Self::Task(_) => f.write_str("Task"),
      Self::Sync { item, .. } => f.debug_struct("Sync").field("item", item).finish_non_exhaustive(),
    }
  }
}

impl WorkItem {
  pub(crate) fn task(f: impl FnOnce() -> Result<(), Fault> + Send + 'static) -> Self {
    Self::Task(Box::new(f))
  }

  /// Run the item, turning panics from client code into recoverable faults.
  pub(crate) fn run(self) -> Result<(), Fault> {
    match catch_unwind(AssertUnwindSafe(move || self.process())) {
      Ok(result) => result,
      Err(payload) => Err(Fault::Recoverable(panic_message(payload.as_ref()))),
    }
  }

  fn process(self) -> Result<(), Fault> {
    match self {
      Self::Deliver(delivery) => delivery.deliver(),
      Self::StartTracker(tracker) => tracker.reconcile(),
      Self::StopTracker(tracker) => tracker.reconcile(),
      Self::Task(task) => task(),
      Self::Sync { item, done } => {
        // Signals on drop, so a panic inside `item` still wakes the waiter.
        let _signal = CompletionGuard(done);
        item.process()
      }
    }
  }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_owned()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "panic in work item".to_owned()
  }
}

/// Private completion event for a synchronous post.
#[derive(Debug, Default)]
pub(crate) struct Completion {
  done: Mutex<bool>,
  signal: Condvar,
}

impl Completion {
  pub(crate) fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub(crate) fn set(&self) {
    *self.done.lock() = true;
    self.signal.notify_all();
  }

  /// Block until set or until `timeout` elapses. Returns whether it was set.
  pub(crate) fn wait(&self, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let mut done = self.done.lock();
    while !*done {
      if self.signal.wait_until(&mut done, deadline).timed_out() {
        return *done;
      }
    }
    true
  }
}

struct CompletionGuard(Arc<Completion>);

impl Drop for CompletionGuard {
  fn drop(&mut self) {
    self.0.set();
  }
}
