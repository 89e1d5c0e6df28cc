/*!
Single-worker FIFO dispatch queue.

Producers (native callback threads, OS hook threads, client threads) only
ever enqueue. One dedicated worker alternates between draining the native
message pump and draining the queue, then sleeps until either more work or
a pending message wakes it.
*/

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use super::work::{Completion, WorkItem};
use crate::platform::MessagePump;
use crate::types::{DispatchError, Fault};

#[derive(Default)]
struct QueueState {
  items: VecDeque<WorkItem>,
  running: bool,
  quitting: bool,
  message_pending: bool,
  /// Set when a fatal fault stopped the worker.
  terminated: Option<String>,
}

#[derive(Default)]
struct Shared {
  state: Mutex<QueueState>,
  signal: Condvar,
}

/// Dispatch queue with one dedicated worker thread.
pub(crate) struct DispatchQueue {
  shared: Arc<Shared>,
  worker: Mutex<Option<JoinHandle<()>>>,
  worker_id: Mutex<Option<ThreadId>>,
  pump: Mutex<Option<Box<dyn MessagePump>>>,
  thread_name: String,
}

impl std::fmt::Debug for DispatchQueue {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("DispatchQueue")
      .field("thread_name", &self.thread_name)
      .finish_non_exhaustive()
  }
}

impl DispatchQueue {
  pub(crate) fn new(thread_name: impl Into<String>, pump: Option<Box<dyn MessagePump>>) -> Self {
    Self {
      shared: Arc::new(Shared::default()),
      worker: Mutex::new(None),
      worker_id: Mutex::new(None),
      pump: Mutex::new(pump),
      thread_name: thread_name.into(),
    }
  }

  /// Start the worker. Idempotent while running.
  pub(crate) fn start(&self) -> Result<(), DispatchError> {
    let mut worker = self.worker.lock();
    {
      let mut state = self.shared.state.lock();
      if let Some(reason) = &state.terminated {
        return Err(DispatchError::WorkerTerminated(reason.clone()));
      }
      if state.quitting {
        return Err(DispatchError::Quitting);
      }
      if state.running {
        return Ok(());
      }
      state.running = true;
    }

    let shared = Arc::clone(&self.shared);
    let pump = self.pump.lock().take();
    let spawned = thread::Builder::new()
      .name(self.thread_name.clone())
      .spawn(move || worker_loop(&shared, pump));

    match spawned {
      Ok(handle) => {
        *self.worker_id.lock() = Some(handle.thread().id());
        *worker = Some(handle);
        log::debug!("Dispatch worker '{}' started", self.thread_name);
        Ok(())
      }
      Err(e) => {
        self.shared.state.lock().running = false;
        Err(DispatchError::Spawn(e.to_string()))
      }
    }
  }

  pub(crate) fn is_running(&self) -> bool {
    let state = self.shared.state.lock();
    state.running && !state.quitting
  }

  /// Whether the calling thread is this queue's worker.
  pub(crate) fn is_worker_thread(&self) -> bool {
    *self.worker_id.lock() == Some(thread::current().id())
  }

  /// Enqueue without waiting. Preserves posting order.
  pub(crate) fn post(&self, item: WorkItem) -> Result<(), DispatchError> {
    let mut state = self.shared.state.lock();
    if let Some(reason) = &state.terminated {
      return Err(DispatchError::WorkerTerminated(reason.clone()));
    }
    if state.quitting {
      return Err(DispatchError::Quitting);
    }
    if !state.running {
      return Err(DispatchError::NotRunning);
    }
    log::trace!("Posting {item:?}");
    state.items.push_back(item);
    drop(state);
    self.shared.signal.notify_one();
    Ok(())
  }

  /// Enqueue and block until the item has run or `timeout` elapses.
  ///
  /// Returns `Ok(false)` on timeout. A timeout means "outcome unknown", not
  /// failure: the item may still run later. From the worker thread itself the
  /// item runs inline.
  pub(crate) fn post_and_wait(&self, item: WorkItem, timeout: Duration) -> Result<bool, DispatchError> {
    if self.is_worker_thread() {
      if let Err(fault) = item.run() {
        log::warn!("Inline work item failed: {fault}");
      }
      return Ok(true);
    }

    let done = Completion::new();
    self.post(WorkItem::Sync {
      item: Box::new(item),
      done: Arc::clone(&done),
    })?;

    let completed = done.wait(timeout);
    if !completed {
      log::debug!("Synchronous post timed out after {timeout:?}; proceeding");
    }
    Ok(completed)
  }

  /// Handle the native layer uses to wake the worker for pending messages.
  pub(crate) fn waker(&self) -> QueueWaker {
    QueueWaker {
      shared: Arc::downgrade(&self.shared),
    }
  }

  /// Stop accepting work, drain what is queued, and join the worker.
  pub(crate) fn stop(&self) {
    {
      let mut state = self.shared.state.lock();
      if state.quitting || !state.running {
        state.quitting = true;
        drop(state);
        self.join();
        return;
      }
      state.quitting = true;
    }
    self.shared.signal.notify_all();
    self.join();
  }

  fn join(&self) {
    let handle = self.worker.lock().take();
    let Some(handle) = handle else {
      return;
    };
    if handle.thread().id() == thread::current().id() {
      // Stopped from inside a work item; the loop exits after this batch.
      return;
    }
    if handle.join().is_err() {
      log::error!("Dispatch worker '{}' panicked", self.thread_name);
    }
    log::debug!("Dispatch worker '{}' stopped", self.thread_name);
  }
}

impl Drop for DispatchQueue {
  fn drop(&mut self) {
    self.stop();
  }
}

/// Wakes the worker so it drains its message pump.
#[derive(Debug, Clone)]
pub struct QueueWaker {
  shared: Weak<Shared>,
}

impl QueueWaker {
  /// Signal that native messages are pending for the worker thread.
  pub fn message_available(&self) {
    let Some(shared) = self.shared.upgrade() else {
      return;
    };
    shared.state.lock().message_pending = true;
    shared.signal.notify_one();
  }
}

fn worker_loop(shared: &Shared, mut pump: Option<Box<dyn MessagePump>>) {
  loop {
    if let Some(pump) = pump.as_mut() {
      pump.drain();
    }

    let batch = {
      let mut state = shared.state.lock();
      while state.items.is_empty() && !state.quitting && !state.message_pending {
        shared.signal.wait(&mut state);
      }
      state.message_pending = false;
      if state.items.is_empty() && state.quitting {
        state.running = false;
        return;
      }
      std::mem::take(&mut state.items)
    };

    for item in batch {
      match item.run() {
        Ok(()) => {}
        Err(Fault::Recoverable(reason)) => {
          log::warn!("Work item failed: {reason}");
        }
        Err(Fault::Fatal(reason)) => {
          log::error!("Fatal fault on dispatch worker, stopping: {reason}");
          let mut state = shared.state.lock();
          state.terminated = Some(reason);
          state.running = false;
          state.items.clear();
          return;
        }
      }
    }
  }
}
