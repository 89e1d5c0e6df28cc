/*!
Async event streams.

A stream is an ordinary listener whose callback forwards into an
`async_broadcast` channel. Dropping the stream removes the listener.
*/

use async_broadcast::{Receiver, RecvError, TryRecvError};
use std::sync::{Arc, Weak};

use super::registry::{DeliveredEvent, ListenerCallback, ListenerRegistry};
use crate::types::ListenerId;

/// Receiving end of [`AutomationClient::event_stream`](crate::AutomationClient::event_stream).
///
/// When the buffer is full the oldest event is dropped and the next receive
/// reports how many were lost.
pub struct EventStream {
  receiver: Receiver<Arc<DeliveredEvent>>,
  listener: ListenerId,
  registry: Weak<ListenerRegistry>,
}

impl std::fmt::Debug for EventStream {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("EventStream")
      .field("listener", &self.listener)
      .field("buffered", &self.receiver.len())
      .finish_non_exhaustive()
  }
}

impl EventStream {
  /// Channel plus the callback that feeds it. The stream is bound to its
  /// listener once subscribed.
  pub(crate) fn channel(capacity: usize) -> (ListenerCallback, Receiver<Arc<DeliveredEvent>>) {
    let (mut tx, rx) = async_broadcast::broadcast(capacity);
    tx.set_overflow(true); // Drop oldest messages when full

    let callback: ListenerCallback = Arc::new(move |event: &DeliveredEvent| {
      let event = Arc::new(DeliveredEvent {
        listener: event.listener,
        event_id: event.event_id,
        element: event.element.clone(),
        args: event.args.clone(),
      });
      if let Err(e) = tx.try_broadcast(event) {
        log::trace!("Event stream closed: {e}");
      }
    });
    (callback, rx)
  }

  pub(crate) const fn new(
    receiver: Receiver<Arc<DeliveredEvent>>,
    listener: ListenerId,
    registry: Weak<ListenerRegistry>,
  ) -> Self {
    Self {
      receiver,
      listener,
      registry,
    }
  }

  /// Listener backing this stream.
  pub const fn listener(&self) -> ListenerId {
    self.listener
  }

  /// Wait for the next event.
  pub async fn recv(&mut self) -> Result<Arc<DeliveredEvent>, RecvError> {
    self.receiver.recv().await
  }

  /// Next event if one is buffered.
  pub fn try_recv(&mut self) -> Result<Arc<DeliveredEvent>, TryRecvError> {
    self.receiver.try_recv()
  }

  /// Events currently buffered.
  pub fn len(&self) -> usize {
    self.receiver.len()
  }

  pub fn is_empty(&self) -> bool {
    self.receiver.is_empty()
  }
}

impl Drop for EventStream {
  fn drop(&mut self) {
    if let Some(registry) = self.registry.upgrade() {
      registry.remove_listener(self.listener);
    }
  }
}
