/*!
Subscribe/unsubscribe and event dispatch for [`AutomationClient`].

Argument errors are returned synchronously. Anything that goes wrong while
delivering is logged on the worker and never reaches the subscriber.
*/

use std::sync::Arc;

use super::registry::{ListenerCallback, ListenerRequest};
use super::stream::EventStream;
use super::AutomationClient;
use crate::types::{EventArgs, EventId, EventSource, ListenerId, RelayResult, RuntimeId};

impl AutomationClient {
  /// Register a listener. The callback runs on the dispatch worker.
  pub fn subscribe(&self, request: ListenerRequest, callback: ListenerCallback) -> RelayResult<ListenerId> {
    self.registry.subscribe(request, callback)
  }

  /// Remove listeners registered with this event id, element identity and
  /// callback. Works even if the element is no longer available.
  ///
  /// A delivery already being processed may still complete.
  pub fn unsubscribe(&self, event_id: EventId, element: &RuntimeId, callback: &ListenerCallback) -> RelayResult<()> {
    self.registry.unsubscribe(event_id, element, callback)
  }

  /// Remove one listener by id. Returns whether it existed.
  pub fn remove_listener(&self, id: ListenerId) -> bool {
    self.registry.remove_listener(id)
  }

  /// Remove every listener and stop every tracker.
  pub fn unsubscribe_all(&self) {
    self.registry.unsubscribe_all();
  }

  /// Route an event raised by a provider to every listener that hears it.
  /// Returns how many deliveries were queued.
  pub fn dispatch(&self, source: impl Into<EventSource>, args: EventArgs) -> RelayResult<usize> {
    self.registry.dispatch(source.into(), args)
  }

  /// Subscribe with a channel instead of a callback.
  pub fn event_stream(&self, request: ListenerRequest) -> RelayResult<EventStream> {
    let (callback, receiver) = EventStream::channel(self.config.stream_capacity);
    let listener = self.registry.subscribe(request, callback)?;
    Ok(EventStream::new(receiver, listener, Arc::downgrade(&self.registry)))
  }
}
