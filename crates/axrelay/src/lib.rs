/*!
Axrelay - client-side accessibility event relay

Decodes remote accessibility tree caches, multiplexes native notification
hooks onto one ordered dispatch worker, routes events to scoped listeners
and resolves proxy providers for native windows. The OS side is supplied by
the caller through [`NativeProvider`] and [`NativeEventSource`].

```ignore
use axrelay::{AutomationClient, CacheSpec, EventId, ListenerRequest, PropertyId, TreeScope};

let client = AutomationClient::new(provider, source)?;

// Hear every focus change under the root, with each source's name prefetched
let request = ListenerRequest::new(EventId::FOCUS_CHANGED, client_root)
    .with_scope(TreeScope::SUBTREE)
    .with_cache(CacheSpec::properties([PropertyId::NAME]));
let mut events = client.event_stream(request)?;
while let Ok(event) = events.recv().await {
    // handle event
}

// Worker and native hooks stop when the last clone is dropped
drop(client);
```
*/

mod cache;
mod config;
mod core;
mod dispatch;
mod platform;
mod proxy;
mod tracking;

#[cfg(test)]
mod testing;

mod types;
pub use types::*;

pub use crate::cache::{CachedValue, ChildLink, Children, ElementNode, ElementTree, NodeId};
pub use crate::config::ClientConfig;
pub use crate::core::{
  AutomationClient, ClientBuilder, DeliveredEvent, EventStream, ListenerCallback, ListenerRequest,
};
pub use crate::dispatch::QueueWaker;
pub use crate::platform::{
  HandleReleaser, HookToken, MessagePump, NativeEventKind, NativeEventSource, NativeNotification,
  NativeProvider, RemoteHandle,
};
pub use crate::proxy::{
  DescriptorFlags, ElementProvider, ProxyDescriptor, ProxyFactory, ProxyResolver, WindowClassInfo,
  PSEUDO_PREFIX,
};
pub use crate::tracking::{NativeSink, TrackerKind};
