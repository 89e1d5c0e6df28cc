/*!
The automation client: owns the listener registry, dispatch worker and proxy
table for one native provider.

# Module Structure

- `mod.rs` - `AutomationClient`, construction, decoding, flushing
- `registry/` - listener records, scope tests, dispatch
- `subscriptions.rs` - subscribe/unsubscribe, dispatch, event streams
- `proxies.rs` - proxy registration and resolution
- `stream.rs` - `EventStream`

# Example

```ignore
let client = AutomationClient::builder(provider, source)
    .sync_post_timeout(Duration::from_millis(500))
    .build()?;

let request = ListenerRequest::new(EventId::INVOKED, root_id)
    .with_scope(TreeScope::SUBTREE)
    .with_cache(CacheSpec::properties([PropertyId::NAME]));
client.subscribe(request, Arc::new(|event: &DeliveredEvent| {
    // runs on the dispatch worker
}))?;
```
*/

mod proxies;
mod registry;
mod stream;
mod subscriptions;

pub(crate) use registry::Delivery;
pub use registry::{DeliveredEvent, ListenerCallback, ListenerRequest};
pub use stream::EventStream;

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{self, ElementTree};
use crate::config::ClientConfig;
use crate::dispatch::{DispatchQueue, QueueWaker, WorkItem};
use crate::platform::{HandleReleaser, MessagePump, NativeEventSource, NativeProvider};
use crate::proxy::ProxyResolver;
use crate::tracking::TrackerKind;
use crate::types::{CacheResponse, CacheSpec, RawHandle, RelayError, RelayResult};
use registry::ListenerRegistry;

/// Releases decoded handles through the provider that issued them.
struct ProviderReleaser(Arc<dyn NativeProvider>);

impl HandleReleaser for ProviderReleaser {
  fn release(&self, raw: RawHandle) {
    self.0.release(raw);
  }
}

/// Client context. Clone is cheap (Arc bumps); the worker stops when the
/// last clone is dropped.
pub struct AutomationClient {
  registry: Arc<ListenerRegistry>,
  proxies: Arc<RwLock<ProxyResolver>>,
  provider: Arc<dyn NativeProvider>,
  releaser: Arc<dyn HandleReleaser>,
  config: Arc<ClientConfig>,
}

impl Clone for AutomationClient {
  fn clone(&self) -> Self {
    Self {
      registry: Arc::clone(&self.registry),
      proxies: Arc::clone(&self.proxies),
      provider: Arc::clone(&self.provider),
      releaser: Arc::clone(&self.releaser),
      config: Arc::clone(&self.config),
    }
  }
}

impl std::fmt::Debug for AutomationClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AutomationClient")
      .field("registry", &self.registry)
      .field("config", &self.config)
      .finish_non_exhaustive()
  }
}

/// Builder for configuring an [`AutomationClient`].
#[must_use = "Builder does nothing until .build() is called"]
pub struct ClientBuilder {
  provider: Arc<dyn NativeProvider>,
  source: Arc<dyn NativeEventSource>,
  config: ClientConfig,
  pump: Option<Box<dyn MessagePump>>,
}

impl std::fmt::Debug for ClientBuilder {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ClientBuilder")
      .field("config", &self.config)
      .field("message_pump", &self.pump.is_some())
      .finish_non_exhaustive()
  }
}

impl ClientBuilder {
  /// Bound on synchronous posts (tracker start/stop). Default: 2000ms.
  pub fn sync_post_timeout(mut self, timeout: Duration) -> Self {
    self.config.sync_post_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    self
  }

  /// Stale focus window in source ticks. Default: 5000.
  pub const fn focus_stale_window(mut self, ticks: u32) -> Self {
    self.config.focus_stale_window = ticks;
    self
  }

  /// Name of the dispatch worker thread.
  pub fn worker_name(mut self, name: impl Into<String>) -> Self {
    self.config.worker_name = name.into();
    self
  }

  /// Buffer size for each [`EventStream`]. Default: 5000.
  pub const fn stream_capacity(mut self, capacity: usize) -> Self {
    self.config.stream_capacity = capacity;
    self
  }

  /// Native message loop drained by the worker between work items.
  pub fn message_pump(mut self, pump: impl MessagePump + 'static) -> Self {
    self.pump = Some(Box::new(pump));
    self
  }

  /// Replace every setting at once.
  pub fn config(mut self, config: ClientConfig) -> Self {
    self.config = config;
    self
  }

  /// Build the client. The worker thread starts with the first subscription.
  pub fn build(self) -> RelayResult<AutomationClient> {
    if self.config.stream_capacity == 0 {
      return Err(RelayError::InvalidArgument("stream capacity must be positive".into()));
    }
    if self.config.worker_name.is_empty() {
      return Err(RelayError::InvalidArgument("worker name is empty".into()));
    }

    let releaser: Arc<dyn HandleReleaser> = Arc::new(ProviderReleaser(self.provider.clone()));
    let queue = Arc::new(DispatchQueue::new(self.config.worker_name.clone(), self.pump));
    let registry = ListenerRegistry::new(
      queue,
      self.provider.clone(),
      releaser.clone(),
      self.source,
      self.config.sync_post_timeout(),
      self.config.focus_stale_window,
    );

    Ok(AutomationClient {
      registry,
      proxies: Arc::new(RwLock::new(ProxyResolver::new())),
      provider: self.provider,
      releaser,
      config: Arc::new(self.config),
    })
  }
}

impl AutomationClient {
  /// Create a builder around the native collaborators.
  pub fn builder(provider: Arc<dyn NativeProvider>, source: Arc<dyn NativeEventSource>) -> ClientBuilder {
    ClientBuilder {
      provider,
      source,
      config: ClientConfig::default(),
      pump: None,
    }
  }

  /// Create a client with default settings.
  pub fn new(provider: Arc<dyn NativeProvider>, source: Arc<dyn NativeEventSource>) -> RelayResult<Self> {
    Self::builder(provider, source).build()
  }

  pub fn config(&self) -> &ClientConfig {
    &self.config
  }

  /// Decode a cache response fetched outside the event path.
  pub fn decode(&self, response: CacheResponse, spec: &Arc<CacheSpec>) -> RelayResult<Option<ElementTree>> {
    let rows = response.matrix.into_rows();
    Ok(cache::decode(&response.shape, rows, spec, &self.releaser)?)
  }

  /// Wait until everything posted so far has been processed. `Ok(false)` if
  /// `timeout` expired first.
  pub fn flush(&self, timeout: Duration) -> RelayResult<bool> {
    let queue = self.registry.queue();
    if !queue.is_running() {
      return Ok(true);
    }
    Ok(queue.post_and_wait(WorkItem::task(|| Ok(())), timeout)?)
  }

  /// Handle for the native layer to signal pending messages to the worker.
  pub fn message_waker(&self) -> QueueWaker {
    self.registry.queue().waker()
  }

  /// Whether a tracker currently holds a native subscription.
  pub fn is_tracking(&self, kind: TrackerKind) -> bool {
    self.registry.is_tracking(kind)
  }

  pub fn listener_count(&self) -> usize {
    self.registry.listener_count()
  }
}
