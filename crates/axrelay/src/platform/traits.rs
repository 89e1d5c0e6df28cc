/*!
Collaborator traits.

These traits define the contract between the relay core and the native
layer. The core never talks to an OS directly: a native provider answers
queries, a native event source raises low-level notifications, and an
optional message pump is drained by the dispatch worker.
*/

use super::{HandleReleaser, HookToken, NativeEventKind};
use crate::tracking::NativeSink;
use crate::types::{
  CacheResponse, CacheSpec, NativeTarget, PropertyId, PropertyValue, ProviderError, RuntimeId,
  WindowHandle,
};

/// Answers accessibility queries for remote elements and native windows.
///
/// Implementations are called from arbitrary threads, including the dispatch
/// worker and native callback threads.
pub trait NativeProvider: HandleReleaser {
  /// Fetch a cache response for the element with the given identity.
  fn fetch_cache(&self, element: &RuntimeId, spec: &CacheSpec) -> Result<CacheResponse, ProviderError>;

  /// Identity of the element's parent. `Ok(None)` for the root.
  fn parent(&self, element: &RuntimeId) -> Result<Option<RuntimeId>, ProviderError>;

  /// Identity of the root of the whole tree.
  fn root(&self) -> RuntimeId;

  /// Resolve a native address to a stable identity.
  fn identity_of(&self, target: NativeTarget) -> Result<RuntimeId, ProviderError>;

  /// Whether the window already answers through a rich provider of its own.
  fn has_rich_provider(&self, window: WindowHandle) -> bool;

  /// Read a property straight from a native window.
  fn window_property(
    &self,
    window: WindowHandle,
    property: PropertyId,
  ) -> Result<PropertyValue, ProviderError>;

  /// Apparent (possibly subclassed) window class name.
  fn class_name(&self, window: WindowHandle) -> Option<String>;

  /// Real class name the window was subclassed from.
  fn real_class_name(&self, window: WindowHandle) -> Option<String>;

  /// Executable image name of the process owning the window.
  fn image_name(&self, window: WindowHandle) -> Option<String>;
}

/// Raises low-level OS notifications.
pub trait NativeEventSource: Send + Sync {
  /// Start delivering the given kinds to `sink`. Called on the dispatch worker.
  fn subscribe(&self, kinds: &[NativeEventKind], sink: NativeSink) -> Result<HookToken, ProviderError>;

  /// Stop a subscription. Called on the dispatch worker.
  fn unsubscribe(&self, token: HookToken) -> Result<(), ProviderError>;
}

/// Native message loop owned by the dispatch worker thread.
pub trait MessagePump: Send {
  /// Process every message currently pending. Must not block.
  fn drain(&mut self);
}
