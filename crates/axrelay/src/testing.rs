/*!
Scripted collaborators for unit tests.

`MockProvider` models a small element tree keyed by runtime id plus a table
of native windows. `MockEventSource` records subscriptions and lets a test
raise notifications into live sinks.
*/

#![allow(clippy::unwrap_used, clippy::expect_used, unreachable_pub)]

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::platform::{
  HandleReleaser, HookToken, NativeEventKind, NativeEventSource, NativeNotification, NativeProvider,
};
use crate::tracking::NativeSink;
use crate::types::{
  CacheCell, CacheMatrix, CacheResponse, CacheSpec, NativeTarget, PropertyId, PropertyValue,
  ProviderError, RawHandle, RuntimeId, WindowHandle,
};

#[derive(Debug, Default)]
struct ProviderState {
  root: RuntimeId,
  /// Live elements and their parents.
  parents: HashMap<RuntimeId, Option<RuntimeId>>,
  windows: HashMap<WindowHandle, RuntimeId>,
  window_properties: HashMap<(WindowHandle, PropertyId), PropertyValue>,
  rich: HashSet<WindowHandle>,
  classes: HashMap<WindowHandle, (String, Option<String>)>,
  images: HashMap<WindowHandle, String>,
  responses: HashMap<RuntimeId, CacheResponse>,
  fetches: Vec<RuntimeId>,
  released: Vec<RawHandle>,
}

#[derive(Debug)]
pub struct MockProvider {
  state: Mutex<ProviderState>,
  next_handle: AtomicU64,
}

impl MockProvider {
  /// A provider whose tree is just the root `[42]`.
  pub fn new() -> Self {
    let root = RuntimeId::new(vec![42]);
    let mut state = ProviderState {
      root: root.clone(),
      ..ProviderState::default()
    };
    state.parents.insert(root, None);
    Self {
      state: Mutex::new(state),
      next_handle: AtomicU64::new(1000),
    }
  }

  pub fn root_id(&self) -> RuntimeId {
    self.state.lock().root.clone()
  }

  pub fn add_element(&self, id: RuntimeId, parent: RuntimeId) {
    self.state.lock().parents.insert(id, Some(parent));
  }

  pub fn add_window(&self, window: WindowHandle, id: RuntimeId, parent: RuntimeId) {
    let mut state = self.state.lock();
    state.parents.insert(id.clone(), Some(parent));
    state.windows.insert(window, id);
  }

  /// The element stops answering, as if its window was destroyed.
  pub fn remove_element(&self, id: &RuntimeId) {
    self.state.lock().parents.remove(id);
  }

  pub fn set_window_property(&self, window: WindowHandle, property: PropertyId, value: PropertyValue) {
    self.state.lock().window_properties.insert((window, property), value);
  }

  pub fn set_rich_provider(&self, window: WindowHandle) {
    self.state.lock().rich.insert(window);
  }

  pub fn set_class(&self, window: WindowHandle, class: &str, real_class: Option<&str>) {
    self
      .state
      .lock()
      .classes
      .insert(window, (class.to_owned(), real_class.map(str::to_owned)));
  }

  pub fn set_image(&self, window: WindowHandle, image: &str) {
    self.state.lock().images.insert(window, image.to_owned());
  }

  /// Serve a fixed response for one element instead of the generated one.
  pub fn set_response(&self, id: RuntimeId, response: CacheResponse) {
    self.state.lock().responses.insert(id, response);
  }

  pub fn fetches(&self) -> Vec<RuntimeId> {
    self.state.lock().fetches.clone()
  }

  pub fn released(&self) -> Vec<RawHandle> {
    self.state.lock().released.clone()
  }

  /// One data row for `id`: a fresh handle in full mode, the runtime id's
  /// string form for `NAME`, empty cells for everything else.
  fn generated_row(&self, id: &RuntimeId, spec: &CacheSpec) -> Vec<CacheCell> {
    let mut row = Vec::with_capacity(spec.row_width());
    if spec.has_reference_column() {
      row.push(CacheCell::Handle(RawHandle(self.next_handle.fetch_add(1, Ordering::Relaxed))));
    }
    for property in &spec.properties {
      row.push(if *property == PropertyId::NAME {
        CacheCell::Value(PropertyValue::String(id.to_string()))
      } else {
        CacheCell::Empty
      });
    }
    row.extend(spec.patterns.iter().map(|_| CacheCell::Empty));
    row
  }
}

impl HandleReleaser for MockProvider {
  fn release(&self, raw: RawHandle) {
    self.state.lock().released.push(raw);
  }
}

impl NativeProvider for MockProvider {
  fn fetch_cache(&self, element: &RuntimeId, spec: &CacheSpec) -> Result<CacheResponse, ProviderError> {
    let canned = {
      let mut state = self.state.lock();
      if !state.parents.contains_key(element) {
        return Err(ProviderError::ElementNotAvailable);
      }
      state.fetches.push(element.clone());
      state.responses.get(element).cloned()
    };
    Ok(canned.unwrap_or_else(|| {
      CacheResponse::new("P)", CacheMatrix::new(vec![self.generated_row(element, spec)]))
    }))
  }

  fn parent(&self, element: &RuntimeId) -> Result<Option<RuntimeId>, ProviderError> {
    self
      .state
      .lock()
      .parents
      .get(element)
      .cloned()
      .ok_or(ProviderError::ElementNotAvailable)
  }

  fn root(&self) -> RuntimeId {
    self.root_id()
  }

  fn identity_of(&self, target: NativeTarget) -> Result<RuntimeId, ProviderError> {
    let state = self.state.lock();
    match state.windows.get(&target.window) {
      Some(id) if target.is_window() => Ok(id.clone()),
      Some(id) => {
        let mut parts = id.as_slice().to_vec();
        parts.extend([target.object_id, target.child_id]);
        Ok(RuntimeId::new(parts))
      }
      None => Err(ProviderError::ElementNotAvailable),
    }
  }

  fn has_rich_provider(&self, window: WindowHandle) -> bool {
    self.state.lock().rich.contains(&window)
  }

  fn window_property(&self, window: WindowHandle, property: PropertyId) -> Result<PropertyValue, ProviderError> {
    self
      .state
      .lock()
      .window_properties
      .get(&(window, property))
      .cloned()
      .ok_or(ProviderError::ElementNotAvailable)
  }

  fn class_name(&self, window: WindowHandle) -> Option<String> {
    self.state.lock().classes.get(&window).map(|(class, _)| class.clone())
  }

  fn real_class_name(&self, window: WindowHandle) -> Option<String> {
    self.state.lock().classes.get(&window).and_then(|(_, real)| real.clone())
  }

  fn image_name(&self, window: WindowHandle) -> Option<String> {
    self.state.lock().images.get(&window).cloned()
  }
}

#[derive(Debug)]
struct Hook {
  token: HookToken,
  kinds: Vec<NativeEventKind>,
  sink: NativeSink,
}

#[derive(Debug, Default)]
struct SourceState {
  hooks: Vec<Hook>,
  subscribe_calls: usize,
  subscribe_threads: Vec<Option<String>>,
  fail_next: bool,
  next_token: u64,
}

#[derive(Debug, Default)]
pub struct MockEventSource {
  state: Mutex<SourceState>,
}

impl MockEventSource {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn active_count(&self) -> usize {
    self.state.lock().hooks.len()
  }

  pub fn subscribe_calls(&self) -> usize {
    self.state.lock().subscribe_calls
  }

  /// Name of the thread each `subscribe` ran on.
  pub fn subscribe_threads(&self) -> Vec<Option<String>> {
    self.state.lock().subscribe_threads.clone()
  }

  pub fn last_sink(&self) -> Option<NativeSink> {
    self.state.lock().hooks.last().map(|h| h.sink.clone())
  }

  pub fn fail_next_subscribe(&self) {
    self.state.lock().fail_next = true;
  }

  /// Deliver to every live hook interested in the notification's kind, on
  /// the calling thread.
  pub fn raise(&self, notification: NativeNotification) {
    let sinks: Vec<NativeSink> = self
      .state
      .lock()
      .hooks
      .iter()
      .filter(|h| h.kinds.contains(&notification.kind))
      .map(|h| h.sink.clone())
      .collect();
    for sink in sinks {
      sink.notify(notification.clone());
    }
  }
}

impl NativeEventSource for MockEventSource {
  fn subscribe(&self, kinds: &[NativeEventKind], sink: NativeSink) -> Result<HookToken, ProviderError> {
    let mut state = self.state.lock();
    state.subscribe_calls += 1;
    state
      .subscribe_threads
      .push(std::thread::current().name().map(str::to_owned));
    if std::mem::take(&mut state.fail_next) {
      return Err(ProviderError::Native("hook refused".to_owned()));
    }
    state.next_token += 1;
    let token = HookToken(state.next_token);
    state.hooks.push(Hook {
      token,
      kinds: kinds.to_vec(),
      sink,
    });
    Ok(token)
  }

  fn unsubscribe(&self, token: HookToken) -> Result<(), ProviderError> {
    let mut state = self.state.lock();
    let before = state.hooks.len();
    state.hooks.retain(|h| h.token != token);
    if state.hooks.len() == before {
      return Err(ProviderError::Native(format!("unknown hook {token}")));
    }
    Ok(())
  }
}
