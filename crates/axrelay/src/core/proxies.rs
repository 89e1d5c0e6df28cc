/*!
Proxy registration and resolution for [`AutomationClient`].

Window class and image names are read from the native provider, and
factories are invoked, outside the resolver lock.
*/

use std::sync::Arc;

use super::AutomationClient;
use crate::proxy::{self, ElementProvider, ProxyDescriptor, ProxyFactory, WindowClassInfo};
use crate::types::WindowHandle;

impl AutomationClient {
  /// Register a batch of descriptors ahead of earlier registrations.
  pub fn register_proxies(&self, batch: impl IntoIterator<Item = ProxyDescriptor>) {
    self.proxies.write().register(batch);
  }

  pub fn unregister_all_proxies(&self) {
    self.proxies.write().clear();
  }

  /// Factory of the highest-precedence descriptor matching the window.
  pub fn resolve_proxy(&self, window: WindowHandle) -> Option<Arc<dyn ProxyFactory>> {
    let info = WindowClassInfo::query(self.provider.as_ref(), window);
    self.proxies.read().resolve(&info)
  }

  /// First provider a matching factory agrees to create.
  pub fn create_proxy_provider(&self, window: WindowHandle, object_id: i32) -> Option<Box<dyn ElementProvider>> {
    let info = WindowClassInfo::query(self.provider.as_ref(), window);
    let factories = self.proxies.read().factories(&info);
    // Factories run without the lock held.
    proxy::create_with(factories, window, object_id)
  }

  /// Factory registered under a pseudo name such as `#NonClient`.
  pub fn resolve_pseudo_proxy(&self, name: &str) -> Option<Arc<dyn ProxyFactory>> {
    self.proxies.read().resolve_pseudo(name)
  }
}
