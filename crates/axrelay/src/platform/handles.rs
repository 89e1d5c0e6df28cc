/*! Owned remote references.

Raw references arrive in cache matrices. Decoding wraps each one in a
[`RemoteHandle`], which releases it exactly once when the last clone drops.
*/

use std::fmt;
use std::sync::Arc;

use crate::types::RawHandle;

/// Releases raw remote references.
pub trait HandleReleaser: Send + Sync {
  /// Release a reference previously handed out in a cache response.
  fn release(&self, raw: RawHandle);
}

struct HandleInner {
  raw: RawHandle,
  releaser: Arc<dyn HandleReleaser>,
}

impl Drop for HandleInner {
  fn drop(&mut self) {
    self.releaser.release(self.raw);
  }
}

/// Owned remote reference. Clone is cheap (reference counted).
#[derive(Clone)]
pub struct RemoteHandle {
  inner: Arc<HandleInner>,
}

impl RemoteHandle {
  pub(crate) fn new(raw: RawHandle, releaser: Arc<dyn HandleReleaser>) -> Self {
    Self {
      inner: Arc::new(HandleInner { raw, releaser }),
    }
  }

  /// The wrapped raw reference. Still owned by this handle.
  pub fn raw(&self) -> RawHandle {
    self.inner.raw
  }
}

impl fmt::Debug for RemoteHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("RemoteHandle").field(&self.inner.raw).finish()
  }
}

impl PartialEq for RemoteHandle {
  fn eq(&self, other: &Self) -> bool {
    self.inner.raw == other.inner.raw
  }
}
