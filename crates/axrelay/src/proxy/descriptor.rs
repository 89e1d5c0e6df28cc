/*! Proxy descriptors and the factories they carry. */

use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

use crate::types::{PropertyId, PropertyValue, WindowHandle};

/// Class names starting with this mark pseudo descriptors.
pub const PSEUDO_PREFIX: char = '#';

/// A provider produced by a proxy factory for one native object.
pub trait ElementProvider: Send + Sync {
  /// Window the provider was created for.
  fn window(&self) -> WindowHandle;

  /// Native object id within that window.
  fn object_id(&self) -> i32;

  /// Property value as this provider sees it. `None` defers to the default.
  fn property(&self, _property: PropertyId) -> Option<PropertyValue> {
    None
  }
}

impl fmt::Debug for dyn ElementProvider {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ElementProvider")
      .field("window", &self.window())
      .field("object_id", &self.object_id())
      .finish()
  }
}

/// Creates providers for windows a descriptor matched. May decline.
pub trait ProxyFactory: Send + Sync {
  /// Build a provider for `object_id` in `window`, or `None` to let the next
  /// candidate try.
  fn create(&self, window: WindowHandle, object_id: i32) -> Option<Box<dyn ElementProvider>>;
}

impl<F> ProxyFactory for F
where
  F: Fn(WindowHandle, i32) -> Option<Box<dyn ElementProvider>> + Send + Sync,
{
  fn create(&self, window: WindowHandle, object_id: i32) -> Option<Box<dyn ElementProvider>> {
    self(window, object_id)
  }
}

/// Matching flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DescriptorFlags(u8);

impl DescriptorFlags {
  pub const NONE: Self = Self(0);
  /// Class name matches anywhere inside the window's class.
  pub const SUBSTRING: Self = Self(0x01);
  /// Never match against the real (unsubclassed) class name.
  pub const DISALLOW_BASE_CLASS: Self = Self(0x02);

  pub const fn contains(self, other: Self) -> bool {
    self.0 & other.0 == other.0
  }
}

impl BitOr for DescriptorFlags {
  type Output = Self;

  fn bitor(self, rhs: Self) -> Self {
    Self(self.0 | rhs.0)
  }
}

/// One registration: predicates plus the factory to use when they match.
#[derive(Clone)]
pub struct ProxyDescriptor {
  class_name: Option<String>,
  image_name: Option<String>,
  flags: DescriptorFlags,
  factory: Arc<dyn ProxyFactory>,
}

impl fmt::Debug for ProxyDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ProxyDescriptor")
      .field("class_name", &self.class_name)
      .field("image_name", &self.image_name)
      .field("flags", &self.flags)
      .finish_non_exhaustive()
  }
}

impl ProxyDescriptor {
  /// Exact class-name match. A `#`-prefixed name makes a pseudo descriptor.
  pub fn for_class(class_name: impl Into<String>, factory: Arc<dyn ProxyFactory>) -> Self {
    Self {
      class_name: Some(class_name.into()),
      image_name: None,
      flags: DescriptorFlags::NONE,
      factory,
    }
  }

  /// Matches any window whose class contains `fragment`.
  pub fn class_substring(fragment: impl Into<String>, factory: Arc<dyn ProxyFactory>) -> Self {
    Self::for_class(fragment, factory).with_flags(DescriptorFlags::SUBSTRING)
  }

  /// Matches any window owned by the named executable.
  pub fn for_image(image_name: impl Into<String>, factory: Arc<dyn ProxyFactory>) -> Self {
    Self {
      class_name: None,
      image_name: Some(image_name.into()),
      flags: DescriptorFlags::NONE,
      factory,
    }
  }

  /// Matches every window. Tried last.
  pub fn catch_all(factory: Arc<dyn ProxyFactory>) -> Self {
    Self {
      class_name: None,
      image_name: None,
      flags: DescriptorFlags::NONE,
      factory,
    }
  }

  #[must_use]
  pub fn with_image(mut self, image_name: impl Into<String>) -> Self {
    self.image_name = Some(image_name.into());
    self
  }

  #[must_use]
  pub const fn with_flags(mut self, flags: DescriptorFlags) -> Self {
    self.flags = flags;
    self
  }

  pub fn class_name(&self) -> Option<&str> {
    self.class_name.as_deref()
  }

  pub fn image_name(&self) -> Option<&str> {
    self.image_name.as_deref()
  }

  pub const fn flags(&self) -> DescriptorFlags {
    self.flags
  }

  pub fn factory(&self) -> &Arc<dyn ProxyFactory> {
    &self.factory
  }

  pub fn is_pseudo(&self) -> bool {
    self
      .class_name
      .as_deref()
      .is_some_and(|c| c.starts_with(PSEUDO_PREFIX))
  }

  /// Pseudo name without the prefix.
  pub(crate) fn pseudo_name(&self) -> Option<&str> {
    self.class_name.as_deref()?.strip_prefix(PSEUDO_PREFIX)
  }

  pub(crate) fn allows_base_class(&self) -> bool {
    !self.flags.contains(DescriptorFlags::DISALLOW_BASE_CLASS)
  }

  pub(crate) fn is_substring(&self) -> bool {
    self.flags.contains(DescriptorFlags::SUBSTRING)
  }

  /// Image predicate. Passes when there is none; fails when the window's
  /// image is unknown.
  pub(crate) fn image_matches(&self, image: Option<&str>) -> bool {
    match (&self.image_name, image) {
      (None, _) => true,
      (Some(wanted), Some(image)) => wanted.eq_ignore_ascii_case(image),
      (Some(_), None) => false,
    }
  }
}
