/*!
Proxy resolution: which provider answers for a native window.

Descriptors sit in six buckets tried in a fixed order:

1. exact apparent class
2. exact real class (skipping descriptors that disallow base-class matches)
3. apparent class substring
4. real class substring (same filter as 2)
5. image name only
6. catch-all

Buckets 1 to 4 also honor an optional image predicate. Within a bucket the
most recently registered batch is tried first; inside a batch, registration
order holds. Class and image names compare ASCII case-insensitively.

`#`-prefixed pseudo descriptors are kept apart and only found by name.
*/

mod descriptor;

pub use descriptor::{DescriptorFlags, ElementProvider, ProxyDescriptor, ProxyFactory, PSEUDO_PREFIX};

use std::sync::Arc;

use crate::platform::NativeProvider;
use crate::types::WindowHandle;

/// What resolution needs to know about a window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowClassInfo {
  pub class_name: Option<String>,
  pub real_class_name: Option<String>,
  pub image_name: Option<String>,
}

impl WindowClassInfo {
  pub fn query(provider: &dyn NativeProvider, window: WindowHandle) -> Self {
    Self {
      class_name: provider.class_name(window),
      real_class_name: provider.real_class_name(window),
      image_name: provider.image_name(window),
    }
  }

  /// Real class, when it differs from the apparent one.
  fn base_class(&self) -> Option<&str> {
    let real = self.real_class_name.as_deref()?;
    match self.class_name.as_deref() {
      Some(apparent) if apparent.eq_ignore_ascii_case(real) => None,
      _ => Some(real),
    }
  }
}

#[derive(Debug, Default)]
pub struct ProxyResolver {
  exact: Vec<Arc<ProxyDescriptor>>,
  substring: Vec<Arc<ProxyDescriptor>>,
  image_only: Vec<Arc<ProxyDescriptor>>,
  catch_all: Vec<Arc<ProxyDescriptor>>,
  pseudo: Vec<Arc<ProxyDescriptor>>,
}

impl ProxyResolver {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a batch ahead of everything registered before it.
  pub fn register(&mut self, batch: impl IntoIterator<Item = ProxyDescriptor>) {
    let mut exact = Vec::new();
    let mut substring = Vec::new();
    let mut image_only = Vec::new();
    let mut catch_all = Vec::new();
    let mut pseudo = Vec::new();

    for descriptor in batch {
      let bucket = match (descriptor.class_name(), descriptor.image_name()) {
        (Some(_), _) if descriptor.is_pseudo() => &mut pseudo,
        (Some(_), _) if descriptor.is_substring() => &mut substring,
        (Some(_), _) => &mut exact,
        (None, Some(_)) => &mut image_only,
        (None, None) => &mut catch_all,
      };
      bucket.push(Arc::new(descriptor));
    }

    prepend(&mut self.exact, exact);
    prepend(&mut self.substring, substring);
    prepend(&mut self.image_only, image_only);
    prepend(&mut self.catch_all, catch_all);
    prepend(&mut self.pseudo, pseudo);
  }

  /// Forget every registration.
  pub fn clear(&mut self) {
    *self = Self::default();
  }

  pub fn len(&self) -> usize {
    self.exact.len() + self.substring.len() + self.image_only.len() + self.catch_all.len() + self.pseudo.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Every descriptor matching `info`, in precedence order.
  pub fn candidates<'a>(&'a self, info: &'a WindowClassInfo) -> impl Iterator<Item = &'a Arc<ProxyDescriptor>> + 'a {
    let image = info.image_name.as_deref();
    let apparent = info.class_name.as_deref();
    let base = info.base_class();

    let exact_on = move |class: Option<&'a str>, base_pass: bool| {
      self.exact.iter().filter(move |d| {
        class.is_some_and(|c| d.class_name().is_some_and(|n| n.eq_ignore_ascii_case(c)))
          && (!base_pass || d.allows_base_class())
      })
    };
    let substring_on = move |class: Option<&'a str>, base_pass: bool| {
      let class = class.map(str::to_ascii_lowercase);
      self.substring.iter().filter(move |d| {
        class
          .as_deref()
          .zip(d.class_name())
          .is_some_and(|(c, n)| c.contains(&n.to_ascii_lowercase()))
          && (!base_pass || d.allows_base_class())
      })
    };

    exact_on(apparent, false)
      .chain(exact_on(base, true))
      .chain(substring_on(apparent, false))
      .chain(substring_on(base, true))
      .filter(move |d| d.image_matches(image))
      .chain(self.image_only.iter().filter(move |d| d.image_matches(image)))
      .chain(self.catch_all.iter())
  }

  /// Factory of the first matching descriptor.
  pub fn resolve(&self, info: &WindowClassInfo) -> Option<Arc<dyn ProxyFactory>> {
    self.candidates(info).next().map(|d| d.factory().clone())
  }

  /// Factories of every matching descriptor, in precedence order.
  pub fn factories(&self, info: &WindowClassInfo) -> Vec<Arc<dyn ProxyFactory>> {
    self.candidates(info).map(|d| d.factory().clone()).collect()
  }

  /// Ask matching factories in precedence order until one produces a provider.
  pub fn create_provider(
    &self,
    info: &WindowClassInfo,
    window: WindowHandle,
    object_id: i32,
  ) -> Option<Box<dyn ElementProvider>> {
    create_with(self.factories(info), window, object_id)
  }

  /// Factory registered under a pseudo name, with or without the prefix.
  pub fn resolve_pseudo(&self, name: &str) -> Option<Arc<dyn ProxyFactory>> {
    let name = name.strip_prefix(PSEUDO_PREFIX).unwrap_or(name);
    self
      .pseudo
      .iter()
      .find(|d| d.pseudo_name().is_some_and(|n| n.eq_ignore_ascii_case(name)))
      .map(|d| d.factory().clone())
  }
}

/// First provider any of `factories` agrees to create.
pub(crate) fn create_with(
  factories: impl IntoIterator<Item = Arc<dyn ProxyFactory>>,
  window: WindowHandle,
  object_id: i32,
) -> Option<Box<dyn ElementProvider>> {
  let provider = factories
    .into_iter()
    .find_map(|factory| factory.create(window, object_id));
  if provider.is_none() {
    log::trace!("No proxy produced a provider for {window}");
  }
  provider
}

fn prepend<T>(bucket: &mut Vec<T>, mut batch: Vec<T>) {
  batch.append(bucket);
  *bucket = batch;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug)]
  struct Tagged(WindowHandle, i32);

  impl ElementProvider for Tagged {
    fn window(&self) -> WindowHandle {
      self.0
    }

    fn object_id(&self) -> i32 {
      self.1
    }
  }

  /// Factory that produces a provider tagged with `tag` as its object id.
  fn factory(tag: i32) -> Arc<dyn ProxyFactory> {
    Arc::new(move |window: WindowHandle, _object_id: i32| -> Option<Box<dyn ElementProvider>> {
      Some(Box::new(Tagged(window, tag)))
    })
  }

  fn declining() -> Arc<dyn ProxyFactory> {
    Arc::new(|_: WindowHandle, _: i32| -> Option<Box<dyn ElementProvider>> { None })
  }

  fn info(class: &str, real: Option<&str>, image: Option<&str>) -> WindowClassInfo {
    WindowClassInfo {
      class_name: Some(class.to_owned()),
      real_class_name: real.map(str::to_owned),
      image_name: image.map(str::to_owned),
    }
  }

  fn winner(resolver: &ProxyResolver, info: &WindowClassInfo) -> Option<i32> {
    resolver
      .create_provider(info, WindowHandle(1), 0)
      .map(|p| p.object_id())
  }

  #[test]
  fn exact_beats_substring_regardless_of_order() {
    let mut resolver = ProxyResolver::new();
    resolver.register([ProxyDescriptor::for_class("Button", factory(1))]);
    resolver.register([ProxyDescriptor::class_substring("Button", factory(2))]);
    assert_eq!(winner(&resolver, &info("Button", None, None)), Some(1));

    let mut reversed = ProxyResolver::new();
    reversed.register([ProxyDescriptor::class_substring("Button", factory(2))]);
    reversed.register([ProxyDescriptor::for_class("Button", factory(1))]);
    assert_eq!(winner(&reversed, &info("Button", None, None)), Some(1));
  }

  #[test]
  fn later_batch_wins_within_bucket() {
    let mut resolver = ProxyResolver::new();
    resolver.register([
      ProxyDescriptor::for_class("Edit", factory(1)),
      ProxyDescriptor::for_class("Edit", factory(2)),
    ]);
    assert_eq!(winner(&resolver, &info("Edit", None, None)), Some(1), "first in batch");

    resolver.register([ProxyDescriptor::for_class("Edit", factory(3))]);
    assert_eq!(winner(&resolver, &info("Edit", None, None)), Some(3));
  }

  #[test]
  fn real_class_respects_disallow_flag() {
    let mut resolver = ProxyResolver::new();
    resolver.register([
      ProxyDescriptor::for_class("ListBox", factory(1)).with_flags(DescriptorFlags::DISALLOW_BASE_CLASS),
    ]);
    let subclassed = info("MyList", Some("ListBox"), None);
    assert_eq!(winner(&resolver, &subclassed), None);
    assert_eq!(winner(&resolver, &info("listbox", None, None)), Some(1), "case-insensitive");

    resolver.register([ProxyDescriptor::for_class("ListBox", factory(2))]);
    assert_eq!(winner(&resolver, &subclassed), Some(2));
  }

  #[test]
  fn apparent_class_beats_real_class() {
    let mut resolver = ProxyResolver::new();
    resolver.register([
      ProxyDescriptor::for_class("ListBox", factory(1)),
      ProxyDescriptor::for_class("MyList", factory(2)),
    ]);
    assert_eq!(winner(&resolver, &info("MyList", Some("ListBox"), None)), Some(2));
  }

  #[test]
  fn image_predicate_filters_class_buckets() {
    let mut resolver = ProxyResolver::new();
    resolver.register([
      ProxyDescriptor::for_class("Pane", factory(1)).with_image("viewer.exe"),
      ProxyDescriptor::for_class("Pane", factory(2)),
    ]);
    assert_eq!(winner(&resolver, &info("Pane", None, Some("VIEWER.EXE"))), Some(1));
    assert_eq!(winner(&resolver, &info("Pane", None, Some("other.exe"))), Some(2));
    assert_eq!(winner(&resolver, &info("Pane", None, None)), Some(2));
  }

  #[test]
  fn image_only_then_catch_all() {
    let mut resolver = ProxyResolver::new();
    resolver.register([
      ProxyDescriptor::catch_all(factory(9)),
      ProxyDescriptor::for_image("tool.exe", factory(5)),
    ]);
    assert_eq!(winner(&resolver, &info("Anything", None, Some("tool.exe"))), Some(5));
    assert_eq!(winner(&resolver, &info("Anything", None, Some("x.exe"))), Some(9));
  }

  #[test]
  fn declining_factory_falls_through() {
    let mut resolver = ProxyResolver::new();
    resolver.register([
      ProxyDescriptor::for_class("Static", declining()),
      ProxyDescriptor::class_substring("Stat", factory(4)),
    ]);
    let window = info("Static", None, None);
    assert!(resolver.resolve(&window).is_some());
    assert_eq!(winner(&resolver, &window), Some(4));
  }

  #[test]
  fn pseudo_descriptors_never_compete() {
    let mut resolver = ProxyResolver::new();
    resolver.register([ProxyDescriptor::for_class("#NonClient", factory(7))]);
    assert!(resolver.resolve(&info("#NonClient", None, None)).is_none());
    assert!(resolver.resolve_pseudo("NonClient").is_some());
    assert!(resolver.resolve_pseudo("#nonclient").is_some());
    assert!(resolver.resolve_pseudo("SystemMenu").is_none());
  }

  #[test]
  fn clear_forgets_everything() {
    let mut resolver = ProxyResolver::new();
    resolver.register([ProxyDescriptor::catch_all(factory(1))]);
    assert_eq!(resolver.len(), 1);
    resolver.clear();
    assert!(resolver.is_empty());
    assert!(resolver.resolve(&WindowClassInfo::default()).is_none());
  }
}
