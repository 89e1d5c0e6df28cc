/*!
Scope containment: does a listener attached to `reference` with `scope`
hear an event raised on `source`?

Identity comparison is tried first. Tree walks only happen when it cannot
decide, and any element that stops answering mid-walk means "not contained".
*/

use crate::platform::NativeProvider;
use crate::types::{RuntimeId, TreeScope};

/// Walks give up past this depth rather than loop on a broken provider.
const MAX_WALK_DEPTH: usize = 1024;

pub(crate) fn contains(
  provider: &dyn NativeProvider,
  reference: &RuntimeId,
  scope: TreeScope,
  source: &RuntimeId,
) -> bool {
  if reference == source {
    return scope.contains(TreeScope::ELEMENT);
  }

  if scope.contains(TreeScope::DESCENDANTS) && *reference == provider.root() {
    return true;
  }

  if scope.intersects(TreeScope::CHILDREN | TreeScope::DESCENDANTS) {
    if let Some(depth) = distance_up(provider, source, reference) {
      if depth == 1 || scope.contains(TreeScope::DESCENDANTS) {
        return true;
      }
    }
  }

  if scope.intersects(TreeScope::PARENT | TreeScope::ANCESTORS) {
    if let Some(depth) = distance_up(provider, reference, source) {
      if depth == 1 || scope.contains(TreeScope::ANCESTORS) {
        return true;
      }
    }
  }

  false
}

/// Number of parent steps from `from` up to `ancestor`, if it is one.
fn distance_up(provider: &dyn NativeProvider, from: &RuntimeId, ancestor: &RuntimeId) -> Option<usize> {
  let mut current = from.clone();
  for depth in 1..=MAX_WALK_DEPTH {
    match provider.parent(&current) {
      Ok(Some(parent)) if parent == *ancestor => return Some(depth),
      Ok(Some(parent)) => current = parent,
      Ok(None) => return None,
      Err(e) => {
        log::debug!("Scope walk stopped at {current}: {e}");
        return None;
      }
    }
  }
  log::warn!("Scope walk from {from} exceeded {MAX_WALK_DEPTH} levels");
  None
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::MockProvider;

  /// root [42] > app [1] > button [1, 1] > label [1, 1, 1]
  fn tree() -> (MockProvider, RuntimeId, RuntimeId, RuntimeId, RuntimeId) {
    let provider = MockProvider::new();
    let root = provider.root_id();
    let app = RuntimeId::new(vec![1]);
    let button = RuntimeId::new(vec![1, 1]);
    let label = RuntimeId::new(vec![1, 1, 1]);
    provider.add_element(app.clone(), root.clone());
    provider.add_element(button.clone(), app.clone());
    provider.add_element(label.clone(), button.clone());
    (provider, root, app, button, label)
  }

  #[test]
  fn element_scope_is_identity() {
    let (p, _, app, button, _) = tree();
    assert!(contains(&p, &app, TreeScope::ELEMENT, &app));
    assert!(!contains(&p, &app, TreeScope::ELEMENT, &button));
    assert!(!contains(&p, &app, TreeScope::CHILDREN, &app));
  }

  #[test]
  fn children_versus_descendants() {
    let (p, _, app, button, label) = tree();
    assert!(contains(&p, &app, TreeScope::CHILDREN, &button));
    assert!(!contains(&p, &app, TreeScope::CHILDREN, &label));
    assert!(contains(&p, &app, TreeScope::DESCENDANTS, &label));
    assert!(!contains(&p, &button, TreeScope::DESCENDANTS, &app));
  }

  #[test]
  fn parent_versus_ancestors() {
    let (p, root, app, button, label) = tree();
    assert!(contains(&p, &label, TreeScope::PARENT, &button));
    assert!(!contains(&p, &label, TreeScope::PARENT, &app));
    assert!(contains(&p, &label, TreeScope::ANCESTORS, &root));
    assert!(!contains(&p, &app, TreeScope::ANCESTORS, &label));
  }

  #[test]
  fn subtree_of_root_short_circuits() {
    let (p, root, ..) = tree();
    let stranger = RuntimeId::new(vec![9, 9]);
    assert!(contains(&p, &root, TreeScope::SUBTREE, &stranger));
    assert!(p.fetches().is_empty());
  }

  #[test]
  fn unavailable_source_is_not_contained() {
    let (p, _, app, button, label) = tree();
    p.remove_element(&button);
    assert!(!contains(&p, &app, TreeScope::DESCENDANTS, &label));
    assert!(contains(&p, &label, TreeScope::ELEMENT, &label), "identity needs no walk");
  }
}
