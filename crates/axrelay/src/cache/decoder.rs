/*!
Tree-cache decoder.

## Wire format

The shape is a string over `(`, `P` and `)`:

```text
node     := ('(' | 'P') children ')'
children := node*
```

A `P` opens a node and attaches the next unconsumed matrix row to it, in row
order. A plain `(` opens a node with no row. Each row holds
`(1 if full references) + properties + patterns` columns: column 0 is the
node's remote reference (full mode only), then property values in request
order, then pattern references.

An empty shape means "no data". Any other mismatch is a protocol error and
no partial tree is returned.
*/

use std::sync::Arc;

use super::tree::{CachedValue, ElementTree, NodeData, NodeId};
use crate::platform::{HandleReleaser, RemoteHandle};
use crate::types::{CacheCell, CacheResponse, CacheSpec, DecodeError, PropertyValue, TreeScope};

const OPEN: u8 = b'(';
const OPEN_WITH_ROW: u8 = b'P';
const CLOSE: u8 = b')';

impl CacheResponse {
  /// Decode this response against the request that produced it.
  pub fn decode(
    self,
    spec: &Arc<CacheSpec>,
    releaser: Arc<dyn HandleReleaser>,
  ) -> Result<Option<ElementTree>, DecodeError> {
    decode(&self.shape, self.matrix.into_rows(), spec, &releaser)
  }
}

/// One open node on the parse stack.
struct Frame {
  node: NodeId,
  last_child: Option<NodeId>,
}

/// Decode a shape and its rows into an element graph.
///
/// Every raw reference in `rows` is wrapped before parsing starts, so on
/// error they are all released when the wrappers drop.
pub(crate) fn decode(
  shape: &str,
  rows: Vec<Vec<CacheCell>>,
  spec: &Arc<CacheSpec>,
  releaser: &Arc<dyn HandleReleaser>,
) -> Result<Option<ElementTree>, DecodeError> {
  let rows = convert_rows(rows, spec, releaser)?;

  if shape.is_empty() {
    if rows.is_empty() {
      return Ok(None);
    }
    return Err(DecodeError::RowCountMismatch {
      referenced: 0,
      available: rows.len(),
    });
  }

  let referenced = shape.bytes().filter(|&c| c == OPEN_WITH_ROW).count();
  if referenced != rows.len() {
    return Err(DecodeError::RowCountMismatch {
      referenced,
      available: rows.len(),
    });
  }

  parse(shape, rows, spec).map(Some)
}

/// Wrap every cell of every row, checking widths against the request.
fn convert_rows(
  rows: Vec<Vec<CacheCell>>,
  spec: &CacheSpec,
  releaser: &Arc<dyn HandleReleaser>,
) -> Result<Vec<NodeData>, DecodeError> {
  let expected = spec.row_width();
  let has_reference = spec.has_reference_column();
  let property_count = spec.properties.len();

  let mut converted = Vec::with_capacity(rows.len());
  let mut failure = None;

  for (row_index, row) in rows.into_iter().enumerate() {
    // Keep wrapping after a failure so every raw reference gets an owner.
    if failure.is_none() && row.len() != expected {
      failure = Some(DecodeError::ColumnCountMismatch {
        row: row_index,
        expected,
        found: row.len(),
      });
    }

    let mut cells = row.into_iter();
    let mut data = NodeData::default();

    if has_reference {
      match cells.next() {
        Some(CacheCell::Handle(raw)) => data.handle = Some(RemoteHandle::new(raw, Arc::clone(releaser))),
        Some(CacheCell::Empty) | None => {}
        Some(CacheCell::Value(_)) => {
          failure.get_or_insert(DecodeError::MissingReference { row: row_index });
        }
      }
    }

    for (column, cell) in cells.enumerate() {
      if column < property_count {
        data.properties.push(match cell {
          CacheCell::Empty => CachedValue::Value(PropertyValue::Empty),
          CacheCell::Value(v) => CachedValue::Value(v),
          CacheCell::Handle(raw) => CachedValue::Element(RemoteHandle::new(raw, Arc::clone(releaser))),
        });
      } else {
        data.patterns.push(match cell {
          CacheCell::Handle(raw) => Some(RemoteHandle::new(raw, Arc::clone(releaser))),
          CacheCell::Empty | CacheCell::Value(_) => None,
        });
      }
    }

    converted.push(data);
  }

  match failure {
    Some(err) => Err(err),
    None => Ok(converted),
  }
}

/// Recursive-descent parse of the shape.
/// Iterative (explicit stack) to avoid stack overflow on deep trees.
fn parse(shape: &str, rows: Vec<NodeData>, spec: &Arc<CacheSpec>) -> Result<ElementTree, DecodeError> {
  let bytes = shape.as_bytes();
  let available = rows.len();
  let mut rows = rows.into_iter();
  let mut tree = ElementTree::new(Arc::clone(spec));

  // Only the root answers for "children"; deeper levels exist only when
  // descendants were requested.
  let root_wants_children = spec.scope.wants_children();
  let descendants = spec.scope.contains(TreeScope::DESCENDANTS);

  let mut position = 0;
  let root = open_node(bytes, shape, position, &mut rows, available, &mut tree, root_wants_children)?;
  position += 1;
  let mut stack = vec![Frame {
    node: root,
    last_child: None,
  }];

  while let Some(top) = stack.last_mut() {
    let Some(&c) = bytes.get(position) else {
      return Err(DecodeError::UnclosedNode { position });
    };

    if c == CLOSE {
      stack.pop();
      position += 1;
      continue;
    }

    let parent = top.node;
    let previous = top.last_child;
    let child = open_node(bytes, shape, position, &mut rows, available, &mut tree, descendants)?;
    tree.link_child(parent, child, previous);
    top.last_child = Some(child);
    position += 1;
    stack.push(Frame {
      node: child,
      last_child: None,
    });
  }

  if position < bytes.len() {
    return Err(DecodeError::TrailingInput { position });
  }

  Ok(tree)
}

fn open_node(
  bytes: &[u8],
  shape: &str,
  position: usize,
  rows: &mut impl Iterator<Item = NodeData>,
  available: usize,
  tree: &mut ElementTree,
  children_requested: bool,
) -> Result<NodeId, DecodeError> {
  match bytes.get(position) {
    Some(&OPEN) => Ok(tree.push(None, children_requested)),
    Some(&OPEN_WITH_ROW) => {
      // Row count was checked against the number of `P`s up front.
      let data = rows.next().ok_or(DecodeError::RowCountMismatch {
        referenced: available + 1,
        available,
      })?;
      Ok(tree.push(Some(data), children_requested))
    }
    Some(_) => Err(DecodeError::UnexpectedChar {
      position,
      found: shape
        .get(position..)
        .and_then(|rest| rest.chars().next())
        .unwrap_or('\u{fffd}'),
    }),
    None => Err(DecodeError::UnclosedNode { position }),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::ElementNode;
  use crate::types::{PatternId, PropertyId, RawHandle, ReferenceMode};
  use parking_lot::Mutex;

  #[derive(Default)]
  struct Releases(Mutex<Vec<RawHandle>>);

  impl HandleReleaser for Releases {
    fn release(&self, raw: RawHandle) {
      self.0.lock().push(raw);
    }
  }

  fn spec(properties: usize, scope: TreeScope) -> Arc<CacheSpec> {
    let props: Vec<PropertyId> = (0..properties)
      .map(|i| PropertyId(30100 + i32::try_from(i).unwrap_or(0)))
      .collect();
    Arc::new(CacheSpec::properties(props).with_scope(scope))
  }

  fn run(
    shape: &str,
    rows: Vec<Vec<CacheCell>>,
    spec: &Arc<CacheSpec>,
  ) -> (Result<Option<ElementTree>, DecodeError>, Arc<Releases>) {
    let releases = Arc::new(Releases::default());
    let releaser: Arc<dyn HandleReleaser> = releases.clone();
    (decode(shape, rows, spec, &releaser), releases)
  }

  fn row(handle: u64, values: &[i32]) -> Vec<CacheCell> {
    let mut row = vec![CacheCell::Handle(RawHandle(handle))];
    row.extend(values.iter().map(|v| CacheCell::Value(PropertyValue::Int(*v))));
    row
  }

  #[test]
  fn empty_shape_is_no_data() {
    let (result, _) = run("", vec![], &spec(0, TreeScope::ELEMENT));
    assert!(matches!(result, Ok(None)));
  }

  #[test]
  fn empty_shape_with_rows_is_error() {
    let (result, releases) = run("", vec![row(1, &[])], &spec(0, TreeScope::ELEMENT));
    assert_eq!(
      result.err(),
      Some(DecodeError::RowCountMismatch {
        referenced: 0,
        available: 1
      })
    );
    assert_eq!(*releases.0.lock(), vec![RawHandle(1)]);
  }

  #[test]
  fn plain_nodes_consume_no_rows() {
    let (result, _) = run("(()())", vec![], &spec(0, TreeScope::SUBTREE));
    let tree = result.ok().flatten().expect("tree");
    let root = tree.root();
    let children: Vec<_> = root.children().collect();
    assert_eq!(children.len(), 2);
    assert!(!root.has_cached_data());
    for child in children {
      assert_eq!(child.children().count(), 0);
      assert!(child.parent().is_some_and(|p| p.id() == root.id()));
    }
  }

  #[test]
  fn row_node_maps_property_columns() {
    let spec = spec(2, TreeScope::ELEMENT);
    let (result, _) = run("P)", vec![row(5, &[11, 22])], &spec);
    let tree = result.ok().flatten().expect("tree");
    let root = tree.root();

    assert_eq!(root.handle().map(RemoteHandle::raw), Some(RawHandle(5)));
    assert_eq!(
      root.property(PropertyId(30100)).and_then(CachedValue::as_value),
      Some(&PropertyValue::Int(11))
    );
    assert_eq!(
      root.property(PropertyId(30101)).and_then(CachedValue::as_value),
      Some(&PropertyValue::Int(22))
    );
  }

  #[test]
  fn rows_attach_in_preorder() {
    let spec = spec(1, TreeScope::SUBTREE);
    let rows = vec![row(1, &[1]), row(2, &[2]), row(3, &[3])];
    let (result, _) = run("P(P))P))", rows, &spec);
    let tree = result.ok().flatten().expect("tree");

    let raws: Vec<Option<RawHandle>> = tree
      .iter()
      .map(|n| n.handle().map(RemoteHandle::raw))
      .collect();
    assert_eq!(
      raws,
      vec![Some(RawHandle(1)), None, Some(RawHandle(2)), Some(RawHandle(3))]
    );

    // Root P with two children: a plain node holding P, then a P.
    let root = tree.root();
    let kids: Vec<_> = root.children().collect();
    assert_eq!(kids.len(), 2);
    let grandchild = kids.first().and_then(ElementNode::first_child);
    assert_eq!(
      grandchild.and_then(|g| g.handle()).map(RemoteHandle::raw),
      Some(RawHandle(2))
    );
  }

  #[test]
  fn children_scope_marks_only_root() {
    let (result, _) = run("(())", vec![], &spec(0, TreeScope::ELEMENT | TreeScope::CHILDREN));
    let tree = result.ok().flatten().expect("tree");
    assert!(tree.root().children_requested());
    let child = tree.root().first_child().expect("child");
    assert!(!child.children_requested());
  }

  #[test]
  fn descendants_scope_marks_every_level() {
    let (result, _) = run("(())", vec![], &spec(0, TreeScope::SUBTREE));
    let tree = result.ok().flatten().expect("tree");
    let child = tree.root().first_child().expect("child");
    assert!(child.children_requested());
    assert!(child.first_child().is_none());
  }

  #[test]
  fn element_scope_leaves_children_unrequested() {
    let (result, _) = run("()", vec![], &spec(0, TreeScope::ELEMENT));
    let tree = result.ok().flatten().expect("tree");
    assert!(!tree.root().children_requested());
  }

  #[test]
  fn unclosed_node_fails() {
    let (result, _) = run("(()", vec![], &spec(0, TreeScope::SUBTREE));
    assert_eq!(result.err(), Some(DecodeError::UnclosedNode { position: 3 }));
  }

  #[test]
  fn trailing_input_fails() {
    let (result, _) = run("())", vec![], &spec(0, TreeScope::SUBTREE));
    assert_eq!(result.err(), Some(DecodeError::TrailingInput { position: 2 }));

    let (result, _) = run("()()", vec![], &spec(0, TreeScope::SUBTREE));
    assert_eq!(result.err(), Some(DecodeError::TrailingInput { position: 2 }));
  }

  #[test]
  fn unexpected_char_fails() {
    let (result, _) = run("(x)", vec![], &spec(0, TreeScope::SUBTREE));
    assert_eq!(
      result.err(),
      Some(DecodeError::UnexpectedChar {
        position: 1,
        found: 'x'
      })
    );
    let (result, _) = run(")", vec![], &spec(0, TreeScope::SUBTREE));
    assert!(matches!(result, Err(DecodeError::UnexpectedChar { position: 0, .. })));
  }

  #[test]
  fn too_few_rows_fails_and_releases() {
    let spec = spec(0, TreeScope::SUBTREE);
    let (result, releases) = run("P(P))", vec![row(1, &[])], &spec);
    assert_eq!(
      result.err(),
      Some(DecodeError::RowCountMismatch {
        referenced: 2,
        available: 1
      })
    );
    assert_eq!(*releases.0.lock(), vec![RawHandle(1)]);
  }

  #[test]
  fn too_many_rows_fails() {
    let spec = spec(0, TreeScope::SUBTREE);
    let (result, _) = run("P)", vec![row(1, &[]), row(2, &[])], &spec);
    assert!(matches!(result, Err(DecodeError::RowCountMismatch { .. })));
  }

  #[test]
  fn column_mismatch_fails() {
    let spec = spec(2, TreeScope::ELEMENT);
    let (result, releases) = run("P)", vec![row(9, &[1])], &spec);
    assert_eq!(
      result.err(),
      Some(DecodeError::ColumnCountMismatch {
        row: 0,
        expected: 3,
        found: 2
      })
    );
    assert_eq!(*releases.0.lock(), vec![RawHandle(9)]);
  }

  #[test]
  fn reference_column_must_be_a_handle() {
    let spec = spec(0, TreeScope::ELEMENT);
    let (result, _) = run("P)", vec![vec![CacheCell::Value(PropertyValue::Int(1))]], &spec);
    assert_eq!(result.err(), Some(DecodeError::MissingReference { row: 0 }));
  }

  #[test]
  fn no_reference_mode_has_no_column_zero() {
    let spec = Arc::new(
      CacheSpec::properties(vec![PropertyId::NAME])
        .with_patterns(vec![PatternId(10000)])
        .with_reference_mode(ReferenceMode::None),
    );
    let rows = vec![vec![
      CacheCell::Value(PropertyValue::from("ok")),
      CacheCell::Handle(RawHandle(40)),
    ]];
    let (result, releases) = run("P)", rows, &spec);
    let tree = result.ok().flatten().expect("tree");
    let root = tree.root();
    assert!(root.handle().is_none());
    assert_eq!(
      root.property(PropertyId::NAME).and_then(CachedValue::as_value),
      Some(&PropertyValue::from("ok"))
    );
    assert_eq!(root.pattern(PatternId(10000)).map(RemoteHandle::raw), Some(RawHandle(40)));

    drop(tree);
    assert_eq!(*releases.0.lock(), vec![RawHandle(40)]);
  }

  #[test]
  fn response_decode_wraps_free_function() {
    let spec = spec(0, TreeScope::ELEMENT);
    let response = CacheResponse::new(
      "P)",
      crate::types::CacheMatrix::new(vec![vec![CacheCell::Handle(RawHandle(3))]]),
    );
    let releases: Arc<dyn HandleReleaser> = Arc::new(Releases::default());
    let tree = response.decode(&spec, releases).ok().flatten().expect("tree");
    assert_eq!(tree.len(), 1);
  }
}
