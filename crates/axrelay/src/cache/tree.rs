/*!
Decoded element graph.

Nodes live in one arena owned by the [`ElementTree`] a decode produced; links
are indexes into it. Nothing is shared between two decodes.

## Invariants

1. **Single parent**: every node except the root has exactly one parent.
2. **Sibling order**: `first_child` / `next_sibling` follow preorder, left to right.
3. **Set once**: links are written by the decoder while building and never
   change after the tree is handed out.
*/

use std::sync::Arc;

use crate::platform::RemoteHandle;
use crate::types::{CacheSpec, PatternId, PropertyId, PropertyValue};

/// Index of a node within its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
  pub const fn index(self) -> usize {
    self.0
  }
}

/// State of a node's first-child link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChildLink {
  /// Children were never asked for.
  #[default]
  NotRequested,
  /// Children were asked for. `None` means there are none.
  Requested(Option<NodeId>),
}

/// A cached property value.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
  Value(PropertyValue),
  /// The property refers to another remote element.
  Element(RemoteHandle),
}

impl CachedValue {
  pub const fn as_value(&self) -> Option<&PropertyValue> {
    match self {
      Self::Value(v) => Some(v),
      Self::Element(_) => None,
    }
  }
}

/// Data a node was opened with.
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeData {
  pub(crate) handle: Option<RemoteHandle>,
  pub(crate) properties: Vec<CachedValue>,
  pub(crate) patterns: Vec<Option<RemoteHandle>>,
}

#[derive(Debug, Clone)]
struct Node {
  data: NodeData,
  has_row: bool,
  parent: Option<NodeId>,
  first_child: ChildLink,
  next_sibling: Option<NodeId>,
}

/// Element graph reconstructed from one cache response. Clones share the
/// same remote handles.
#[derive(Debug, Clone)]
pub struct ElementTree {
  nodes: Vec<Node>,
  spec: Arc<CacheSpec>,
}

impl ElementTree {
  pub(crate) fn new(spec: Arc<CacheSpec>) -> Self {
    Self {
      nodes: Vec::new(),
      spec,
    }
  }

  /// Add a node. The first node added is the root.
  pub(crate) fn push(&mut self, data: Option<NodeData>, children_requested: bool) -> NodeId {
    let id = NodeId(self.nodes.len());
    let has_row = data.is_some();
    self.nodes.push(Node {
      data: data.unwrap_or_default(),
      has_row,
      parent: None,
      first_child: if children_requested {
        ChildLink::Requested(None)
      } else {
        ChildLink::NotRequested
      },
      next_sibling: None,
    });
    id
  }

  /// Link `child` under `parent`, after `previous` if given.
  pub(crate) fn link_child(&mut self, parent: NodeId, child: NodeId, previous: Option<NodeId>) {
    if let Some(node) = self.nodes.get_mut(child.0) {
      node.parent = Some(parent);
    }
    match previous {
      Some(prev) => {
        if let Some(node) = self.nodes.get_mut(prev.0) {
          node.next_sibling = Some(child);
        }
      }
      None => {
        if let Some(node) = self.nodes.get_mut(parent.0) {
          node.first_child = ChildLink::Requested(Some(child));
        }
      }
    }
  }

  /// The root node.
  pub fn root(&self) -> ElementNode<'_> {
    ElementNode {
      tree: self,
      id: NodeId(0),
    }
  }

  /// Node by id, if it belongs to this tree.
  pub fn node(&self, id: NodeId) -> Option<ElementNode<'_>> {
    (id.0 < self.nodes.len()).then_some(ElementNode { tree: self, id })
  }

  /// Number of nodes.
  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// The request this tree answers.
  pub fn spec(&self) -> &CacheSpec {
    &self.spec
  }

  /// Nodes in preorder.
  pub fn iter(&self) -> impl Iterator<Item = ElementNode<'_>> {
    (0..self.nodes.len()).map(move |i| ElementNode {
      tree: self,
      id: NodeId(i),
    })
  }

  fn get(&self, id: NodeId) -> &Node {
    // NodeIds are only minted by this tree, so the index is in bounds.
    #[allow(clippy::indexing_slicing)]
    &self.nodes[id.0]
  }
}

/// Borrowed view of one node.
#[derive(Debug, Clone, Copy)]
pub struct ElementNode<'a> {
  tree: &'a ElementTree,
  id: NodeId,
}

impl<'a> ElementNode<'a> {
  pub const fn id(&self) -> NodeId {
    self.id
  }

  fn at(&self, id: NodeId) -> Self {
    Self {
      tree: self.tree,
      id,
    }
  }

  /// Remote reference, present when full references were requested.
  pub fn handle(&self) -> Option<&'a RemoteHandle> {
    self.tree.get(self.id).data.handle.as_ref()
  }

  /// Whether this node was produced by a `P` and carries a matrix row.
  pub fn has_cached_data(&self) -> bool {
    self.tree.get(self.id).has_row
  }

  /// Cached value of a requested property.
  pub fn property(&self, id: PropertyId) -> Option<&'a CachedValue> {
    let index = self.tree.spec.properties.iter().position(|p| *p == id)?;
    self.tree.get(self.id).data.properties.get(index)
  }

  /// All cached property values in request order.
  pub fn properties(&self) -> &'a [CachedValue] {
    &self.tree.get(self.id).data.properties
  }

  /// Cached pattern reference, if requested and supported.
  pub fn pattern(&self, id: PatternId) -> Option<&'a RemoteHandle> {
    let index = self.tree.spec.patterns.iter().position(|p| *p == id)?;
    self.tree.get(self.id).data.patterns.get(index)?.as_ref()
  }

  pub fn parent(&self) -> Option<Self> {
    self.tree.get(self.id).parent.map(|id| self.at(id))
  }

  pub fn next_sibling(&self) -> Option<Self> {
    self.tree.get(self.id).next_sibling.map(|id| self.at(id))
  }

  pub fn first_child(&self) -> Option<Self> {
    match self.tree.get(self.id).first_child {
      ChildLink::Requested(Some(id)) => Some(self.at(id)),
      ChildLink::Requested(None) | ChildLink::NotRequested => None,
    }
  }

  /// Raw state of the first-child link.
  pub fn child_link(&self) -> ChildLink {
    self.tree.get(self.id).first_child
  }

  /// Whether children were fetched. Distinguishes "no children" from "not asked".
  pub fn children_requested(&self) -> bool {
    matches!(self.child_link(), ChildLink::Requested(_))
  }

  /// Children, left to right.
  pub fn children(&self) -> Children<'a> {
    Children {
      next: self.first_child(),
    }
  }
}

/// Iterator over a node's children.
#[derive(Debug)]
pub struct Children<'a> {
  next: Option<ElementNode<'a>>,
}

impl<'a> Iterator for Children<'a> {
  type Item = ElementNode<'a>;

  fn next(&mut self) -> Option<Self::Item> {
    let current = self.next?;
    self.next = current.next_sibling();
    Some(current)
  }
}
