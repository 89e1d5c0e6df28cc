/*!
Cache request and response shapes.

A [`CacheSpec`] describes what to prefetch when materializing a remote
element. A [`CacheResponse`] is what comes back: a tree-shape string plus a
row-major property matrix. See [`CacheResponse::decode`] for the wire format.
*/

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{PatternId, PropertyId, PropertyValue, RawHandle, TreeScope};

/// Whether decoded nodes carry a live remote reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ReferenceMode {
  /// Cached values only. Column 0 is absent.
  None,
  /// Column 0 of every row is the node's remote reference.
  #[default]
  Full,
}

/// Selection condition evaluated on the remote side.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum Condition {
  #[default]
  True,
  False,
  Property(PropertyId, PropertyValue),
  And(Vec<Condition>),
  Or(Vec<Condition>),
  Not(Box<Condition>),
}

/// Immutable request shape, shared read-only by the decoder and the
/// delivery path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CacheSpec {
  pub condition: Condition,
  pub scope: TreeScope,
  pub properties: Vec<PropertyId>,
  pub patterns: Vec<PatternId>,
  pub reference_mode: ReferenceMode,
}

impl Default for CacheSpec {
  fn default() -> Self {
    Self {
      condition: Condition::True,
      scope: TreeScope::ELEMENT,
      properties: Vec::new(),
      patterns: Vec::new(),
      reference_mode: ReferenceMode::Full,
    }
  }
}

impl CacheSpec {
  /// Spec for the given properties on the element itself.
  pub fn properties(properties: impl Into<Vec<PropertyId>>) -> Self {
    Self {
      properties: properties.into(),
      ..Self::default()
    }
  }

  #[must_use]
  pub fn with_scope(mut self, scope: TreeScope) -> Self {
    self.scope = scope;
    self
  }

  #[must_use]
  pub fn with_patterns(mut self, patterns: impl Into<Vec<PatternId>>) -> Self {
    self.patterns = patterns.into();
    self
  }

  #[must_use]
  pub const fn with_reference_mode(mut self, mode: ReferenceMode) -> Self {
    self.reference_mode = mode;
    self
  }

  #[must_use]
  pub fn with_condition(mut self, condition: Condition) -> Self {
    self.condition = condition;
    self
  }

  /// Whether column 0 holds a remote reference.
  pub const fn has_reference_column(&self) -> bool {
    matches!(self.reference_mode, ReferenceMode::Full)
  }

  /// Expected matrix row width for responses to this spec.
  pub fn row_width(&self) -> usize {
    usize::from(self.has_reference_column()) + self.properties.len() + self.patterns.len()
  }

  /// Column index of a property, if requested.
  pub fn property_column(&self, id: PropertyId) -> Option<usize> {
    self
      .properties
      .iter()
      .position(|p| *p == id)
      .map(|i| i + usize::from(self.has_reference_column()))
  }

  /// Column index of a pattern, if requested.
  pub fn pattern_column(&self, id: PatternId) -> Option<usize> {
    self
      .patterns
      .iter()
      .position(|p| *p == id)
      .map(|i| i + usize::from(self.has_reference_column()) + self.properties.len())
  }
}

/// One cell of the property matrix.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CacheCell {
  #[default]
  Empty,
  Value(PropertyValue),
  /// A remote object reference (element or pattern).
  Handle(RawHandle),
}

impl From<PropertyValue> for CacheCell {
  fn from(v: PropertyValue) -> Self {
    Self::Value(v)
  }
}

impl From<RawHandle> for CacheCell {
  fn from(h: RawHandle) -> Self {
    Self::Handle(h)
  }
}

/// Row-major property matrix. Rows are nodes that carry data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CacheMatrix {
  rows: Vec<Vec<CacheCell>>,
}

impl CacheMatrix {
  pub fn new(rows: Vec<Vec<CacheCell>>) -> Self {
    Self { rows }
  }

  pub fn empty() -> Self {
    Self::default()
  }

  pub fn row_count(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  pub fn rows(&self) -> &[Vec<CacheCell>] {
    &self.rows
  }

  pub(crate) fn into_rows(self) -> Vec<Vec<CacheCell>> {
    self.rows
  }
}

/// Serialized response for one cache request. Consumed once by decoding.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CacheResponse {
  pub shape: String,
  pub matrix: CacheMatrix,
}

impl CacheResponse {
  pub fn new(shape: impl Into<String>, matrix: CacheMatrix) -> Self {
    Self {
      shape: shape.into(),
      matrix,
    }
  }

  /// Response meaning "no data".
  pub fn none() -> Self {
    Self::default()
  }
}
