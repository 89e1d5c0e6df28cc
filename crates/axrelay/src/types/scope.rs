/*! Tree scope bit flags. */

use serde::{Deserialize, Serialize};
use std::ops::{BitAnd, BitOr, BitOrAssign};
use ts_rs::TS;

/// Which part of the tree relative to a reference element a request or
/// subscription covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TreeScope(u8);

impl TreeScope {
  pub const NONE: Self = Self(0);
  pub const ELEMENT: Self = Self(0x01);
  pub const CHILDREN: Self = Self(0x02);
  pub const DESCENDANTS: Self = Self(0x04);
  pub const PARENT: Self = Self(0x08);
  pub const ANCESTORS: Self = Self(0x10);
  /// Element, children and all descendants.
  pub const SUBTREE: Self = Self(0x07);

  const ALL_BITS: u8 = 0x1f;

  /// Build from raw bits, rejecting unknown bits.
  pub const fn from_bits(bits: u8) -> Option<Self> {
    if bits & !Self::ALL_BITS == 0 {
      Some(Self(bits))
    } else {
      None
    }
  }

  pub const fn bits(self) -> u8 {
    self.0
  }

  pub const fn contains(self, other: Self) -> bool {
    self.0 & other.0 == other.0
  }

  pub const fn intersects(self, other: Self) -> bool {
    self.0 & other.0 != 0
  }

  pub const fn is_empty(self) -> bool {
    self.0 == 0
  }

  /// Whether children or descendants were requested.
  pub const fn wants_children(self) -> bool {
    self.intersects(Self(Self::CHILDREN.0 | Self::DESCENDANTS.0))
  }
}

impl BitOr for TreeScope {
  type Output = Self;

  fn bitor(self, rhs: Self) -> Self {
    Self(self.0 | rhs.0)
  }
}

impl BitOrAssign for TreeScope {
  fn bitor_assign(&mut self, rhs: Self) {
    self.0 |= rhs.0;
  }
}

impl BitAnd for TreeScope {
  type Output = Self;

  fn bitand(self, rhs: Self) -> Self {
    Self(self.0 & rhs.0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn subtree_is_element_children_descendants() {
    assert_eq!(
      TreeScope::SUBTREE,
      TreeScope::ELEMENT | TreeScope::CHILDREN | TreeScope::DESCENDANTS
    );
    assert!(TreeScope::SUBTREE.contains(TreeScope::DESCENDANTS));
    assert!(!TreeScope::SUBTREE.contains(TreeScope::PARENT));
  }

  #[test]
  fn from_bits_rejects_unknown() {
    assert_eq!(TreeScope::from_bits(0x18), Some(TreeScope::PARENT | TreeScope::ANCESTORS));
    assert_eq!(TreeScope::from_bits(0x20), None);
  }

  #[test]
  fn wants_children() {
    assert!(TreeScope::CHILDREN.wants_children());
    assert!(TreeScope::DESCENDANTS.wants_children());
    assert!(!(TreeScope::ELEMENT | TreeScope::ANCESTORS).wants_children());
  }
}
