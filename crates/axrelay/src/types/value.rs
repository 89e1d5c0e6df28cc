/*!
Plain property values.

These carry no remote references, so they can be cloned into event
arguments and sent across threads freely. Values that reference remote
objects only exist in a decoded [`ElementTree`](crate::ElementTree).
*/

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Rectangle in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rect {
  pub x: f64,
  pub y: f64,
  pub w: f64,
  pub h: f64,
}

impl Rect {
  pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
    Self { x, y, w, h }
  }

  pub fn is_empty(&self) -> bool {
    self.w <= 0.0 || self.h <= 0.0
  }
}

/// Typed property value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "value")]
#[ts(export)]
pub enum PropertyValue {
  /// Property not supported or no value.
  #[default]
  Empty,
  Bool(bool),
  Int(i32),
  Double(f64),
  String(String),
  IntArray(Vec<i32>),
  Rect(Rect),
}

impl PropertyValue {
  pub fn as_str(&self) -> Option<&str> {
    match self {
      Self::String(s) => Some(s),
      _ => None,
    }
  }

  pub const fn as_i32(&self) -> Option<i32> {
    match self {
      Self::Int(n) => Some(*n),
      _ => None,
    }
  }

  pub const fn as_bool(&self) -> Option<bool> {
    match self {
      Self::Bool(b) => Some(*b),
      _ => None,
    }
  }

  pub const fn as_rect(&self) -> Option<&Rect> {
    match self {
      Self::Rect(r) => Some(r),
      _ => None,
    }
  }

  pub const fn is_empty(&self) -> bool {
    matches!(self, Self::Empty)
  }
}

impl From<bool> for PropertyValue {
  fn from(b: bool) -> Self {
    Self::Bool(b)
  }
}

impl From<i32> for PropertyValue {
  fn from(n: i32) -> Self {
    Self::Int(n)
  }
}

impl From<f64> for PropertyValue {
  fn from(n: f64) -> Self {
    Self::Double(n)
  }
}

impl From<&str> for PropertyValue {
  fn from(s: &str) -> Self {
    Self::String(s.to_owned())
  }
}

impl From<String> for PropertyValue {
  fn from(s: String) -> Self {
    Self::String(s)
  }
}

impl From<Rect> for PropertyValue {
  fn from(r: Rect) -> Self {
    Self::Rect(r)
  }
}
