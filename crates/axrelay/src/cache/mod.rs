/*!
Remote tree reconstruction.

- `decoder.rs` - parses a cache response into an [`ElementTree`]
- `tree.rs` - the decoded arena and its navigation views
*/

mod decoder;
mod tree;

pub(crate) use decoder::decode;
pub use tree::{CachedValue, ChildLink, Children, ElementNode, ElementTree, NodeId};
