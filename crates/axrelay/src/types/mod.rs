/*! Core types for axrelay.

Regenerate TypeScript bindings: `cargo test` (ts-rs exports on test).
*/

#![allow(missing_docs)]

mod cache;
mod error;
mod event;
mod ids;
mod scope;
mod value;

pub use cache::{CacheCell, CacheMatrix, CacheResponse, CacheSpec, Condition, ReferenceMode};
pub use error::{DecodeError, DispatchError, Fault, ProviderError, RelayError, RelayResult};
pub use event::{
  EventArgs, EventSource, NativeTarget, StructureChange, CHILD_ID_SELF, OBJECT_ID_WINDOW,
};
pub use ids::{EventId, ListenerId, PatternId, PropertyId, RawHandle, RuntimeId, WindowHandle};
pub use scope::TreeScope;
pub use value::{PropertyValue, Rect};
