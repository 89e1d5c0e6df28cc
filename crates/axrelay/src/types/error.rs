/*! Error types for relay operations. */

use super::{EventId, RuntimeId};

/// Protocol errors from decoding a cache response. Always fatal for the
/// response: no partial tree is produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
  #[error("Unexpected character {found:?} at position {position}")]
  UnexpectedChar { position: usize, found: char },

  #[error("Tree shape ended at position {position} with an unclosed node")]
  UnclosedNode { position: usize },

  #[error("Unconsumed input at position {position}")]
  TrailingInput { position: usize },

  #[error("Tree shape references {referenced} rows but the matrix has {available}")]
  RowCountMismatch { referenced: usize, available: usize },

  #[error("Row {row} has {found} columns, expected {expected}")]
  ColumnCountMismatch {
    row: usize,
    expected: usize,
    found: usize,
  },

  #[error("Row {row} column 0 must hold a remote reference")]
  MissingReference { row: usize },
}

/// Errors reported by native collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
  /// Handle no longer valid or window destroyed mid-operation.
  #[error("Element not available")]
  ElementNotAvailable,

  #[error("Operation not supported: {0}")]
  NotSupported(String),

  #[error("Native call failed: {0}")]
  Native(String),
}

impl ProviderError {
  pub const fn is_unavailable(&self) -> bool {
    matches!(self, Self::ElementNotAvailable)
  }
}

/// Posting to the dispatch queue failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
  #[error("Dispatch queue is not running")]
  NotRunning,

  #[error("Dispatch queue is shutting down")]
  Quitting,

  #[error("Dispatch worker terminated: {0}")]
  WorkerTerminated(String),

  #[error("Failed to spawn dispatch worker: {0}")]
  Spawn(String),
}

/// Outcome classification at a work-item boundary.
///
/// Checked once by the worker: `Recoverable` faults are logged and the worker
/// moves on, `Fatal` faults stop the worker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Fault {
  #[error("Recoverable fault: {0}")]
  Recoverable(String),

  #[error("Fatal fault: {0}")]
  Fatal(String),
}

impl Fault {
  pub const fn is_fatal(&self) -> bool {
    matches!(self, Self::Fatal(_))
  }
}

/// Errors surfaced synchronously by the public surface.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
  #[error("Invalid argument: {0}")]
  InvalidArgument(String),

  #[error("No listener for event {event_id} on {reference}")]
  ListenerNotFound {
    event_id: EventId,
    reference: RuntimeId,
  },

  #[error(transparent)]
  Decode(#[from] DecodeError),

  #[error(transparent)]
  Provider(#[from] ProviderError),

  #[error(transparent)]
  Dispatch(#[from] DispatchError),

  #[error("Invalid configuration: {0}")]
  Config(#[from] serde_json::Error),
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
