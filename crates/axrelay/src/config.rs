/*!
Client configuration.

Every field has a default, so a JSON document only needs the keys it
changes:

```ignore
let config = ClientConfig::from_json(r#"{ "sync_post_timeout_ms": 500 }"#)?;
```
*/

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::RelayResult;

/// Tunables for an [`AutomationClient`](crate::AutomationClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
  /// Upper bound on a synchronous post. Expiry is not an error: the caller
  /// proceeds and the work still runs on the worker.
  pub sync_post_timeout_ms: u64,
  /// Focus events older than the last delivered one by less than this many
  /// ticks are dropped.
  pub focus_stale_window: u32,
  /// Per-stream buffer. The oldest event is dropped on overflow.
  pub stream_capacity: usize,
  /// Name of the dispatch worker thread.
  pub worker_name: String,
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self {
      sync_post_timeout_ms: 2000,
      focus_stale_window: 5000,
      stream_capacity: 5000,
      worker_name: "axrelay-dispatch".to_owned(),
    }
  }
}

impl ClientConfig {
  pub fn from_json(json: &str) -> RelayResult<Self> {
    Ok(serde_json::from_str(json)?)
  }

  pub const fn sync_post_timeout(&self) -> Duration {
    Duration::from_millis(self.sync_post_timeout_ms)
  }
}
