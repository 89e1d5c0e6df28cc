/*!
Dispatch queue and work items.

- `queue.rs` - the single-worker FIFO queue
- `work.rs` - `WorkItem` variants and the synchronous-post completion event
*/

mod queue;
mod work;

pub(crate) use queue::DispatchQueue;
pub use queue::QueueWaker;
pub(crate) use work::{panic_message, WorkItem};
