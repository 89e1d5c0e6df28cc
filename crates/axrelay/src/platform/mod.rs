/*!
Native layer seam.

Everything OS-specific sits behind these traits; the core only sees
[`NativeProvider`], [`NativeEventSource`] and [`MessagePump`].
*/

mod handles;
mod notification;
mod traits;

pub use handles::{HandleReleaser, RemoteHandle};
pub use notification::{HookToken, NativeEventKind, NativeNotification};
pub use traits::{MessagePump, NativeEventSource, NativeProvider};
