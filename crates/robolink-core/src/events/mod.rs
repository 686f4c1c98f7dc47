//! Asynchronous station events.
//!
//! Events arrive on a second connection that only ever reads. Use
//! [`EventChannel::wait_for_event`] directly, or [`EventChannel::spawn`] to
//! move the channel onto its own task so long waits never hold up commands.

mod channel;
mod event;

pub use channel::{EventChannel, EventListenerHandle};
pub use event::{Event, KeyEvent, Selection3d};
