//! Command dispatch: framing a request, decoding the reply, classifying the
//! trailing status.

mod frame;
mod link;
pub mod status;

pub use frame::{CallTimeout, CommandFrame, Reply};
pub use link::Link;
