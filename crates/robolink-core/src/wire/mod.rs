//! Wire codec for the station protocol.
//!
//! All multi-byte integers and floats are big-endian regardless of host.
//! Text is UTF-8 terminated by a single `\n`.
//!
//! - `codec` - primitive encoders/decoders and the `ByteSource` seam
//! - `value` - the closed set of tagged argument/result values

pub mod codec;
pub mod value;

pub use codec::ByteSource;
pub use value::{WireType, WireValue};
