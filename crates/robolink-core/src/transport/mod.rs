//! TCP transport to the station.
//!
//! A [`Session`] is one socket plus the timeout applied to its I/O. Long
//! blocking calls raise the timeout through [`Session::extended`], which hands
//! back a guard that restores the default when dropped.

mod session;

pub use session::{ExtendedTimeout, Session};
