//! Robolink - client for driving a robot simulation station over its TCP API.
//!
//! The station runs as a separate application. This crate connects to it
//! (starting it locally when nothing is listening), sends typed commands,
//! decodes typed results and maps the station's status codes to errors.
//! A second connection can be opened to receive pushed events.
//!
//! # Example
//!
//! ```rust,ignore
//! use robolink::{ItemType, Link, LinkConfig};
//!
//! #[tokio::main]
//! async fn main() -> robolink::Result<()> {
//!     let link = Link::connect(LinkConfig::new()).await?;
//!
//!     if let Some(robot) = link.item("UR10", Some(ItemType::Robot)).await? {
//!         let joints = link.joints(&robot).await?;
//!         println!("{} joints: {:?}", link.item_name(&robot).await?, joints);
//!     }
//!
//!     let mut events = link.open_events().await?.spawn();
//!     while let Some(event) = events.recv().await {
//!         println!("{:?}", event);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod item;
pub mod transport;
pub mod types;
pub mod wire;

mod commands;

// Re-export commonly used types
pub use config::{LinkConfig, ProtocolConfig, StatusCodes};
pub use connection::{Launcher, LaunchPlan, LaunchedProcess, ProcessLauncher, StationInfo};
pub use dispatch::{CallTimeout, CommandFrame, Link, Reply};
pub use error::{
    ConnectError, ProtocolError, RemoteError, Result, RobolinkError, TransportError,
};
pub use events::{Event, EventChannel, EventListenerHandle, KeyEvent, Selection3d};
pub use item::{ItemHandle, ItemType};
pub use types::{Matrix2D, Pose};
pub use wire::{WireType, WireValue};
