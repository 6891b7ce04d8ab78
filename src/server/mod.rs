//! Locating, starting and feeding display instances
//!
//! - `ipc`: socket addressing and the client side
//! - `protocol`: the command record sent over a connection
//! - `dispatcher`: the listening side inside an instance
//! - `grouping_timer`: idle expiry for grouping instances
//! - `daemon`: launching detached instances
//! - `instance`: the instance's main loop

pub mod daemon;
pub mod dispatcher;
pub mod grouping_timer;
pub mod instance;
pub mod ipc;
pub mod protocol;

pub use dispatcher::{Dispatcher, DispatcherConfig, Lifecycle};
pub use instance::{DisplayInstance, InstanceConfig};
pub use ipc::{AddressMode, SocketPaths};
pub use protocol::Command;
