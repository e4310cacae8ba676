//! Server Module
//!
//! SKK protocol framing, the per-connection command loop, and the listener.

mod connection;
mod host;
mod listener;
pub mod protocol;

pub use connection::{handle_connection, serve};
pub use host::{host_of_machine, host_of_socket};
pub use listener::Server;
pub use protocol::{Command, Request, Response, BUFFER_SIZE, VERSION_STRING};
