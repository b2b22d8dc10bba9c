//! twin-echo: echo services over TCP and UDP, plus interactive clients.
//!
//! Four binaries share this library:
//! - `tcp-server`: line echo, one worker per connection (port 8080)
//! - `tcp-client`: interactive line client
//! - `udp-server`: datagram echo, one worker per datagram (port 8081)
//! - `udp-client`: interactive datagram client with a 5s receive window
//!
//! Features:
//! - `quit` sentinel (trimmed, any case) ends a session
//! - Bounded worker pools with a shutdown grace period
//! - Configuration via CLI arguments or TOML file

pub mod config;
pub mod console;
pub mod error;
pub mod logging;
pub mod net;
pub mod protocol;
pub mod shutdown;
pub mod tcp;
pub mod udp;
pub mod workers;

pub use config::{Config, Endpoint};
pub use console::ClientExit;
pub use error::EchoError;
