//! Line echo over TCP.
//!
//! ```text
//! Request:  hello\n
//! Response: Server received: hello\n
//! ```
//!
//! A `quit` line (trimmed, any case) is echoed, then the server closes the
//! connection.

pub mod client;
pub mod server;

pub use client::TcpEchoClient;
pub use server::{handle_session, SessionEnd, TcpEchoServer};
