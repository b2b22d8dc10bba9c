//! Datagram echo over UDP.
//!
//! ```text
//! Request:  hello
//! Response: UDP Server received: hello
//! ```
//!
//! A `quit` payload (trimmed, any case) gets a second reply,
//! `Goodbye from UDP Server!`. The server keeps no state between datagrams.

pub mod client;
pub mod server;

pub use client::UdpEchoClient;
pub use server::{handle_datagram, Datagram, UdpEchoServer};
