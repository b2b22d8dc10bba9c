//! Error kinds for socket setup, the dispatch loops and individual workers.
//!
//! Setup failures and accept failures end the process; everything raised
//! inside a worker stays inside that worker and is only logged.

use std::io;
use std::net::SocketAddr;

/// Errors raised by the echo servers and clients.
#[derive(Debug)]
pub enum EchoError {
    /// Host name could not be resolved, or resolved to nothing.
    Resolve { host: String, source: io::Error },
    /// Socket could not be created or bound.
    Bind { addr: String, source: io::Error },
    /// Stream connection could not be established.
    Connect { addr: SocketAddr, source: io::Error },
    /// The accept loop's own blocking call failed.
    Accept(io::Error),
    /// A datagram receive failed.
    Receive(io::Error),
    /// A reply datagram could not be sent.
    Send { peer: SocketAddr, source: io::Error },
    /// I/O fault inside one TCP session.
    Session(io::Error),
    /// Operator console could not be read or written.
    Console(io::Error),
}

impl EchoError {
    /// Whether this error ends the process rather than a single unit of work.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EchoError::Resolve { .. }
                | EchoError::Bind { .. }
                | EchoError::Connect { .. }
                | EchoError::Accept(_)
        )
    }
}

impl std::fmt::Display for EchoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EchoError::Resolve { host, source } => {
                write!(f, "Server not found '{host}': {source}")
            }
            EchoError::Bind { addr, source } => {
                write!(f, "Could not bind socket on {addr}: {source}")
            }
            EchoError::Connect { addr, source } => {
                write!(f, "Connection to {addr} failed: {source}")
            }
            EchoError::Accept(e) => write!(f, "Accept failed: {e}"),
            EchoError::Receive(e) => write!(f, "Error receiving packet: {e}"),
            EchoError::Send { peer, source } => {
                write!(f, "Error sending to {peer}: {source}")
            }
            EchoError::Session(e) => write!(f, "Error handling client: {e}"),
            EchoError::Console(e) => write!(f, "Console I/O error: {e}"),
        }
    }
}

impl std::error::Error for EchoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EchoError::Resolve { source, .. }
            | EchoError::Bind { source, .. }
            | EchoError::Connect { source, .. }
            | EchoError::Send { source, .. } => Some(source),
            EchoError::Accept(e)
            | EchoError::Receive(e)
            | EchoError::Session(e)
            | EchoError::Console(e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let refused = || io::Error::from(io::ErrorKind::ConnectionRefused);
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();

        assert!(EchoError::Connect { addr, source: refused() }.is_fatal());
        assert!(EchoError::Accept(refused()).is_fatal());
        assert!(!EchoError::Session(refused()).is_fatal());
        assert!(!EchoError::Receive(refused()).is_fatal());
        assert!(!EchoError::Send { peer: addr, source: refused() }.is_fatal());
    }

    #[test]
    fn test_display_names_the_peer() {
        let peer: SocketAddr = "10.0.0.7:5000".parse().unwrap();
        let err = EchoError::Send {
            peer,
            source: io::Error::from(io::ErrorKind::BrokenPipe),
        };
        assert!(err.to_string().contains("10.0.0.7:5000"));
    }
}
