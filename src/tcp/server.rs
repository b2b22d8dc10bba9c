//! TCP echo server.
//!
//! Accepts connections and hands each one to its own worker, which echoes
//! lines until the peer closes the stream or sends `quit`. A failing
//! session never reaches the accept loop.

use crate::config::Config;
use crate::error::EchoError;
use crate::net;
use crate::protocol::{decode, is_quit, strip_line_ending, tcp_response};
use crate::shutdown::ShutdownSignal;
use crate::workers::WorkerPool;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Initial capacity of the per-session line buffer
const LINE_BUFFER_SIZE: usize = 1024;

/// How a session ended when no I/O fault occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Peer closed its side of the stream.
    PeerClosed,
    /// Peer sent the quit sentinel.
    Quit,
}

/// Server instance
pub struct TcpEchoServer {
    listener: TcpListener,
    workers: WorkerPool,
    shutdown_grace: Duration,
}

impl TcpEchoServer {
    /// Bind the listening socket. Failure here is fatal.
    pub async fn bind(config: &Config) -> Result<Self, EchoError> {
        let addr = net::resolve(&config.host, config.port).await?;
        let listener = net::bind_tcp_listener(addr)?;
        let workers = WorkerPool::new(config.max_workers);

        info!(
            address = %addr,
            max_connections = workers.capacity(),
            "TCP server listening"
        );

        Ok(TcpEchoServer {
            listener,
            workers,
            shutdown_grace: config.shutdown_grace,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` fires or accepting fails.
    ///
    /// In-flight sessions are given the shutdown grace period either way.
    pub async fn run(self, mut shutdown: ShutdownSignal) -> Result<(), EchoError> {
        let result = self.accept_loop(&mut shutdown).await;

        let in_flight = self.workers.in_flight();
        if in_flight > 0 {
            info!(sessions = in_flight, "Waiting for open sessions");
            if !self.workers.drain(self.shutdown_grace).await {
                warn!(
                    sessions = self.workers.in_flight(),
                    "Sessions still open after grace period"
                );
            }
        }

        result
    }

    async fn accept_loop(&self, shutdown: &mut ShutdownSignal) -> Result<(), EchoError> {
        loop {
            // Wait for a connection slot
            let permit = tokio::select! {
                _ = shutdown.wait() => return Ok(()),
                permit = self.workers.reserve() => match permit {
                    Some(permit) => permit,
                    None => return Ok(()),
                },
            };

            let accepted = tokio::select! {
                _ = shutdown.wait() => return Ok(()),
                accepted = self.listener.accept() => accepted,
            };

            let (stream, peer) = match accepted {
                Ok(pair) => pair,
                // The peer gave up before we got to it; only that connection is lost.
                Err(e) if e.kind() == io::ErrorKind::ConnectionAborted => {
                    warn!(error = %e, "Connection aborted before accept");
                    continue;
                }
                Err(e) => return Err(EchoError::Accept(e)),
            };

            info!(peer = %peer, "New client connected");

            self.workers.spawn(permit, async move {
                match handle_session(stream, peer).await {
                    Ok(end) => info!(peer = %peer, reason = ?end, "Client disconnected"),
                    Err(e) => {
                        warn!(peer = %peer, error = %e, "Session failed");
                        info!(peer = %peer, "Client disconnected");
                    }
                }
            });
        }
    }
}

/// Echo lines on one connection until end of stream or `quit`.
///
/// Lines are answered strictly in arrival order. The echo for `quit` is
/// written before the session ends.
pub async fn handle_session<S>(stream: S, peer: SocketAddr) -> Result<SessionEnd, EchoError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = BufReader::new(stream);
    let mut buf = Vec::with_capacity(LINE_BUFFER_SIZE);

    loop {
        buf.clear();
        let n = stream
            .read_until(b'\n', &mut buf)
            .await
            .map_err(EchoError::Session)?;
        if n == 0 {
            debug!(peer = %peer, "Connection closed by client");
            return Ok(SessionEnd::PeerClosed);
        }

        let line = decode(strip_line_ending(&buf));
        info!(peer = %peer, line = %line, "Received from client");

        stream
            .write_all(tcp_response(&line).as_bytes())
            .await
            .map_err(EchoError::Session)?;
        stream.flush().await.map_err(EchoError::Session)?;

        if is_quit(&line) {
            // The echo is already flushed; a failed half-close only loses the FIN.
            if let Err(e) = stream.shutdown().await {
                debug!(peer = %peer, error = %e, "Shutdown after quit failed");
            }
            return Ok(SessionEnd::Quit);
        }
    }
}
