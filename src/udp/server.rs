//! UDP echo server.
//!
//! Every received datagram becomes its own worker, which answers the sender
//! on the shared socket and then exits. No sender state survives between
//! datagrams.

use crate::config::Config;
use crate::error::EchoError;
use crate::net;
use crate::protocol::{decode, udp_replies, MAX_DATAGRAM_SIZE};
use crate::shutdown::ShutdownSignal;
use crate::workers::WorkerPool;
use bytes::{Bytes, BytesMut};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// One received datagram.
#[derive(Debug, Clone)]
pub struct Datagram {
    /// Sender; replies go back here.
    pub peer: SocketAddr,
    /// At most `MAX_DATAGRAM_SIZE` bytes.
    pub payload: Bytes,
}

/// Server instance
pub struct UdpEchoServer {
    socket: Arc<UdpSocket>,
    workers: WorkerPool,
    shutdown_grace: Duration,
}

impl UdpEchoServer {
    /// Bind the datagram socket. Failure here is fatal.
    pub async fn bind(config: &Config) -> Result<Self, EchoError> {
        let addr = net::resolve(&config.host, config.port).await?;
        let socket = net::bind_udp_socket(addr)?;
        let workers = WorkerPool::new(config.max_workers);

        info!(
            address = %addr,
            max_in_flight = workers.capacity(),
            "UDP server listening"
        );

        Ok(UdpEchoServer {
            socket: Arc::new(socket),
            workers,
            shutdown_grace: config.shutdown_grace,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive and dispatch datagrams until `shutdown` fires.
    ///
    /// Receive errors are logged and the loop carries on; no single datagram
    /// can stop the server.
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        while !shutdown.is_triggered() {
            let permit = tokio::select! {
                _ = shutdown.wait() => break,
                permit = self.workers.reserve() => match permit {
                    Some(permit) => permit,
                    None => break,
                },
            };

            let mut buf = BytesMut::zeroed(MAX_DATAGRAM_SIZE);
            let received = tokio::select! {
                _ = shutdown.wait() => break,
                received = self.socket.recv_from(&mut buf) => received,
            };

            match received {
                Ok((len, peer)) => {
                    // Longer datagrams were truncated to the buffer by the kernel.
                    buf.truncate(len);
                    let datagram = Datagram {
                        peer,
                        payload: buf.freeze(),
                    };

                    let socket = Arc::clone(&self.socket);
                    self.workers.spawn(permit, async move {
                        if let Err(e) = handle_datagram(&socket, datagram).await {
                            warn!(error = %e, "Error handling packet");
                        }
                    });
                }
                Err(e) => {
                    if after_receive_error(e, shutdown.is_triggered()) == LoopControl::Stop {
                        break;
                    }
                }
            }
        }

        info!("Server shutting down");
        if !self.workers.drain(self.shutdown_grace).await {
            warn!(
                in_flight = self.workers.in_flight(),
                "Workers still running after grace period"
            );
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopControl {
    Continue,
    Stop,
}

/// A failed receive only stops the loop once shutdown has begun.
fn after_receive_error(error: io::Error, shutting_down: bool) -> LoopControl {
    if shutting_down {
        debug!(error = %error, "Receive interrupted by shutdown");
        LoopControl::Stop
    } else {
        warn!(error = %EchoError::Receive(error), "Receive failed");
        LoopControl::Continue
    }
}

/// Answer one datagram. Returns the number of replies sent.
pub async fn handle_datagram(socket: &UdpSocket, datagram: Datagram) -> Result<usize, EchoError> {
    let Datagram { peer, payload } = datagram;
    let message = decode(&payload);

    info!(peer = %peer, message = %message, "Received datagram");

    let replies = udp_replies(&message);
    for reply in &replies {
        socket
            .send_to(reply, peer)
            .await
            .map_err(|source| EchoError::Send { peer, source })?;
    }
    debug!(peer = %peer, replies = replies.len(), "Sent response");

    if replies.len() > 1 {
        info!(peer = %peer, "Client requested disconnect");
    }

    Ok(replies.len())
}
