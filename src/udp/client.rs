//! Interactive UDP echo client.
//!
//! The foreground loop sends one datagram per operator line. A background
//! receiver prints replies, treats a receive timeout as "keep listening",
//! and stops on the server's goodbye or when cancelled.

use crate::config::Config;
use crate::console::{display_line, ClientExit, OperatorInput};
use crate::error::EchoError;
use crate::net;
use crate::protocol::{decode, is_goodbye, is_quit, MAX_DATAGRAM_SIZE, UDP_RESPONSE_PREFIX};
use crate::shutdown::{self, ShutdownSignal, ShutdownTrigger};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

/// Large enough for the longest echo the server produces.
const REPLY_BUFFER_SIZE: usize = MAX_DATAGRAM_SIZE + UDP_RESPONSE_PREFIX.len();

/// Client bound to an ephemeral local port
pub struct UdpEchoClient {
    socket: Arc<UdpSocket>,
    server: SocketAddr,
    recv_timeout: Duration,
    shutdown_grace: Duration,
}

impl UdpEchoClient {
    /// Resolve the server once and bind a local socket of the same family.
    pub async fn connect(config: &Config) -> Result<Self, EchoError> {
        let server = net::resolve(&config.host, config.port).await?;
        let local = net::unspecified_for(server);
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|source| EchoError::Bind {
                addr: local.to_string(),
                source,
            })?;

        info!(server = %server, "UDP client ready");

        Ok(UdpEchoClient {
            socket: Arc::new(socket),
            server,
            recv_timeout: config.recv_timeout,
            shutdown_grace: config.shutdown_grace,
        })
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server
    }

    /// Run the session until the operator quits or input ends.
    ///
    /// Replies are written to `display` as `Server: <message>`.
    pub async fn run<R, W>(self, operator: R, display: W) -> Result<ClientExit, EchoError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (cancel, cancel_signal) = shutdown::channel();
        let mut receiver = tokio::spawn(receive_replies(
            Arc::clone(&self.socket),
            display,
            self.recv_timeout,
            cancel_signal,
        ));

        let mut operator = OperatorInput::new(operator);
        let outcome = loop {
            let line = match operator.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break Ok(ClientExit::InputClosed),
                Err(e) => break Err(e),
            };

            if let Err(source) = self.socket.send_to(line.as_bytes(), self.server).await {
                let e = EchoError::Send {
                    peer: self.server,
                    source,
                };
                error!(error = %e, "Error sending message");
                continue;
            }
            debug!(bytes = line.len(), "Message sent to server");

            if is_quit(&line) {
                info!("Disconnecting from server");
                break Ok(ClientExit::Quit);
            }
        };

        // After a quit, give the goodbye a chance to arrive before cancelling.
        let waited = matches!(outcome, Ok(ClientExit::Quit))
            && timeout(self.shutdown_grace, &mut receiver).await.is_ok();
        if !waited {
            stop_receiver(&mut receiver, &cancel, self.shutdown_grace).await;
        }

        info!("UDP client disconnected");
        outcome
    }
}

/// Cancel the receiver and wait up to `grace` for it to finish.
async fn stop_receiver(receiver: &mut JoinHandle<()>, cancel: &ShutdownTrigger, grace: Duration) {
    cancel.trigger();
    if timeout(grace, &mut *receiver).await.is_err() {
        warn!("Receiver did not stop within grace period");
        receiver.abort();
    }
}

async fn receive_replies<W>(
    socket: Arc<UdpSocket>,
    mut display: W,
    recv_timeout: Duration,
    mut cancel: ShutdownSignal,
) where
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; REPLY_BUFFER_SIZE];

    loop {
        let received = tokio::select! {
            _ = cancel.wait() => break,
            received = timeout(recv_timeout, socket.recv_from(&mut buf)) => received,
        };

        let (len, from) = match received {
            Ok(Ok(pair)) => pair,
            Err(_) => {
                trace!("No reply within receive timeout");
                continue;
            }
            Ok(Err(e)) => {
                if !cancel.is_triggered() {
                    error!(error = %EchoError::Receive(e), "Error receiving from server");
                }
                break;
            }
        };

        let message = decode(&buf[..len]).into_owned();
        debug!(from = %from, bytes = len, "Reply received");

        if let Err(e) = display_line(&mut display, &format!("Server: {message}")).await {
            warn!(error = %e, "Could not write to display");
            break;
        }

        if is_goodbye(&message) {
            if let Err(e) = display_line(&mut display, "Server acknowledged disconnect").await {
                warn!(error = %e, "Could not write to display");
            }
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Endpoint;
    use crate::udp::UdpEchoServer;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

    async fn collect(mut screen: tokio::io::DuplexStream) -> String {
        let mut out = String::new();
        timeout(Duration::from_secs(2), screen.read_to_string(&mut out))
            .await
            .unwrap()
            .unwrap();
        out
    }

    #[tokio::test]
    async fn test_session_until_goodbye() {
        let config = Config::loopback(Endpoint::UdpServer, 0);
        let server = UdpEchoServer::bind(&config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (_trigger, signal) = shutdown::channel();
        tokio::spawn(server.run(signal));

        let config = Config::loopback(Endpoint::UdpClient, addr.port());
        let client = UdpEchoClient::connect(&config).await.unwrap();
        assert_eq!(client.server_addr(), addr);

        let (mut keyboard, operator) = tokio::io::duplex(64);
        let (display, screen) = tokio::io::duplex(4096);
        let session = tokio::spawn(client.run(BufReader::new(operator), display));
        let mut screen = BufReader::new(screen);

        keyboard.write_all(b"hello\n\n").await.unwrap();
        let mut line = String::new();
        timeout(Duration::from_secs(2), screen.read_line(&mut line))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(line, "Server: UDP Server received: hello\n");

        keyboard.write_all(b"quit\n").await.unwrap();
        let exit = timeout(Duration::from_secs(3), session)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(exit, ClientExit::Quit);

        let mut rest = String::new();
        screen.read_to_string(&mut rest).await.unwrap();
        assert_eq!(
            rest,
            "Server: UDP Server received: quit\n\
             Server: Goodbye from UDP Server!\n\
             Server acknowledged disconnect\n"
        );
    }

    #[tokio::test]
    async fn test_receive_timeout_keeps_listening() {
        // a server that stays silent until it sees quit
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = Config::loopback(Endpoint::UdpClient, silent.local_addr().unwrap().port());
        let client = UdpEchoClient::connect(&config).await.unwrap();

        let (mut keyboard, operator) = tokio::io::duplex(64);
        let (display, screen) = tokio::io::duplex(4096);
        let session = tokio::spawn(client.run(BufReader::new(operator), display));

        // several 50ms receive windows pass without a reply
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!session.is_finished());

        keyboard.write_all(b"quit\n").await.unwrap();
        let mut buf = [0u8; 64];
        let (len, from) = timeout(Duration::from_secs(2), silent.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], b"quit");
        silent.send_to(b"Goodbye from UDP Server!", from).await.unwrap();

        let exit = timeout(Duration::from_secs(2), session)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(exit, ClientExit::Quit);
        assert_eq!(
            collect(screen).await,
            "Server: Goodbye from UDP Server!\nServer acknowledged disconnect\n"
        );
    }

    #[tokio::test]
    async fn test_input_eof_cancels_receiver() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = Config::loopback(Endpoint::UdpClient, silent.local_addr().unwrap().port());
        let client = UdpEchoClient::connect(&config).await.unwrap();

        let (display, screen) = tokio::io::duplex(64);
        let operator: &[u8] = b"";

        let exit = timeout(Duration::from_secs(2), client.run(operator, display))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exit, ClientExit::InputClosed);
        assert_eq!(collect(screen).await, "");
    }

    #[tokio::test]
    async fn test_unknown_host() {
        let mut config = Config::loopback(Endpoint::UdpClient, 8081);
        config.host = "host.invalid".to_string();
        let err = UdpEchoClient::connect(&config).await.err().unwrap();
        assert!(matches!(err, EchoError::Resolve { .. }));
    }
}
