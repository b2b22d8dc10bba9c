//! Interactive TCP echo client.
//!
//! A background reader prints response lines while the foreground loop
//! sends operator lines. The two halves share one socket, which is closed
//! only after the reader has been joined.

use crate::config::Config;
use crate::console::{display_line, ClientExit, OperatorInput};
use crate::error::EchoError;
use crate::net;
use crate::protocol::{decode, is_quit, strip_line_ending};
use crate::shutdown::{self, ShutdownSignal, ShutdownTrigger};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Connected client
pub struct TcpEchoClient {
    stream: TcpStream,
    server: SocketAddr,
    shutdown_grace: Duration,
}

impl TcpEchoClient {
    /// Resolve and connect once; no retry.
    ///
    /// Every resolved address is tried in order, so `localhost` reaches a
    /// server bound to either `127.0.0.1` or `::1`.
    pub async fn connect(config: &Config) -> Result<Self, EchoError> {
        let mut last_err = None;

        for server in net::resolve_all(&config.host, config.port).await? {
            match TcpStream::connect(server).await {
                Ok(stream) => {
                    info!(server = %server, "Connected to server");
                    return Ok(TcpEchoClient {
                        stream,
                        server,
                        shutdown_grace: config.shutdown_grace,
                    });
                }
                Err(source) => {
                    debug!(server = %server, error = %source, "Connect attempt failed");
                    last_err = Some(EchoError::Connect {
                        addr: server,
                        source,
                    });
                }
            }
        }

        // resolve_all never returns an empty list
        Err(last_err.unwrap_or_else(|| EchoError::Resolve {
            host: config.host.clone(),
            source: io::Error::new(io::ErrorKind::NotFound, "no addresses found"),
        }))
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server
    }

    /// Run the session until the operator quits, input ends or the server
    /// hangs up.
    ///
    /// Responses are written to `display` as `Server: <line>`.
    pub async fn run<R, W>(self, operator: R, display: W) -> Result<ClientExit, EchoError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (read_half, mut write_half) = self.stream.into_split();

        let (cancel, cancel_signal) = shutdown::channel();
        let (reader_done, mut server_closed) = shutdown::channel();
        let mut reader = tokio::spawn(read_responses(read_half, display, cancel_signal, reader_done));

        let mut operator = OperatorInput::new(operator);
        let outcome = loop {
            let line = tokio::select! {
                _ = server_closed.wait() => break Ok(ClientExit::ServerClosed),
                line = operator.next_line() => line,
            };

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => break Ok(ClientExit::InputClosed),
                Err(e) => break Err(e),
            };

            if let Err(e) = send_line(&mut write_half, &line).await {
                break Err(EchoError::Session(e));
            }

            if is_quit(&line) {
                info!("Disconnecting from server");
                break Ok(ClientExit::Quit);
            }
        };

        // Half-close so the server sees end of stream, then let the reader
        // drain whatever is still in flight.
        if let Err(e) = write_half.shutdown().await {
            debug!(error = %e, "Write half already closed");
        }
        stop_reader(&mut reader, &cancel, self.shutdown_grace).await;
        drop(write_half);

        info!("Client disconnected");
        outcome
    }
}

async fn send_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

/// Give the reader `grace` to finish on its own, then cancel it.
async fn stop_reader(reader: &mut JoinHandle<()>, cancel: &ShutdownTrigger, grace: Duration) {
    if timeout(grace, &mut *reader).await.is_ok() {
        return;
    }

    cancel.trigger();
    if timeout(grace, &mut *reader).await.is_err() {
        warn!("Response reader did not stop in time");
        reader.abort();
    }
}

async fn read_responses<W>(
    read_half: OwnedReadHalf,
    mut display: W,
    mut cancel: ShutdownSignal,
    done: ShutdownTrigger,
) where
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::with_capacity(1024);

    loop {
        buf.clear();
        let read = tokio::select! {
            _ = cancel.wait() => break,
            read = reader.read_until(b'\n', &mut buf) => read,
        };

        match read {
            Ok(0) => {
                debug!("Server closed the connection");
                break;
            }
            Ok(_) => {
                let line = decode(strip_line_ending(&buf));
                if let Err(e) = display_line(&mut display, &format!("Server: {line}")).await {
                    warn!(error = %e, "Could not write to display");
                    break;
                }
            }
            Err(e) => {
                // A read failing because we tore the socket down is not an error.
                if !cancel.is_triggered() {
                    error!(error = %e, "Error receiving from server");
                }
                break;
            }
        }
    }

    done.trigger();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Endpoint;
    use crate::tcp::TcpEchoServer;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    async fn start_server() -> (SocketAddr, ShutdownTrigger) {
        let config = Config::loopback(Endpoint::TcpServer, 0);
        let server = TcpEchoServer::bind(&config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (trigger, signal) = shutdown::channel();
        tokio::spawn(server.run(signal));
        (addr, trigger)
    }

    async fn collect(mut display: tokio::io::DuplexStream) -> String {
        let mut out = String::new();
        timeout(Duration::from_secs(2), display.read_to_string(&mut out))
            .await
            .unwrap()
            .unwrap();
        out
    }

    #[tokio::test]
    async fn test_session_until_quit() {
        let (addr, _server) = start_server().await;
        let config = Config::loopback(Endpoint::TcpClient, addr.port());
        let client = TcpEchoClient::connect(&config).await.unwrap();
        assert_eq!(client.server_addr(), addr);

        let (display, screen) = tokio::io::duplex(4096);
        let operator: &[u8] = b"hello\n\n   \nquit\nnever sent\n";

        let exit = timeout(Duration::from_secs(3), client.run(operator, display))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exit, ClientExit::Quit);
        assert_eq!(
            collect(screen).await,
            "Server: Server received: hello\nServer: Server received: quit\n"
        );
    }

    #[tokio::test]
    async fn test_input_eof_ends_session() {
        let (addr, _server) = start_server().await;
        let config = Config::loopback(Endpoint::TcpClient, addr.port());
        let client = TcpEchoClient::connect(&config).await.unwrap();

        let (display, screen) = tokio::io::duplex(4096);
        let operator: &[u8] = b"only line\n";

        let exit = client.run(operator, display).await.unwrap();
        assert_eq!(exit, ClientExit::InputClosed);
        assert_eq!(collect(screen).await, "Server: Server received: only line\n");
    }

    #[tokio::test]
    async fn test_server_hangup_ends_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let config = Config::loopback(Endpoint::TcpClient, addr.port());
        let client = TcpEchoClient::connect(&config).await.unwrap();

        // operator stays silent with input still open
        let (_keyboard, operator) = tokio::io::duplex(64);
        let (display, _screen) = tokio::io::duplex(64);

        let exit = timeout(
            Duration::from_secs(2),
            client.run(BufReader::new(operator), display),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(exit, ClientExit::ServerClosed);
    }

    #[tokio::test]
    async fn test_localhost_reaches_ipv4_only_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let mut config = Config::loopback(Endpoint::TcpClient, addr.port());
        config.host = "localhost".to_string();
        let client = TcpEchoClient::connect(&config).await.unwrap();
        assert_eq!(client.server_addr(), addr);
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };

        let config = Config::loopback(Endpoint::TcpClient, addr.port());
        let err = TcpEchoClient::connect(&config).await.err().unwrap();
        assert!(matches!(err, EchoError::Connect { .. }));
        assert!(err.is_fatal());
    }
}
