//! Socket setup shared by servers and clients.

use crate::error::EchoError;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::{TcpListener, UdpSocket};
use tracing::warn;

/// Listen backlog for the TCP server.
const LISTEN_BACKLOG: i32 = 1024;

/// Resolve `host:port` to its first address.
pub async fn resolve(host: &str, port: u16) -> Result<SocketAddr, EchoError> {
    let addrs = resolve_all(host, port).await?;
    Ok(addrs[0])
}

/// Resolve `host:port` to every address, in resolver order. Never empty.
pub async fn resolve_all(host: &str, port: u16) -> Result<Vec<SocketAddr>, EchoError> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|source| EchoError::Resolve {
            host: host.to_string(),
            source,
        })?
        .collect();

    if addrs.is_empty() {
        return Err(EchoError::Resolve {
            host: host.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no addresses found"),
        });
    }

    Ok(addrs)
}

/// Bind a TCP listener with `SO_REUSEADDR` so a restarted server can rebind at once.
///
/// Binding `[::]` accepts IPv4 clients too.
pub fn bind_tcp_listener(addr: SocketAddr) -> Result<TcpListener, EchoError> {
    let bind_err = |source| EchoError::Bind {
        addr: addr.to_string(),
        source,
    };

    let socket = bind_socket(addr, socket2::Type::STREAM, socket2::Protocol::TCP, true)
        .map_err(bind_err)?;
    socket.listen(LISTEN_BACKLOG).map_err(bind_err)?;

    TcpListener::from_std(socket.into()).map_err(bind_err)
}

/// Bind a UDP socket. The port must be free: a second server on the same
/// port is a bind error, not a silent split of the traffic.
///
/// Binding `[::]` receives IPv4 datagrams too.
pub fn bind_udp_socket(addr: SocketAddr) -> Result<UdpSocket, EchoError> {
    let bind_err = |source| EchoError::Bind {
        addr: addr.to_string(),
        source,
    };

    let socket = bind_socket(addr, socket2::Type::DGRAM, socket2::Protocol::UDP, false)
        .map_err(bind_err)?;

    UdpSocket::from_std(socket.into()).map_err(bind_err)
}

/// Ephemeral local address in the same family as `remote`.
pub fn unspecified_for(remote: SocketAddr) -> SocketAddr {
    match remote {
        SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
    }
}

fn is_dual_stack(addr: SocketAddr) -> bool {
    addr.is_ipv6() && addr.ip().is_unspecified()
}

/// Bind `addr`; `[::]` falls back to `0.0.0.0` on hosts without IPv6.
fn bind_socket(
    addr: SocketAddr,
    ty: socket2::Type,
    protocol: socket2::Protocol,
    reuse_address: bool,
) -> io::Result<socket2::Socket> {
    match new_socket(addr, ty, protocol, reuse_address) {
        Err(e) if is_dual_stack(addr) && e.kind() != io::ErrorKind::AddrInUse => {
            let v4 = SocketAddr::from((Ipv4Addr::UNSPECIFIED, addr.port()));
            warn!(
                address = %addr,
                error = %e,
                fallback = %v4,
                "IPv6 unavailable, binding IPv4 only"
            );
            new_socket(v4, ty, protocol, reuse_address)
        }
        result => result,
    }
}

fn new_socket(
    addr: SocketAddr,
    ty: socket2::Type,
    protocol: socket2::Protocol,
    reuse_address: bool,
) -> io::Result<socket2::Socket> {
    let socket = socket2::Socket::new(socket2::Domain::for_address(addr), ty, Some(protocol))?;

    if reuse_address {
        socket.set_reuse_address(true)?;
    }
    if is_dual_stack(addr) {
        socket.set_only_v6(false)?;
    }
    // tokio requires non-blocking std sockets
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;

    Ok(socket)
}
