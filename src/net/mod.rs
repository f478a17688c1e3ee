//! Non-blocking TCP transport.
//!
//! Grounded on `examples/original_source/src/net.c`'s `node_connect` /
//! `node_listen` / `node_accept` / `node_send` / `node_recv`: a fixed
//! backlog of 5, `SO_REUSEADDR` on listeners, and — the detail that
//! matters most — `node_send`/`node_recv` only treat a narrow set of
//! errnos (`ECONNRESET`, `ENOTCONN`, `EBADF`, `ENOTSOCK`) as fatal.
//! Everything else, including `EWOULDBLOCK`/`EAGAIN`, is "no progress
//! right now", not "connection gone". `socket2` replaces the original's
//! raw `fcntl(O_NONBLOCK)` calls with a safe, portable equivalent; it's
//! the same low-level-socket-control role the teacher crate reaches for
//! `i2p`'s raw `TcpStream` for, just with explicit non-blocking control.

use core::fmt;
use std::io::{self, Read, Write};
use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};

const LISTEN_BACKLOG: i32 = 5;

#[derive(Debug)]
pub enum NetError {
    Io(std::io::Error),
    InvalidAddress(String),
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetError::Io(e) => write!(f, "network I/O error: {e}"),
            NetError::InvalidAddress(s) => write!(f, "invalid address: {s}"),
        }
    }
}

impl std::error::Error for NetError {}

impl From<std::io::Error> for NetError {
    fn from(e: std::io::Error) -> Self {
        NetError::Io(e)
    }
}

fn would_block(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
}

/// Matches `node.c`'s fatal-errno set: everything else is transient.
fn is_fatal(e: &io::Error) -> bool {
    match e.kind() {
        io::ErrorKind::ConnectionReset | io::ErrorKind::NotConnected | io::ErrorKind::BrokenPipe => true,
        _ => matches!(e.raw_os_error(), Some(libc::EBADF) | Some(libc::ENOTSOCK)),
    }
}

/// Splits `spec` on its last `:` to separate host from port, falling
/// back to `default_port` when no `:` is present. Grounded on
/// `net.c`'s `parse_address`, which applies the same "last colon"
/// splitting so IPv6 literals without brackets still parse as host:port.
pub fn parse_address(spec: &str, default_port: u16) -> Result<SocketAddr, NetError> {
    use std::net::ToSocketAddrs;

    let candidate = match spec.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) && !port.is_empty() => {
            format!("{host}:{port}")
        }
        _ => format!("{spec}:{default_port}"),
    };

    candidate
        .to_socket_addrs()
        .map_err(|_| NetError::InvalidAddress(spec.to_string()))?
        .next()
        .ok_or_else(|| NetError::InvalidAddress(spec.to_string()))
}

/// Result of a non-blocking send attempt.
pub enum SendOutcome {
    Sent(usize),
    WouldBlock,
}

/// Result of a non-blocking receive attempt.
pub enum RecvOutcome {
    Read(usize),
    WouldBlock,
    /// The peer performed an orderly shutdown.
    Closed,
}

/// One non-blocking TCP connection, in either direction.
pub struct Endpoint {
    socket: Socket,
}

impl Endpoint {
    /// Begins a non-blocking connect. Returns immediately; the caller
    /// must wait for the socket to become writable and then call
    /// [`Endpoint::take_error`] to learn whether the connect actually
    /// succeeded, mirroring `chat.c`'s `active_connect`.
    pub fn connect(addr: SocketAddr) -> Result<Self, NetError> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_nonblocking(true)?;
        match socket.connect(&addr.into()) {
            Ok(()) => {}
            Err(e) if would_block(&e) || e.kind() == io::ErrorKind::NotConnected => {}
            Err(e) => return Err(e.into()),
        }
        Ok(Self { socket })
    }

    /// Reads and clears `SO_ERROR`. `Ok(None)` means the connect (or
    /// prior I/O) completed cleanly.
    pub fn take_error(&self) -> Result<Option<NetError>, NetError> {
        Ok(self.socket.take_error()?.map(NetError::Io))
    }

    pub fn send(&mut self, buf: &[u8]) -> Result<SendOutcome, NetError> {
        match self.socket.write(buf) {
            Ok(n) => Ok(SendOutcome::Sent(n)),
            Err(e) if would_block(&e) => Ok(SendOutcome::WouldBlock),
            Err(e) if is_fatal(&e) => Err(e.into()),
            Err(_) => Ok(SendOutcome::WouldBlock),
        }
    }

    pub fn recv(&mut self, buf: &mut [u8]) -> Result<RecvOutcome, NetError> {
        match self.socket.read(buf) {
            Ok(0) if !buf.is_empty() => Ok(RecvOutcome::Closed),
            Ok(n) => Ok(RecvOutcome::Read(n)),
            Err(e) if would_block(&e) => Ok(RecvOutcome::WouldBlock),
            Err(e) if is_fatal(&e) => Err(e.into()),
            Err(_) => Ok(RecvOutcome::WouldBlock),
        }
    }

    /// Human-readable `host:port` for the remote peer, used in status
    /// lines. Grounded on `net.c`'s `node_get_address`.
    pub fn get_address(&self) -> Result<String, NetError> {
        let addr: SocketAddr = self.socket.peer_addr()?.as_socket().ok_or_else(|| {
            NetError::InvalidAddress("non-IP peer address".to_string())
        })?;
        Ok(addr.to_string())
    }

    /// Exposes the underlying socket for readiness registration with
    /// the reactor's `polling::Poller`.
    pub fn socket(&self) -> &Socket {
        &self.socket
    }
}

/// A bound, listening, non-blocking TCP socket.
pub struct Listener {
    socket: Socket,
}

impl Listener {
    pub fn bind(addr: SocketAddr) -> Result<Self, NetError> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        socket.listen(LISTEN_BACKLOG)?;
        Ok(Self { socket })
    }

    /// Accepts a pending connection, if any. `Ok(None)` means nothing is
    /// waiting right now.
    pub fn accept(&self) -> Result<Option<Endpoint>, NetError> {
        match self.socket.accept() {
            Ok((socket, _addr)) => {
                socket.set_nonblocking(true)?;
                Ok(Some(Endpoint { socket }))
            }
            Err(e) if would_block(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn socket(&self) -> &Socket {
        &self.socket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_address_uses_last_colon() {
        let addr = parse_address("127.0.0.1:9001", 14137).unwrap();
        assert_eq!(addr.port(), 9001);
    }

    #[test]
    fn parse_address_falls_back_to_default_port() {
        let addr = parse_address("127.0.0.1", 14137).unwrap();
        assert_eq!(addr.port(), 14137);
    }

    #[test]
    fn connect_accept_round_trip_sends_bytes() {
        let listener = Listener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let local_addr = listener.socket().local_addr().unwrap().as_socket().unwrap();

        let mut client = Endpoint::connect(local_addr).unwrap();

        let mut server = None;
        for _ in 0..1000 {
            if let Some(ep) = listener.accept().unwrap() {
                server = Some(ep);
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        let mut server = server.expect("listener should have accepted a connection");

        loop {
            match client.send(b"hi").unwrap() {
                SendOutcome::Sent(n) => {
                    assert_eq!(n, 2);
                    break;
                }
                SendOutcome::WouldBlock => continue,
            }
        }

        let mut buf = [0u8; 2];
        let mut total = 0;
        while total < 2 {
            match server.recv(&mut buf[total..]).unwrap() {
                RecvOutcome::Read(n) => total += n,
                RecvOutcome::WouldBlock => continue,
                RecvOutcome::Closed => panic!("unexpected close"),
            }
        }
        assert_eq!(&buf, b"hi");
    }
}
