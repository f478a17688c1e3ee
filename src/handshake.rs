//! Two-phase pad-identification handshake.
//!
//! Phase 1 exchanges a fixed 24-byte block (an 8-byte protocol magic
//! plus each side's 16-byte pad id) so both ends can look up which pad
//! the other is using. Phase 2 exchanges a single accept/reject byte;
//! the session is only usable if both sides sent accept. Grounded on
//! `examples/original_source/src/net.c`'s `node_handshake`, including
//! its use of a wall-clock deadline rather than a fixed round count —
//! `node_exchange` there decrements a `timeval` budget every iteration
//! of its `select()` loop, which this reproduces with an `Instant`
//! deadline checked around the endpoint's own non-blocking send/recv.

use core::fmt;
use std::io;
use std::thread;
use std::time::{Duration, Instant};

use crate::net::{Endpoint, NetError, RecvOutcome, SendOutcome};

const MAGIC: &[u8; 8] = b"OTPCHAT0";
const ACCEPT: u8 = 1;
const REJECT: u8 = 0;

#[derive(Debug)]
pub enum HandshakeError {
    /// The peer's phase-1 block didn't start with the expected magic.
    BadMagic,
    /// Either side sent `REJECT`, or the pad ids didn't match anything.
    Rejected,
    /// The bounded exchange didn't finish before the deadline.
    Timeout,
    Net(NetError),
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeError::BadMagic => write!(f, "handshake magic mismatch"),
            HandshakeError::Rejected => write!(f, "handshake rejected"),
            HandshakeError::Timeout => write!(f, "handshake timed out"),
            HandshakeError::Net(e) => write!(f, "handshake network error: {e}"),
        }
    }
}

impl std::error::Error for HandshakeError {}

impl From<NetError> for HandshakeError {
    fn from(e: NetError) -> Self {
        HandshakeError::Net(e)
    }
}

/// What the handshake established: which of our remote pads the peer
/// is speaking with.
pub struct HandshakeOutcome {
    pub peer_id: [u8; 16],
}

/// Runs the full handshake to completion or failure within `timeout`.
///
/// `accept_peer` decides, given the peer's announced pad id, whether we
/// hold a matching remote pad — the caller wires this to
/// `PadStore::find`. Busy-waits in short increments between non-blocking
/// send/recv attempts; this runs once per connection, before the
/// session is handed to the reactor, so it does not compete with the
/// reactor's own readiness loop.
pub fn handshake(
    endpoint: &mut Endpoint,
    local_id: &[u8; 16],
    accept_peer: impl Fn(&[u8; 16]) -> bool,
    timeout: Duration,
) -> Result<HandshakeOutcome, HandshakeError> {
    let deadline = Instant::now() + timeout;

    let mut outbound = Vec::with_capacity(24);
    outbound.extend_from_slice(MAGIC);
    outbound.extend_from_slice(local_id);
    write_all_bounded(endpoint, &outbound, deadline)?;

    let mut inbound = [0u8; 24];
    read_exact_bounded(endpoint, &mut inbound, deadline)?;
    if &inbound[..8] != MAGIC {
        return Err(HandshakeError::BadMagic);
    }
    let mut peer_id = [0u8; 16];
    peer_id.copy_from_slice(&inbound[8..24]);

    let decision = if accept_peer(&peer_id) { ACCEPT } else { REJECT };
    write_all_bounded(endpoint, &[decision], deadline)?;

    let mut peer_decision = [0u8; 1];
    read_exact_bounded(endpoint, &mut peer_decision, deadline)?;

    if decision != ACCEPT || peer_decision[0] != ACCEPT {
        return Err(HandshakeError::Rejected);
    }

    Ok(HandshakeOutcome { peer_id })
}

fn write_all_bounded(endpoint: &mut Endpoint, buf: &[u8], deadline: Instant) -> Result<(), HandshakeError> {
    let mut sent = 0;
    while sent < buf.len() {
        if Instant::now() >= deadline {
            return Err(HandshakeError::Timeout);
        }
        match endpoint.send(&buf[sent..])? {
            SendOutcome::Sent(n) => sent += n,
            SendOutcome::WouldBlock => thread::sleep(Duration::from_millis(1)),
        }
    }
    Ok(())
}

fn read_exact_bounded(endpoint: &mut Endpoint, buf: &mut [u8], deadline: Instant) -> Result<(), HandshakeError> {
    let mut read = 0;
    while read < buf.len() {
        if Instant::now() >= deadline {
            return Err(HandshakeError::Timeout);
        }
        match endpoint.recv(&mut buf[read..])? {
            RecvOutcome::Read(n) => read += n,
            RecvOutcome::WouldBlock => thread::sleep(Duration::from_millis(1)),
            RecvOutcome::Closed => {
                return Err(HandshakeError::Net(NetError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "peer closed during handshake",
                ))))
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::Listener;

    fn connected_pair() -> (Endpoint, Endpoint) {
        let listener = Listener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.socket().local_addr().unwrap().as_socket().unwrap();
        let client = Endpoint::connect(addr).unwrap();
        let mut server = None;
        for _ in 0..1000 {
            if let Some(ep) = listener.accept().unwrap() {
                server = Some(ep);
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        (client, server.expect("listener should have accepted"))
    }

    #[test]
    fn mutual_accept_succeeds_with_matching_ids() {
        let (mut a, mut b) = connected_pair();
        let id_a = [1u8; 16];
        let id_b = [2u8; 16];

        let handle = thread::spawn(move || {
            handshake(&mut b, &id_b, |_| true, Duration::from_millis(500))
        });

        let outcome_a = handshake(&mut a, &id_a, |_| true, Duration::from_millis(500)).unwrap();
        let outcome_b = handle.join().unwrap().unwrap();

        assert_eq!(outcome_a.peer_id, id_b);
        assert_eq!(outcome_b.peer_id, id_a);
    }

    #[test]
    fn one_sided_rejection_fails_both_ends() {
        let (mut a, mut b) = connected_pair();
        let id_a = [1u8; 16];
        let id_b = [2u8; 16];

        let handle = thread::spawn(move || {
            handshake(&mut b, &id_b, |_| false, Duration::from_millis(500))
        });

        let result_a = handshake(&mut a, &id_a, |_| true, Duration::from_millis(500));
        let result_b = handle.join().unwrap();

        assert!(matches!(result_a, Err(HandshakeError::Rejected)));
        assert!(matches!(result_b, Err(HandshakeError::Rejected)));
    }
}
