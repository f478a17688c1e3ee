//! Connection state machine: NotConnected → Connecting → Connected.
//!
//! Narrowed from the teacher's six-state `protocol::state_machine`
//! (Offline/Bootstrapping/Active/ConsensusPending/Recovery/Lockdown) to
//! the three states this point-to-point protocol actually has, kept in
//! the same guarded-match style: every transition checks the current
//! state and rejects anything it doesn't recognize rather than silently
//! overwriting it.

use core::fmt;

use crate::framing::FrameReader;
use crate::net::{Endpoint, NetError, SendOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotConnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    InvalidTransition,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidTransition => write!(f, "invalid session state transition"),
        }
    }
}

impl std::error::Error for SessionError {}

/// The single peer connection this process maintains at a time.
pub struct Session {
    state: SessionState,
    endpoint: Option<Endpoint>,
    remote_id: Option<[u8; 16]>,
    reader: FrameReader,
    /// Bytes of the current outbound frame not yet accepted by the
    /// socket. Drained opportunistically whenever the peer fd is
    /// writable, so a slow peer never forces a send to block.
    outbound: Vec<u8>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::NotConnected,
            endpoint: None,
            remote_id: None,
            reader: FrameReader::new(),
            outbound: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Adopts a freshly connected or accepted endpoint, ahead of its
    /// handshake. Refuses to displace an endpoint that's already
    /// connecting or connected — a second accept while CONNECTED is
    /// dropped by the caller before it ever reaches here.
    pub fn begin_connecting(&mut self, endpoint: Endpoint) -> Result<(), SessionError> {
        match self.state {
            SessionState::NotConnected => {
                self.endpoint = Some(endpoint);
                self.state = SessionState::Connecting;
                Ok(())
            }
            SessionState::Connecting | SessionState::Connected => Err(SessionError::InvalidTransition),
        }
    }

    /// Records the handshake's outcome and moves to Connected.
    pub fn mark_connected(&mut self, remote_id: [u8; 16]) -> Result<(), SessionError> {
        match self.state {
            SessionState::Connecting => {
                self.remote_id = Some(remote_id);
                self.state = SessionState::Connected;
                Ok(())
            }
            _ => Err(SessionError::InvalidTransition),
        }
    }

    /// Tears the session down from any state, ready for a fresh
    /// connect/listen.
    pub fn disconnect(&mut self) {
        self.state = SessionState::NotConnected;
        self.endpoint = None;
        self.remote_id = None;
        self.reader = FrameReader::new();
        self.outbound.clear();
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    pub fn endpoint_mut(&mut self) -> Option<&mut Endpoint> {
        self.endpoint.as_mut()
    }

    pub fn remote_id(&self) -> Option<&[u8; 16]> {
        self.remote_id.as_ref()
    }

    pub fn reader_mut(&mut self) -> &mut FrameReader {
        &mut self.reader
    }

    /// Appends a fully encoded frame to the outbound buffer.
    pub fn queue_outbound(&mut self, bytes: &[u8]) {
        self.outbound.extend_from_slice(bytes);
    }

    pub fn has_outbound(&self) -> bool {
        !self.outbound.is_empty()
    }

    /// Pushes as much of the outbound buffer onto the socket as it will
    /// currently accept, without blocking. Leaves any remainder queued
    /// for the next write-ready event.
    pub fn drain_outbound(&mut self) -> Result<(), NetError> {
        let Some(endpoint) = self.endpoint.as_mut() else { return Ok(()) };
        while !self.outbound.is_empty() {
            match endpoint.send(&self.outbound)? {
                SendOutcome::Sent(n) => {
                    self.outbound.drain(..n);
                }
                SendOutcome::WouldBlock => break,
            }
        }
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
