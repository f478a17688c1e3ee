//! Single-threaded readiness loop driving one session.
//!
//! Grounded on `examples/original_source/src/chat.c`'s `passive_connect`
//! / `active_connect` (a `select()` loop that waits on a listening or
//! connecting socket until a handshake succeeds) and `command.c`'s
//! `command_handle`/`command_table` dispatch, adapted to a single
//! non-blocking loop that also multiplexes stdin: nothing here ever
//! blocks waiting on one source while another has work ready. `polling`
//! replaces the original's raw `select()`/`FD_SET` calls with a safe,
//! portable readiness primitive — the same role the teacher crate's
//! state machine and net modules play individually, brought together
//! here since this binary has no OS thread pool to lean on.

use core::fmt;
use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::os::unix::io::AsRawFd;
use std::time::Duration;

use log::{debug, warn};
use polling::{Event, Events, Poller};

use crate::codec::CodecError;
use crate::config::Config;
use crate::framing::FramingError;
use crate::handshake;
use crate::message::Message;
use crate::net::{Endpoint, Listener, NetError, RecvOutcome};
use crate::pad::PadStore;
use crate::session::{Session, SessionState};

const STDIN_KEY: usize = 0;
const LISTENER_KEY: usize = 1;
const PEER_KEY: usize = 2;

const RECV_CHUNK: usize = 4096;
const POLL_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug)]
pub enum ReactorError {
    Io(std::io::Error),
    Net(NetError),
    Framing(FramingError),
}

impl fmt::Display for ReactorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReactorError::Io(e) => write!(f, "reactor I/O error: {e}"),
            ReactorError::Net(e) => write!(f, "reactor network error: {e}"),
            ReactorError::Framing(e) => write!(f, "reactor framing error: {e}"),
        }
    }
}

impl std::error::Error for ReactorError {}

impl From<std::io::Error> for ReactorError {
    fn from(e: std::io::Error) -> Self {
        ReactorError::Io(e)
    }
}

impl From<NetError> for ReactorError {
    fn from(e: NetError) -> Self {
        ReactorError::Net(e)
    }
}

impl From<FramingError> for ReactorError {
    fn from(e: FramingError) -> Self {
        ReactorError::Framing(e)
    }
}

/// Owns the pad store, the current session, an optional listener, and
/// the stdin/peer readiness registrations; drives the whole chat.
pub struct Reactor {
    config: Config,
    pads: PadStore,
    session: Session,
    listener: Option<Listener>,
    poller: Poller,
    stdin: io::Stdin,
    running: bool,
}

impl Reactor {
    pub fn new(config: Config, pads: PadStore) -> Result<Self, ReactorError> {
        let poller = Poller::new()?;
        let stdin = io::stdin();
        unsafe {
            poller.add(stdin.as_raw_fd(), Event::readable(STDIN_KEY))?;
        }
        Ok(Self {
            config,
            pads,
            session: Session::new(),
            listener: None,
            poller,
            stdin,
            running: true,
        })
    }

    /// Begins listening immediately, mirroring `otpchat host local.pad
    /// remote.pad` with a bare port (`chat_begin_listen` called up
    /// front rather than via a `/listen` command).
    pub fn listen_on(&mut self, addr: SocketAddr) -> Result<(), ReactorError> {
        self.begin_listen(addr.port())
    }

    /// Begins connecting immediately, mirroring the active-connect
    /// invocation form.
    pub fn connect_to(&mut self, addr: SocketAddr) -> Result<(), ReactorError> {
        self.begin_connect(addr)
    }

    /// Runs until `/quit` or stdin closes.
    pub fn run(&mut self) -> Result<(), ReactorError> {
        let mut events = Events::new();
        while self.running {
            events.clear();
            self.poller.wait(&mut events, Some(POLL_TIMEOUT))?;
            for event in events.iter() {
                match event.key {
                    STDIN_KEY => self.handle_stdin()?,
                    LISTENER_KEY => self.handle_listener()?,
                    PEER_KEY => {
                        if event.readable {
                            self.handle_peer()?;
                        }
                        if event.writable {
                            self.handle_peer_writable();
                        }
                    }
                    _ => {}
                }
            }
            self.check_peer_error();
            unsafe {
                self.poller.modify(self.stdin.as_raw_fd(), Event::readable(STDIN_KEY))?;
            }
            if let Some(listener) = &self.listener {
                unsafe {
                    self.poller.modify(listener.socket().as_raw_fd(), Event::readable(LISTENER_KEY))?;
                }
            }
            if self.session.state() != SessionState::NotConnected {
                if let Some(endpoint) = self.session.endpoint() {
                    unsafe {
                        self.poller.modify(endpoint.socket().as_raw_fd(), Event::all(PEER_KEY))?;
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_stdin(&mut self) -> Result<(), ReactorError> {
        let mut line = String::new();
        let bytes = self.stdin.lock().read_line(&mut line)?;
        if bytes == 0 {
            self.running = false;
            return Ok(());
        }
        let line = line.trim_end_matches(['\n', '\r']);
        if let Some(command) = line.strip_prefix('/') {
            self.dispatch_command(command);
        } else if !line.is_empty() {
            self.send_chat(line);
        }
        Ok(())
    }

    fn dispatch_command(&mut self, command_str: &str) {
        let mut parts = command_str.split_whitespace();
        let name = parts.next().unwrap_or("");
        let rest: Vec<&str> = parts.collect();

        let result = match name {
            "connect" => self.command_connect(&rest),
            "disconnect" => self.command_disconnect(&rest),
            "listen" => self.command_listen(&rest),
            "endlisten" => self.command_endlisten(&rest),
            "quit" => self.command_quit(&rest),
            "" => Ok(()),
            _ => {
                self.status(format!("Unrecognized command \"{name}\""));
                Ok(())
            }
        };
        if let Err(malformed) = result {
            self.status(format!("Malformed command \"{command_str}\": {malformed}"));
        }
    }

    fn command_connect(&mut self, rest: &[&str]) -> Result<(), String> {
        if rest.len() != 1 {
            return Err("usage: /connect host[:port]".to_string());
        }
        let addr = crate::net::parse_address(rest[0], self.config.default_port)
            .map_err(|e| e.to_string())?;
        self.begin_connect(addr).map_err(|e| e.to_string())
    }

    fn command_disconnect(&mut self, rest: &[&str]) -> Result<(), String> {
        if !rest.is_empty() {
            return Err("usage: /disconnect".to_string());
        }
        self.teardown_session("disconnected");
        Ok(())
    }

    fn command_listen(&mut self, rest: &[&str]) -> Result<(), String> {
        let port = match rest.len() {
            0 => self.config.default_port,
            1 => rest[0].parse::<u16>().map_err(|_| "port must be 0-65535".to_string())?,
            _ => return Err("usage: /listen [port]".to_string()),
        };
        self.begin_listen(port).map_err(|e| e.to_string())
    }

    fn command_endlisten(&mut self, rest: &[&str]) -> Result<(), String> {
        if !rest.is_empty() {
            return Err("usage: /endlisten".to_string());
        }
        self.end_listen();
        Ok(())
    }

    fn command_quit(&mut self, rest: &[&str]) -> Result<(), String> {
        if !rest.is_empty() {
            return Err("usage: /quit".to_string());
        }
        self.running = false;
        Ok(())
    }

    fn begin_listen(&mut self, port: u16) -> Result<(), ReactorError> {
        let addr: SocketAddr = SocketAddr::new("0.0.0.0".parse().unwrap(), port);
        let listener = Listener::bind(addr)?;
        unsafe {
            self.poller.add(listener.socket().as_raw_fd(), Event::readable(LISTENER_KEY))?;
        }
        self.listener = Some(listener);
        self.status(format!("Listening for connection on port {port}"));
        Ok(())
    }

    fn end_listen(&mut self) {
        if let Some(listener) = self.listener.take() {
            let _ = self.poller.delete(listener.socket().as_raw_fd());
            self.status("Stopped listening");
        }
    }

    fn begin_connect(&mut self, addr: SocketAddr) -> Result<(), ReactorError> {
        if self.session.state() != SessionState::NotConnected {
            self.status("Already connected or connecting");
            return Ok(());
        }
        self.status(format!("Connecting to {addr}"));
        let endpoint = Endpoint::connect(addr)?;
        self.register_and_handshake(endpoint)
    }

    fn handle_listener(&mut self) -> Result<(), ReactorError> {
        let Some(listener) = &self.listener else { return Ok(()) };
        let Some(endpoint) = listener.accept()? else { return Ok(()) };

        // REDESIGN FLAG (b): a second connection while already
        // CONNECTED is refused outright, no handshake attempted.
        if self.session.state() == SessionState::Connected {
            warn!("refusing second connection while already connected");
            drop(endpoint);
            return Ok(());
        }
        self.register_and_handshake(endpoint)
    }

    fn register_and_handshake(&mut self, mut endpoint: Endpoint) -> Result<(), ReactorError> {
        let local_id = *self.pads.local().id();

        let outcome = handshake::handshake(
            &mut endpoint,
            &local_id,
            |candidate_id| self.pads.find(candidate_id).is_some(),
            self.config.handshake_timeout,
        );

        match outcome {
            Ok(result) => {
                unsafe {
                    self.poller.add(endpoint.socket().as_raw_fd(), Event::all(PEER_KEY))?;
                }
                self.session.begin_connecting(endpoint).ok();
                self.session.mark_connected(result.peer_id).ok();
                let addr = self
                    .session
                    .endpoint()
                    .and_then(|e| e.get_address().ok())
                    .unwrap_or_else(|| "unknown".to_string());
                debug!("handshake accepted peer_id={:02x?}", result.peer_id);
                self.status(format!("Connection succeeded with {addr}"));
            }
            Err(e) => {
                warn!("handshake failed: {e}");
                self.status(format!("Handshake failed: {e}"));
            }
        }
        Ok(())
    }

    fn handle_peer(&mut self) -> Result<(), ReactorError> {
        if self.session.state() == SessionState::NotConnected {
            return Ok(());
        }
        let mut buf = [0u8; RECV_CHUNK];
        loop {
            let Some(endpoint) = self.session.endpoint_mut() else { break };
            match endpoint.recv(&mut buf) {
                Ok(RecvOutcome::Read(n)) => {
                    self.session.reader_mut().feed(&buf[..n]);
                }
                Ok(RecvOutcome::WouldBlock) => break,
                Ok(RecvOutcome::Closed) => {
                    self.teardown_session("peer closed the connection");
                    return Ok(());
                }
                Err(e) => {
                    self.teardown_session(&format!("connection error: {e}"));
                    return Ok(());
                }
            }
        }

        let remote_id = *self.session.remote_id().expect("connected session has a remote id");
        loop {
            let Some(remote_pad) = self.pads.find_mut(&remote_id) else { break };
            match self.session.reader_mut().try_take_frame(remote_pad) {
                Ok(Some(plaintext)) => {
                    let text = String::from_utf8_lossy(&plaintext).into_owned();
                    self.display(Message::remote(text));
                }
                Ok(None) => break,
                Err(FramingError::Codec(CodecError::PadExhausted)) => {
                    self.teardown_session("Out of remote key data");
                    break;
                }
                Err(e) => {
                    self.teardown_session(&format!("framing error: {e}"));
                    break;
                }
            }
        }
        Ok(())
    }

    /// Drains whatever of the outbound buffer the peer socket will
    /// currently accept. Called on every write-ready event for the peer
    /// fd, so a partially sent frame never needs the loop to block.
    fn handle_peer_writable(&mut self) {
        if let Err(e) = self.session.drain_outbound() {
            self.teardown_session(&format!("send failed: {e}"));
        }
    }

    /// Step 8 of the dispatch loop: after a batch of ready events, a
    /// connected peer socket that surfaced an error via `SO_ERROR` (as
    /// opposed to an orderly close, already handled in `handle_peer`) is
    /// torn down here rather than left to time out.
    fn check_peer_error(&mut self) {
        if self.session.state() != SessionState::Connected {
            return;
        }
        let surfaced = self.session.endpoint().and_then(|e| e.take_error().unwrap_or(None));
        if surfaced.is_some() {
            self.teardown_session("remote disconnected");
        }
    }

    fn send_chat(&mut self, text: &str) {
        if self.session.state() != SessionState::Connected {
            self.status("Not connected");
            return;
        }
        let wire = {
            let local = self.pads.local_mut();
            match crate::framing::encode_frame(text.as_bytes(), local) {
                Ok(wire) => wire,
                Err(FramingError::Codec(CodecError::PadExhausted)) => {
                    self.teardown_session("Out of local key data");
                    return;
                }
                Err(e) => {
                    self.status(format!("Failed to encode message: {e}"));
                    return;
                }
            }
        };
        if self.config.sync_head_every_send {
            if let Err(e) = self.pads.local_mut().sync_head() {
                self.status(format!("Failed to persist pad head: {e}"));
                return;
            }
        }

        self.session.queue_outbound(&wire);
        self.display(Message::local(text));
        if let Err(e) = self.session.drain_outbound() {
            self.teardown_session(&format!("send failed: {e}"));
        }
    }

    fn teardown_session(&mut self, reason: &str) {
        debug!("tearing down session: {reason}");
        if let Some(endpoint) = self.session.endpoint() {
            let _ = self.poller.delete(endpoint.socket().as_raw_fd());
        }
        self.session.disconnect();
        self.status(reason);
    }

    fn status(&mut self, text: impl Into<String>) {
        self.display(Message::status(text));
    }

    fn display(&mut self, msg: Message) {
        let prefix = match msg.origin {
            crate::message::Origin::Local => "< ",
            crate::message::Origin::Remote => "> ",
            crate::message::Origin::Status => "* ",
        };
        let mut stdout = io::stdout();
        let _ = writeln!(stdout, "{prefix}{}", msg.text);
        let _ = stdout.flush();
    }
}
