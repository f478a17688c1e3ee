//! Core library for a two-party, point-to-point one-time-pad chat session.
//!
//! A [`pad::PadStore`] supplies keystream bytes, [`codec`] XORs them
//! against frames, [`net::Endpoint`] carries bytes over a TCP socket,
//! [`handshake`] establishes which pad a freshly connected peer is
//! using, [`framing`] turns byte streams into discrete envelopes, and
//! [`session::Session`] ties all of it to a small connection state
//! machine. [`reactor::Reactor`] drives one session plus a listener and
//! stdin through a single-threaded readiness loop.

pub mod codec;
pub mod config;
pub mod entropy;
pub mod error;
pub mod framing;
pub mod handshake;
pub mod message;
pub mod net;
pub mod pad;
pub mod reactor;
pub mod session;

pub use config::Config;
pub use error::Error;
