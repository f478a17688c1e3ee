//! Top-level error type unifying the per-module error enums.
//!
//! Each module keeps its own narrow error enum (see `pad`, `net`,
//! `handshake`, `framing`) with a hand-written `Display` impl, the same
//! idiom the teacher crate uses for `NetError` and `StorageError`. This
//! type exists only to let the binary's `main` return a single `Result`.

use core::fmt;

use crate::framing::FramingError;
use crate::handshake::HandshakeError;
use crate::net::NetError;
use crate::pad::PadError;

#[derive(Debug)]
pub enum Error {
    Pad(PadError),
    Net(NetError),
    Handshake(HandshakeError),
    Framing(FramingError),
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Pad(e) => write!(f, "pad error: {e}"),
            Error::Net(e) => write!(f, "network error: {e}"),
            Error::Handshake(e) => write!(f, "handshake error: {e}"),
            Error::Framing(e) => write!(f, "framing error: {e}"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<PadError> for Error {
    fn from(e: PadError) -> Self {
        Error::Pad(e)
    }
}

impl From<NetError> for Error {
    fn from(e: NetError) -> Self {
        Error::Net(e)
    }
}

impl From<HandshakeError> for Error {
    fn from(e: HandshakeError) -> Self {
        Error::Handshake(e)
    }
}

impl From<FramingError> for Error {
    fn from(e: FramingError) -> Self {
        Error::Framing(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
