//! Pad file format and head-consumption engine.
//!
//! This module owns the only persistent state in the system: each pad
//! file is a 32-byte prelude (magic, head, id) followed by raw keystream
//! bytes, and the head recorded in that prelude must never regress. A
//! [`PadStore`] holds exactly one local pad (fresh bytes for outbound
//! encryption) plus an ordered set of remote pads (fresh bytes for
//! inbound decryption), looked up by id.
//!
//! # Security
//! Reusing keystream bytes destroys the one-time pad's confidentiality
//! guarantee. Every operation that advances a head does so before
//! returning the bytes it read, so a caller that observes success is
//! guaranteed those bytes will never be handed out again by this
//! process.

mod file;

pub use file::Pad;

use core::fmt;

/// Errors related to pad operations.
#[derive(Debug)]
pub enum PadError {
    /// Underlying I/O failure.
    Io(std::io::Error),
    /// The pad file's magic bytes did not match `OTPCHAT0`.
    BadMagic,
    /// The prelude was shorter than 32 bytes.
    TruncatedPrelude,
    /// The on-disk head exceeds the pad's keystream size.
    HeadOutOfRange,
    /// A `pad_take`/codec operation asked for more bytes than remain.
    Exhausted,
    /// A `pad_seek` target is beyond the end of the keystream.
    OutOfBounds,
    /// A pad id collides with one already held by the store.
    DuplicateId,
}

impl fmt::Display for PadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PadError::Io(e) => write!(f, "I/O error: {e}"),
            PadError::BadMagic => write!(f, "pad file magic mismatch"),
            PadError::TruncatedPrelude => write!(f, "pad file prelude truncated"),
            PadError::HeadOutOfRange => write!(f, "pad head exceeds pad size"),
            PadError::Exhausted => write!(f, "pad exhausted"),
            PadError::OutOfBounds => write!(f, "seek target beyond pad size"),
            PadError::DuplicateId => write!(f, "duplicate pad id"),
        }
    }
}

impl std::error::Error for PadError {}

impl From<std::io::Error> for PadError {
    fn from(e: std::io::Error) -> Self {
        PadError::Io(e)
    }
}

/// Exactly one local pad plus an ordered set of remote pads.
pub struct PadStore {
    local: Pad,
    remotes: Vec<Pad>,
}

impl PadStore {
    /// Creates a store around an already-opened local pad.
    pub fn new(local: Pad) -> Self {
        Self { local, remotes: Vec::new() }
    }

    /// Admits a remote pad. Remote-pad sets are expected to be small, so
    /// uniqueness is checked with a linear scan, matching `find`'s own
    /// scan below.
    pub fn add_remote(&mut self, pad: Pad) -> Result<(), PadError> {
        if self.remotes.iter().any(|p| p.id() == pad.id()) || self.local.id() == pad.id() {
            return Err(PadError::DuplicateId);
        }
        self.remotes.push(pad);
        Ok(())
    }

    /// Returns the local pad.
    pub fn local(&self) -> &Pad {
        &self.local
    }

    /// Returns the local pad, mutably (codec operations advance its head).
    pub fn local_mut(&mut self) -> &mut Pad {
        &mut self.local
    }

    /// Linear scan for a remote pad by id.
    pub fn find(&self, id: &[u8; 16]) -> Option<&Pad> {
        self.remotes.iter().find(|p| p.id() == id)
    }

    /// Mutable counterpart of `find`, used once a handshake selects a pad.
    pub fn find_mut(&mut self, id: &[u8; 16]) -> Option<&mut Pad> {
        self.remotes.iter_mut().find(|p| p.id() == id)
    }

    /// Closes every held pad, persisting each head. The first error is
    /// returned, but every pad is still given the chance to close.
    pub fn close(self) -> Result<(), PadError> {
        let mut first_err = None;
        if let Err(e) = self.local.close() {
            first_err.get_or_insert(e);
        }
        for remote in self.remotes {
            if let Err(e) = remote.close() {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::CountingEntropy;

    fn make_pad(dir: &tempfile::TempDir, name: &str, counter: u8, size: u64) -> Pad {
        let path = dir.path().join(name);
        let mut entropy = CountingEntropy { counter };
        Pad::create(&path, size, &mut entropy).unwrap();
        Pad::open(&path).unwrap()
    }

    #[test]
    fn store_rejects_duplicate_ids() {
        let dir = tempfile::tempdir().unwrap();
        // Same counter seed on both pads makes the fresh ids collide (the
        // first 16 entropy draws are identical), which is exactly the
        // duplicate-id scenario `add_remote` must reject.
        let local = make_pad(&dir, "local.pad", 0, 10);
        let remote = make_pad(&dir, "remote.pad", 0, 10);

        let mut store = PadStore::new(local);
        assert!(matches!(store.add_remote(remote), Err(PadError::DuplicateId)));
    }

    #[test]
    fn store_find_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let local = make_pad(&dir, "local.pad", 0, 10);
        let remote = make_pad(&dir, "remote.pad", 200, 10);
        let remote_id = *remote.id();

        let mut store = PadStore::new(local);
        store.add_remote(remote).unwrap();

        assert!(store.find(&remote_id).is_some());
        assert!(store.find(&[0xFFu8; 16]).is_none());
    }
}
