//! Entropy source used for pad generation.
//!
//! Narrowed from the teacher's multi-source `entropy` module (OS, CPU
//! jitter, RDRAND, audio/video inputs, SP 800-90B health tests) down to
//! the single OS-CSPRNG source the core actually needs: `pad::Pad::create`
//! draws fresh keystream bytes and a fresh pad id from it. The trait is
//! kept so tests can substitute a deterministic source.

use core::fmt;

/// Errors from entropy collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntropyError {
    /// The source failed to produce the requested bytes.
    CollectionFailed,
}

impl fmt::Display for EntropyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntropyError::CollectionFailed => write!(f, "failed to collect entropy"),
        }
    }
}

impl std::error::Error for EntropyError {}

/// A source of cryptographically secure randomness.
pub trait EntropySource {
    /// Fills `dest` with random bytes from the source.
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError>;
}

/// The operating system's CSPRNG, via `getrandom`.
#[derive(Debug, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError> {
        getrandom::fill(dest).map_err(|_| EntropyError::CollectionFailed)
    }
}

#[cfg(test)]
pub(crate) struct CountingEntropy {
    pub counter: u8,
}

#[cfg(test)]
impl EntropySource for CountingEntropy {
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError> {
        for byte in dest.iter_mut() {
            *byte = self.counter;
            self.counter = self.counter.wrapping_add(1);
        }
        Ok(())
    }
}
