//! Configuration for the otpchat core.
//!
//! Defines the structure for user-configurable settings. Populated by the
//! host application (the `otpchat` binary) and passed to the reactor.

use std::time::Duration;

/// Default TCP port used when none is given on the command line.
pub const DEFAULT_PORT: u16 = 14137;

/// Default handshake timeout, per spec.md 4.D.
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 2000;

/// Runtime configuration for the otpchat core.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port used by `/listen` when none is given explicitly.
    pub default_port: u16,

    /// How long the handshake's bounded exchange waits before giving up.
    pub handshake_timeout: Duration,

    /// Whether the local pad's head is written back to disk after every
    /// successful send. See SPEC_FULL.md's resolution of spec.md's open
    /// question on durability: on by default (safety over throughput).
    pub sync_head_every_send: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_port: DEFAULT_PORT,
            handshake_timeout: Duration::from_millis(DEFAULT_HANDSHAKE_TIMEOUT_MS),
            sync_head_every_send: true,
        }
    }
}
