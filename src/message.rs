//! Chat-line record shown in the terminal UI.
//!
//! Grounded on `examples/original_source/src/message.c`'s
//! `struct message` (id, timestamp, text) and `command.c`'s
//! `chat_push_status`, which injects locally generated status lines
//! (connect/disconnect/error notices) into the same display stream as
//! user-typed and peer-received text — distinguished here by
//! [`Origin`] rather than a separate channel.

use std::time::{SystemTime, UNIX_EPOCH};

/// Where a displayed line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Text the local user typed and sent.
    Local,
    /// Text decrypted from the peer.
    Remote,
    /// A locally generated notice (connect/disconnect/error), never
    /// sent over the wire.
    Status,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub origin: Origin,
    pub timestamp: u64,
    pub text: String,
}

impl Message {
    pub fn new(origin: Origin, text: impl Into<String>) -> Self {
        Self {
            origin,
            timestamp: now_unix(),
            text: text.into(),
        }
    }

    pub fn local(text: impl Into<String>) -> Self {
        Self::new(Origin::Local, text)
    }

    pub fn remote(text: impl Into<String>) -> Self {
        Self::new(Origin::Remote, text)
    }

    pub fn status(text: impl Into<String>) -> Self {
        Self::new(Origin::Status, text)
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_expected_origin() {
        assert_eq!(Message::local("hi").origin, Origin::Local);
        assert_eq!(Message::remote("hi").origin, Origin::Remote);
        assert_eq!(Message::status("hi").origin, Origin::Status);
    }
}
