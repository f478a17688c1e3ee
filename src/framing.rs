//! Wire framing: a 12-byte envelope (length, stream position) in front
//! of every ciphertext frame.
//!
//! Grounded on spec.md §4.E/§6 for the envelope shape and on the
//! teacher's `protocol/state_machine.rs` for the guarded, match-based
//! style carried into [`FrameReader::try_take_frame`]. The stream
//! position lets a receiver detect a peer that replayed or skipped
//! keystream — `examples/original_source/src/key.c`'s pad has no such
//! check built in, so this is new: a position behind the local remote
//! pad's head means keystream reuse, which this module treats as fatal
//! rather than attempting to resynchronize.

use core::fmt;

use crate::codec::{self, CodecError};
use crate::pad::{Pad, PadError};

pub const ENVELOPE_SIZE: usize = 12;

#[derive(Debug)]
pub enum FramingError {
    Codec(CodecError),
    Pad(PadError),
    /// A received envelope's stream position is behind the pad's
    /// current head — keystream reuse, unrecoverable.
    HeadRegression,
    /// A plaintext frame is too large to encode a `u32` length field.
    FrameTooLarge,
    /// A received envelope's length field is zero or has its high bit
    /// set — outside the `0 < length < 2^31` range this protocol allows.
    InvalidLength,
    /// A received envelope claims keystream past the end of the pad.
    FrameExceedsPad,
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingError::Codec(e) => write!(f, "framing codec error: {e}"),
            FramingError::Pad(e) => write!(f, "framing pad error: {e}"),
            FramingError::HeadRegression => write!(f, "received frame's stream position regressed"),
            FramingError::FrameTooLarge => write!(f, "frame exceeds maximum encodable length"),
            FramingError::InvalidLength => write!(f, "received envelope length is zero or out of range"),
            FramingError::FrameExceedsPad => write!(f, "received envelope claims keystream past the end of the pad"),
        }
    }
}

impl std::error::Error for FramingError {}

struct Envelope {
    length: u32,
    position: u64,
}

impl Envelope {
    fn encode(&self) -> [u8; ENVELOPE_SIZE] {
        let mut out = [0u8; ENVELOPE_SIZE];
        out[0..4].copy_from_slice(&self.length.to_be_bytes());
        out[4..12].copy_from_slice(&self.position.to_be_bytes());
        out
    }

    fn decode(bytes: &[u8; ENVELOPE_SIZE]) -> Self {
        let mut length_bytes = [0u8; 4];
        let mut position_bytes = [0u8; 8];
        length_bytes.copy_from_slice(&bytes[0..4]);
        position_bytes.copy_from_slice(&bytes[4..12]);
        Self {
            length: u32::from_be_bytes(length_bytes),
            position: u64::from_be_bytes(position_bytes),
        }
    }
}

/// Encodes one outbound frame: envelope (current pad head) followed by
/// the ciphertext, consuming `plaintext.len()` keystream bytes from
/// `pad`.
pub fn encode_frame(plaintext: &[u8], pad: &mut Pad) -> Result<Vec<u8>, FramingError> {
    let length: u32 = plaintext.len().try_into().map_err(|_| FramingError::FrameTooLarge)?;
    let position = pad.head();

    let mut ciphertext = plaintext.to_vec();
    codec::xor_inplace(pad, &mut ciphertext).map_err(FramingError::Codec)?;

    let envelope = Envelope { length, position };
    let mut out = Vec::with_capacity(ENVELOPE_SIZE + ciphertext.len());
    out.extend_from_slice(&envelope.encode());
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Accumulates inbound bytes from a stream and yields complete,
/// decrypted frames as they become available.
#[derive(Default)]
pub struct FrameReader {
    buf: Vec<u8>,
}

impl FrameReader {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Appends freshly read bytes to the reassembly buffer.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Returns the next complete frame's decrypted payload, if the
    /// buffer holds one, advancing `pad`'s head by the frame's length.
    /// `pad` must be the remote pad matched to this peer during the
    /// handshake.
    pub fn try_take_frame(&mut self, pad: &mut Pad) -> Result<Option<Vec<u8>>, FramingError> {
        if self.buf.len() < ENVELOPE_SIZE {
            return Ok(None);
        }
        let mut envelope_bytes = [0u8; ENVELOPE_SIZE];
        envelope_bytes.copy_from_slice(&self.buf[..ENVELOPE_SIZE]);
        let envelope = Envelope::decode(&envelope_bytes);

        // spec's `0 < length < 2^31` constraint is checked as soon as the
        // envelope itself is in hand, not deferred until the body arrives.
        if envelope.length == 0 || envelope.length >= (1u32 << 31) {
            return Err(FramingError::InvalidLength);
        }

        let total = ENVELOPE_SIZE + envelope.length as usize;
        if self.buf.len() < total {
            return Ok(None);
        }

        if envelope.position < pad.head() {
            return Err(FramingError::HeadRegression);
        }
        let frame_end = envelope.position.saturating_add(envelope.length as u64);
        if frame_end > pad.size() {
            return Err(FramingError::FrameExceedsPad);
        }
        if envelope.position > pad.head() {
            pad.seek_to(envelope.position).map_err(FramingError::Pad)?;
        }

        let mut body = self.buf[ENVELOPE_SIZE..total].to_vec();
        codec::xor_inplace(pad, &mut body).map_err(FramingError::Codec)?;

        self.buf.drain(..total);
        Ok(Some(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::CountingEntropy;

    fn make_pad(dir: &tempfile::TempDir, name: &str) -> Pad {
        let path = dir.path().join(name);
        let mut entropy = CountingEntropy { counter: 0 };
        Pad::create(&path, 4096, &mut entropy).unwrap();
        Pad::open(&path).unwrap()
    }

    #[test]
    fn encode_then_decode_round_trips_through_split_reads() {
        let dir = tempfile::tempdir().unwrap();
        let mut sender_pad = make_pad(&dir, "a.pad");
        let mut receiver_pad = make_pad(&dir, "a.pad");

        let wire = encode_frame(b"hello", &mut sender_pad).unwrap();

        let mut reader = FrameReader::new();
        reader.feed(&wire[..5]);
        assert!(reader.try_take_frame(&mut receiver_pad).unwrap().is_none());
        reader.feed(&wire[5..]);
        let frame = reader.try_take_frame(&mut receiver_pad).unwrap().unwrap();
        assert_eq!(frame, b"hello");
    }

    #[test]
    fn two_frames_back_to_back_are_both_recovered() {
        let dir = tempfile::tempdir().unwrap();
        let mut sender_pad = make_pad(&dir, "a.pad");
        let mut receiver_pad = make_pad(&dir, "a.pad");

        let mut wire = encode_frame(b"first", &mut sender_pad).unwrap();
        wire.extend(encode_frame(b"second", &mut sender_pad).unwrap());

        let mut reader = FrameReader::new();
        reader.feed(&wire);
        assert_eq!(reader.try_take_frame(&mut receiver_pad).unwrap().unwrap(), b"first");
        assert_eq!(reader.try_take_frame(&mut receiver_pad).unwrap().unwrap(), b"second");
    }

    #[test]
    fn stale_stream_position_is_rejected_as_head_regression() {
        let dir = tempfile::tempdir().unwrap();
        let mut sender_pad = make_pad(&dir, "a.pad");
        let mut receiver_pad = make_pad(&dir, "a.pad");

        let first = encode_frame(b"first", &mut sender_pad).unwrap();
        let mut reader = FrameReader::new();
        reader.feed(&first);
        reader.try_take_frame(&mut receiver_pad).unwrap();

        // Re-deliver the same already-consumed frame.
        reader.feed(&first);
        let err = reader.try_take_frame(&mut receiver_pad);
        assert!(matches!(err, Err(FramingError::HeadRegression)));
    }

    #[test]
    fn zero_length_envelope_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut receiver_pad = make_pad(&dir, "a.pad");

        let mut envelope = [0u8; ENVELOPE_SIZE];
        envelope[0..4].copy_from_slice(&0u32.to_be_bytes());
        envelope[4..12].copy_from_slice(&0u64.to_be_bytes());

        let mut reader = FrameReader::new();
        reader.feed(&envelope);
        let err = reader.try_take_frame(&mut receiver_pad);
        assert!(matches!(err, Err(FramingError::InvalidLength)));
    }

    #[test]
    fn high_bit_length_envelope_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut receiver_pad = make_pad(&dir, "a.pad");

        let mut envelope = [0u8; ENVELOPE_SIZE];
        envelope[0..4].copy_from_slice(&(1u32 << 31).to_be_bytes());
        envelope[4..12].copy_from_slice(&0u64.to_be_bytes());

        let mut reader = FrameReader::new();
        reader.feed(&envelope);
        let err = reader.try_take_frame(&mut receiver_pad);
        assert!(matches!(err, Err(FramingError::InvalidLength)));
    }

    #[test]
    fn envelope_claiming_keystream_past_pad_end_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut receiver_pad = make_pad(&dir, "a.pad");
        let pad_size = receiver_pad.size();

        let mut wire = vec![0u8; ENVELOPE_SIZE];
        wire[0..4].copy_from_slice(&16u32.to_be_bytes());
        wire[4..12].copy_from_slice(&(pad_size - 4).to_be_bytes());
        wire.extend_from_slice(&[0u8; 16]);

        let mut reader = FrameReader::new();
        reader.feed(&wire);
        let err = reader.try_take_frame(&mut receiver_pad);
        assert!(matches!(err, Err(FramingError::FrameExceedsPad)));
    }
}
