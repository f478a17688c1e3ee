//! XOR codec: the same operation encrypts and decrypts a one-time pad.
//!
//! `xor` is adapted from the teacher's block-at-a-time constant-time
//! implementation (`core/xor.rs`), narrowed to a single 8-byte stride
//! since spec.md 4.B has no SIMD-width requirement; `xor_inplace` is new
//! and wires it to a `Pad`'s sequential keystream.

use core::fmt;

use zeroize::Zeroizing;

use crate::pad::Pad;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// The pad could not supply `buffer.len()` more keystream bytes.
    PadExhausted,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::PadExhausted => write!(f, "pad exhausted"),
        }
    }
}

impl std::error::Error for CodecError {}

/// Constant-time XOR over `input` with `keystream`, writing into `out`.
/// Requires `out.len() == input.len()` and `keystream.len() >= input.len()`.
#[inline(always)]
pub fn xor(input: &[u8], keystream: &[u8], out: &mut [u8]) {
    let len = out.len();
    let mut i = 0;

    while i + 8 <= len {
        let mut a = [0u8; 8];
        let mut b = [0u8; 8];
        a.copy_from_slice(&input[i..i + 8]);
        b.copy_from_slice(&keystream[i..i + 8]);
        let x = u64::from_ne_bytes(a) ^ u64::from_ne_bytes(b);
        out[i..i + 8].copy_from_slice(&x.to_ne_bytes());
        i += 8;
    }

    while i < len {
        out[i] = input[i] ^ keystream[i];
        i += 1;
    }
}

/// Takes `buffer.len()` sequential bytes from `pad` (advancing its head)
/// and XORs them into `buffer` in place.
///
/// On `PadExhausted`, the pad's head still reflects whatever bytes were
/// actually consumed before the shortfall was discovered (spec.md 4.B) —
/// callers must treat the session as unrecoverable rather than retry.
///
/// The plaintext copy and the keystream draw are both held in
/// `Zeroizing` buffers: both are as sensitive as the pad itself, and
/// unlike the pad's own on-disk bytes, these copies exist only in
/// process memory for the duration of this call.
pub fn xor_inplace(pad: &mut Pad, buffer: &mut [u8]) -> Result<(), CodecError> {
    let plaintext = Zeroizing::new(buffer.to_vec());
    let mut keystream = Zeroizing::new(vec![0u8; buffer.len()]);
    let read = pad.read_keystream(&mut keystream)?;
    if read < buffer.len() {
        return Err(CodecError::PadExhausted);
    }
    xor(&plaintext, &keystream, buffer);
    Ok(())
}

impl From<crate::pad::PadError> for CodecError {
    fn from(_: crate::pad::PadError) -> Self {
        CodecError::PadExhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xor_roundtrip() {
        let data: Vec<u8> = (0..100u32).map(|i| i as u8).collect();
        let key: Vec<u8> = (0..100u32).map(|i| (i as u8).wrapping_mul(3)).collect();
        let mut out = vec![0u8; 100];
        xor(&data, &key, &mut out);
        let mut back = vec![0u8; 100];
        xor(&out, &key, &mut back);
        assert_eq!(back, data);
    }
}
