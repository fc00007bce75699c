//! Little-endian IEEE-754 byte codec.
//!
//! The GPS receiver reports floats in little-endian byte order and the RF
//! downlink carries them the same way, so every float that crosses a byte
//! boundary in this crate goes through these helpers instead of relying on
//! the host's memory layout.

/// Width of every packed scalar group on the wire.
pub const WORD_LEN: usize = 4;

/// Decode the little-endian `f32` starting at `offset`.
///
/// Returns `None` when fewer than four bytes remain.
#[inline]
pub fn read_f32_le(bytes: &[u8], offset: usize) -> Option<f32> {
    let word: [u8; WORD_LEN] = bytes.get(offset..offset + WORD_LEN)?.try_into().ok()?;
    Some(f32::from_le_bytes(word))
}

/// Encode an `f32` as four little-endian bytes.
#[inline]
pub fn f32_to_le_word(value: f32) -> [u8; WORD_LEN] {
    value.to_le_bytes()
}

/// Widen a single byte into a zero-padded 4-byte group: `[value, 0, 0, 0]`.
#[inline]
pub fn u8_to_word(value: u8) -> [u8; WORD_LEN] {
    [value, 0, 0, 0]
}

#[inline]
pub fn read_u16_le(bytes: &[u8], offset: usize) -> Option<u16> {
    let half: [u8; 2] = bytes.get(offset..offset + 2)?.try_into().ok()?;
    Some(u16::from_le_bytes(half))
}

/// Split a 16-bit identifier into its `(high, low)` bytes.
#[inline]
pub fn id_pair(id: u16) -> [u8; 2] {
    id.to_be_bytes()
}
