//! Little-endian conversions over byte slices for the binary spreadsheet readers.
//! Short slices are zero-extended instead of panicking, so a truncated record
//! in an untrusted file degrades into a decode error further up.

/// Copies up to `N` leading bytes into a fixed array, zero-filling the rest.
#[inline]
fn le_bytes<const N: usize>(s: &[u8]) -> [u8; N] {
    let mut bytes = [0u8; N];
    let length = s.len().min(N);
    bytes[..length].copy_from_slice(&s[..length]);
    bytes
}

/// Converts a byte slice into an iterator of 32-bit unsigned integers.
/// Trailing bytes that do not fill a whole integer are ignored.
pub(crate) fn to_u32_iter(bytes: &[u8]) -> impl ExactSizeIterator<Item = u32> + '_ {
    bytes.chunks_exact(4).map(|chunk| u32::from_le_bytes(le_bytes(chunk)))
}

/// Converts a byte slice into an iterator of usize values.
pub(crate) fn to_usize_iter(bytes: &[u8]) -> impl ExactSizeIterator<Item = usize> + '_ {
    to_u32_iter(bytes).map(|value| value as usize)
}

#[inline]
pub(crate) fn to_f64(s: &[u8]) -> f64 {
    f64::from_le_bytes(le_bytes(s))
}

#[inline]
pub(crate) fn to_u64(s: &[u8]) -> u64 {
    u64::from_le_bytes(le_bytes(s))
}

#[inline]
pub(crate) fn to_u32(s: &[u8]) -> u32 {
    u32::from_le_bytes(le_bytes(s))
}

#[inline]
pub(crate) fn to_u16(s: &[u8]) -> u16 {
    u16::from_le_bytes(le_bytes(s))
}

#[inline]
pub(crate) fn to_usize(s: &[u8]) -> usize {
    to_u32(s) as usize
}
