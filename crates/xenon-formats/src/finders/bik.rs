//! Bink video size finder.

use crate::PayloadExtent;
use crate::bytes::u32_le;
use crate::finders::accept_stored;

pub const MIN_SIZE: u64 = 8;
pub const MAX_SIZE: u64 = 512 * 1024 * 1024;

/// `BIKi` headers declare the stream length after the 8-byte envelope.
pub fn find_size(data: &[u8], offset: usize) -> Option<PayloadExtent> {
    let declared = u64::from(u32_le(data, offset + 4)?).checked_add(8)?;
    accept_stored(data, offset, declared, MIN_SIZE, MAX_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_size_plus_envelope() {
        let mut dump = Vec::new();
        dump.extend_from_slice(b"BIKi");
        dump.extend_from_slice(&100u32.to_le_bytes());
        dump.extend_from_slice(&[0x11; 100]);

        let extent = find_size(&dump, 0).unwrap();
        assert_eq!(extent.size_in_dump, 108);
    }

    #[test]
    fn truncated_stream_is_rejected() {
        let mut dump = Vec::new();
        dump.extend_from_slice(b"BIKi");
        dump.extend_from_slice(&100u32.to_le_bytes());
        dump.extend_from_slice(&[0x11; 10]);

        assert_eq!(find_size(&dump, 0), None);
    }
}
