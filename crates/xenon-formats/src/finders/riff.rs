//! RIFF container size finder (XMA audio and WAV).
//!
//! The Xbox tool chain declares the full envelope in the 32-bit size field
//! at offset 4, so that field is taken as the carved size directly.

use crate::PayloadExtent;
use crate::bytes::u32_le;
use crate::finders::accept_stored;

pub const MIN_SIZE: u64 = 12;
pub const MAX_SIZE: u64 = 256 * 1024 * 1024;

fn form_tag(data: &[u8], offset: usize) -> Option<&[u8]> {
    data.get(offset + 8..offset + 12)
}

pub fn validate_xma(data: &[u8], offset: usize) -> bool {
    matches!(form_tag(data, offset), Some(b"XMA " | b"XMA2"))
}

pub fn validate_wav(data: &[u8], offset: usize) -> bool {
    matches!(form_tag(data, offset), Some(b"WAVE"))
}

fn find_size(data: &[u8], offset: usize) -> Option<PayloadExtent> {
    let declared = u64::from(u32_le(data, offset + 4)?);
    accept_stored(data, offset, declared, MIN_SIZE, MAX_SIZE)
}

pub fn find_size_xma(data: &[u8], offset: usize) -> Option<PayloadExtent> {
    find_size(data, offset)
}

pub fn find_size_wav(data: &[u8], offset: usize) -> Option<PayloadExtent> {
    find_size(data, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn riff(form: &[u8; 4], declared: u32, body: usize) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"RIFF");
        data.extend_from_slice(&declared.to_le_bytes());
        data.extend_from_slice(form);
        data.extend_from_slice(&vec![0x42; body]);
        data
    }

    #[test]
    fn xma_uses_declared_size() {
        let dump = riff(b"XMA ", 2044, 2036);
        assert!(validate_xma(&dump, 0));
        assert!(!validate_wav(&dump, 0));

        let extent = find_size_xma(&dump, 0).unwrap();
        assert_eq!(extent.size_in_dump, 2044);
        assert_eq!(extent.size_output, 2044);
    }

    #[test]
    fn declared_size_past_dump_end_is_rejected() {
        let dump = riff(b"WAVE", 4096, 100);
        assert!(validate_wav(&dump, 0));
        assert_eq!(find_size_wav(&dump, 0), None);
    }

    #[test]
    fn undersized_declaration_is_rejected() {
        let dump = riff(b"WAVE", 4, 100);
        assert_eq!(find_size_wav(&dump, 0), None);
    }
}
