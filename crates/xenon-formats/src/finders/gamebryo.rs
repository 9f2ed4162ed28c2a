//! Gamebryo stream (NIF/KF) size finder.
//!
//! Stream versions from 20.2.0.5 on carry a per-block size table in the
//! header, which lets the payload end be computed exactly: header + sum of
//! block sizes + footer. Older streams have no such table and no defined
//! EOF marker, so they are rejected rather than carved with a guessed
//! size. Xbox 360 exports store header fields big-endian; the endianness
//! byte in the header decides how the rest is read.

use tracing::trace;

use crate::PayloadExtent;
use crate::finders::accept_stored;

pub const MIN_SIZE: u64 = 64;
pub const MAX_SIZE: u64 = 16 * 1024 * 1024;

/// First stream version that carries the block-size table.
const BLOCK_SIZES_VERSION: u32 = 0x1402_0005;

const MAX_BLOCKS: u32 = 100_000;
const MAX_BLOCK_TYPES: u16 = 4096;
const MAX_STRINGS: u32 = 100_000;
const MAX_STRING_LEN: u32 = 8192;
const MAX_GROUPS: u32 = 4096;

/// Sequential reader over the dump with a switchable byte order.
struct Walker<'a> {
    data: &'a [u8],
    pos: usize,
    big_endian: bool,
}

impl<'a> Walker<'a> {
    fn new(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos,
            big_endian: false,
        }
    }

    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let bytes = self.data.get(self.pos..self.pos.checked_add(len)?)?;
        self.pos += len;
        Some(bytes)
    }

    fn u8(&mut self) -> Option<u8> {
        let bytes = self.take(1)?;
        Some(bytes[0])
    }

    fn u16(&mut self) -> Option<u16> {
        let bytes = self.take(2)?;
        let raw = [bytes[0], bytes[1]];
        Some(if self.big_endian {
            u16::from_be_bytes(raw)
        } else {
            u16::from_le_bytes(raw)
        })
    }

    fn u32(&mut self) -> Option<u32> {
        let bytes = self.take(4)?;
        let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
        Some(if self.big_endian {
            u32::from_be_bytes(raw)
        } else {
            u32::from_le_bytes(raw)
        })
    }

    /// Length-prefixed string with a u8 length (export info fields).
    fn short_string(&mut self) -> Option<()> {
        let len = self.u8()?;
        self.take(usize::from(len))?;
        Some(())
    }

    /// Length-prefixed string with a u32 length (block type names,
    /// string table entries).
    fn sized_string(&mut self) -> Option<()> {
        let len = self.u32()?;
        if len > MAX_STRING_LEN {
            return None;
        }
        self.take(len as usize)?;
        Some(())
    }
}

/// A stream version packs its four components into one u32
/// (20.2.0.7 = 0x14020007). Values outside this window are noise.
fn version_plausible(version: u32) -> bool {
    (0x0303_000D..=0x1E00_0000).contains(&version)
}

pub fn find_size(data: &[u8], offset: usize) -> Option<PayloadExtent> {
    // Header string line, newline-terminated within the first 64 bytes.
    let probe = data.get(offset..data.len().min(offset + 64))?;
    let line_end = memchr::memchr(b'\n', probe)?;

    let mut walker = Walker::new(data, offset + line_end + 1);

    let mut version = walker.u32()?;
    if !version_plausible(version) {
        // Console export: the whole header is big-endian.
        version = version.swap_bytes();
        if !version_plausible(version) {
            return None;
        }
        walker.big_endian = true;
    }
    if version < BLOCK_SIZES_VERSION {
        trace!(offset, version, "stream predates block-size table");
        return None;
    }

    // The endianness byte must agree with how the version decoded.
    let endian_byte = walker.u8()?;
    match (endian_byte, walker.big_endian) {
        (0, true) | (1, false) => {}
        _ => return None,
    }

    let user_version = walker.u32()?;
    let num_blocks = walker.u32()?;
    if num_blocks == 0 || num_blocks > MAX_BLOCKS {
        return None;
    }

    // Bethesda streams insert their own sub-header and export strings.
    if user_version >= 3 {
        let _bs_version = walker.u32()?;
        walker.short_string()?;
        walker.short_string()?;
        walker.short_string()?;
    }

    let num_block_types = walker.u16()?;
    if num_block_types == 0 || num_block_types > MAX_BLOCK_TYPES {
        return None;
    }
    for _ in 0..num_block_types {
        walker.sized_string()?;
    }

    // Block type index: one u16 per block.
    walker.take(num_blocks as usize * 2)?;

    let mut data_size = 0u64;
    for _ in 0..num_blocks {
        let block_size = u64::from(walker.u32()?);
        if block_size > MAX_SIZE {
            return None;
        }
        data_size = data_size.checked_add(block_size)?;
        if data_size > MAX_SIZE {
            return None;
        }
    }

    // Global string table.
    let num_strings = walker.u32()?;
    if num_strings > MAX_STRINGS {
        return None;
    }
    let _max_string_len = walker.u32()?;
    for _ in 0..num_strings {
        walker.sized_string()?;
    }

    let num_groups = walker.u32()?;
    if num_groups > MAX_GROUPS {
        return None;
    }
    walker.take(num_groups as usize * 4)?;

    // Footer lives after the block data: root count plus one ref each.
    let footer_pos = walker.pos.checked_add(usize::try_from(data_size).ok()?)?;
    let mut footer = Walker::new(data, footer_pos);
    footer.big_endian = walker.big_endian;
    let num_roots = footer.u32()?;
    if u64::from(num_roots) > u64::from(num_blocks) {
        return None;
    }
    footer.take(num_roots as usize * 4)?;

    let size = (footer.pos - offset) as u64;
    accept_stored(data, offset, size, MIN_SIZE, MAX_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal well-formed 20.2.0.7 Bethesda stream.
    fn sample_nif(big_endian: bool) -> Vec<u8> {
        let u16b = |value: u16| {
            if big_endian {
                value.to_be_bytes()
            } else {
                value.to_le_bytes()
            }
        };
        let u32b = |value: u32| {
            if big_endian {
                value.to_be_bytes()
            } else {
                value.to_le_bytes()
            }
        };

        let mut data = Vec::new();
        data.extend_from_slice(b"Gamebryo File Format, Version 20.2.0.7\n");
        data.extend_from_slice(&u32b(0x1402_0007));
        data.push(u8::from(!big_endian));
        data.extend_from_slice(&u32b(11)); // user version
        data.extend_from_slice(&u32b(2)); // num blocks
        data.extend_from_slice(&u32b(34)); // BS stream version
        data.push(0); // author
        data.push(0); // process script
        data.push(0); // export script
        data.extend_from_slice(&u16b(1)); // num block types
        data.extend_from_slice(&u32b(9));
        data.extend_from_slice(b"NiNode\x00\x00\x00");
        data.extend_from_slice(&u16b(0)); // block type index [0]
        data.extend_from_slice(&u16b(0)); // block type index [1]
        data.extend_from_slice(&u32b(16)); // block size [0]
        data.extend_from_slice(&u32b(24)); // block size [1]
        data.extend_from_slice(&u32b(0)); // num strings
        data.extend_from_slice(&u32b(0)); // max string length
        data.extend_from_slice(&u32b(0)); // num groups
        data.extend_from_slice(&[0xCC; 40]); // block data
        data.extend_from_slice(&u32b(1)); // num roots
        data.extend_from_slice(&u32b(0)); // root ref
        data
    }

    #[test]
    fn little_endian_stream_is_sized_exactly() {
        let mut dump = sample_nif(false);
        let expected = dump.len() as u64;
        dump.extend_from_slice(&[0u8; 64]); // trailing unrelated bytes

        let extent = find_size(&dump, 0).unwrap();
        assert_eq!(extent.size_in_dump, expected);
    }

    #[test]
    fn big_endian_console_stream_is_sized_exactly() {
        let dump = sample_nif(true);
        let extent = find_size(&dump, 0).unwrap();
        assert_eq!(extent.size_in_dump, dump.len() as u64);
    }

    #[test]
    fn pre_block_size_versions_are_rejected() {
        let mut dump = Vec::new();
        dump.extend_from_slice(b"NetImmerse File Format, Version 4.0.0.2\n");
        dump.extend_from_slice(&0x0400_0002u32.to_le_bytes());
        dump.extend_from_slice(&[0u8; 256]);

        assert_eq!(find_size(&dump, 0), None);
    }

    #[test]
    fn endian_byte_must_agree_with_version_decode() {
        let mut dump = sample_nif(false);
        let newline = dump.iter().position(|&b| b == b'\n').unwrap();
        dump[newline + 5] = 0; // flip the endian byte to "big"

        assert_eq!(find_size(&dump, 0), None);
    }

    #[test]
    fn truncated_block_data_is_rejected() {
        let dump = sample_nif(false);
        assert_eq!(find_size(&dump[..dump.len() - 8], 0), None);
    }
}
