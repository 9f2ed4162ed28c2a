//! DDS texture size finder.
//!
//! Xbox 360 builds keep both console (big-endian) and PC (little-endian)
//! DDS headers in memory, so header fields are probed little-endian first
//! and retried big-endian when the values look implausible.

use tracing::trace;

use crate::PayloadExtent;
use crate::bytes::{u32_be, u32_le};
use crate::finders::accept_stored;

pub const MIN_SIZE: u64 = 128;
pub const MAX_SIZE: u64 = 64 * 1024 * 1024;

const HEADER_LEN: u64 = 128;
const EXPECTED_HEADER_SIZE: u32 = 124;
const MAX_DIMENSION: u32 = 16_384;
const FLAG_MIPMAP_COUNT: u32 = 0x0002_0000;

struct DdsHeader {
    height: u32,
    width: u32,
    mipmap_count: u32,
    fourcc: [u8; 4],
    rgb_bit_count: u32,
}

fn read_header(data: &[u8], offset: usize, big_endian: bool) -> Option<DdsHeader> {
    let read: fn(&[u8], usize) -> Option<u32> = if big_endian { u32_be } else { u32_le };

    let header_size = read(data, offset + 4)?;
    let flags = read(data, offset + 8)?;
    let height = read(data, offset + 12)?;
    let width = read(data, offset + 16)?;
    let mut mipmap_count = read(data, offset + 28)?;
    let fourcc_bytes = data.get(offset + 84..offset + 88)?;
    let rgb_bit_count = read(data, offset + 88)?;

    if header_size != EXPECTED_HEADER_SIZE {
        return None;
    }
    if height == 0 || width == 0 || height > MAX_DIMENSION || width > MAX_DIMENSION {
        return None;
    }
    if flags & FLAG_MIPMAP_COUNT == 0 {
        mipmap_count = 0;
    }

    let mut fourcc = [0u8; 4];
    fourcc.copy_from_slice(fourcc_bytes);

    Some(DdsHeader {
        height,
        width,
        mipmap_count,
        fourcc,
        rgb_bit_count,
    })
}

/// Bytes for one surface level of `width` x `height` texels.
fn surface_size(header: &DdsHeader, width: u32, height: u32) -> Option<u64> {
    let (block_bytes, is_block) = match &header.fourcc {
        b"DXT1" => (8u64, true),
        b"DXT2" | b"DXT3" | b"DXT4" | b"DXT5" => (16, true),
        _ => (0, false),
    };

    if is_block {
        let blocks_w = u64::from(width.div_ceil(4).max(1));
        let blocks_h = u64::from(height.div_ceil(4).max(1));
        return Some(blocks_w * blocks_h * block_bytes);
    }

    // Uncompressed: derive from the declared bit count.
    if header.rgb_bit_count == 0 || header.rgb_bit_count % 8 != 0 || header.rgb_bit_count > 128 {
        return None;
    }
    let bytes_per_pixel = u64::from(header.rgb_bit_count / 8);
    Some(u64::from(width) * u64::from(height) * bytes_per_pixel)
}

/// Full mip-chain size for a header, excluding the 128-byte header itself.
fn mip_chain_size(header: &DdsHeader) -> Option<u64> {
    let levels = header.mipmap_count.clamp(1, 16);
    let mut total = 0u64;
    for level in 0..levels {
        let width = (header.width >> level).max(1);
        let height = (header.height >> level).max(1);
        total = total.checked_add(surface_size(header, width, height)?)?;
    }
    Some(total)
}

/// Reject matches whose header parses in neither byte order.
pub fn validate(data: &[u8], offset: usize) -> bool {
    read_header(data, offset, false).is_some() || read_header(data, offset, true).is_some()
}

pub fn find_size(data: &[u8], offset: usize) -> Option<PayloadExtent> {
    let header = read_header(data, offset, false).or_else(|| {
        trace!(offset, "DDS header implausible as little-endian, retrying big-endian");
        read_header(data, offset, true)
    })?;

    let size = HEADER_LEN.checked_add(mip_chain_size(&header)?)?;
    accept_stored(data, offset, size, MIN_SIZE, MAX_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dds_header_le(width: u32, height: u32, fourcc: &[u8; 4], mipmaps: u32) -> Vec<u8> {
        let mut data = vec![0u8; 128];
        data[0..4].copy_from_slice(b"DDS ");
        data[4..8].copy_from_slice(&EXPECTED_HEADER_SIZE.to_le_bytes());
        let flags = if mipmaps > 0 { FLAG_MIPMAP_COUNT } else { 0 };
        data[8..12].copy_from_slice(&flags.to_le_bytes());
        data[12..16].copy_from_slice(&height.to_le_bytes());
        data[16..20].copy_from_slice(&width.to_le_bytes());
        data[28..32].copy_from_slice(&mipmaps.to_le_bytes());
        data[76..80].copy_from_slice(&32u32.to_le_bytes());
        data[84..88].copy_from_slice(fourcc);
        data
    }

    #[test]
    fn dxt1_top_level_only() {
        // 256x256 DXT1: 64x64 blocks of 8 bytes = 32768 payload bytes.
        let mut dump = dds_header_le(256, 256, b"DXT1", 0);
        dump.extend_from_slice(&vec![0xAA; 32_768]);
        dump.extend_from_slice(&vec![0u8; 1024]);

        let extent = find_size(&dump, 0).unwrap();
        assert_eq!(extent.size_in_dump, 32_896);
        assert_eq!(extent.size_output, 32_896);
        assert!(!extent.compressed);
    }

    #[test]
    fn dxt5_with_mip_chain() {
        let mut dump = dds_header_le(16, 16, b"DXT5", 3);
        // 16x16 -> 256, 8x8 -> 64, 4x4 -> 16 bytes of DXT5 blocks.
        dump.extend_from_slice(&vec![0x55; 256 + 64 + 16]);

        let extent = find_size(&dump, 0).unwrap();
        assert_eq!(extent.size_in_dump, 128 + 256 + 64 + 16);
    }

    #[test]
    fn big_endian_header_is_retried() {
        let mut data = vec![0u8; 128];
        data[0..4].copy_from_slice(b"DDS ");
        data[4..8].copy_from_slice(&EXPECTED_HEADER_SIZE.to_be_bytes());
        data[8..12].copy_from_slice(&0u32.to_be_bytes());
        data[12..16].copy_from_slice(&4u32.to_be_bytes());
        data[16..20].copy_from_slice(&4u32.to_be_bytes());
        data[84..88].copy_from_slice(b"DXT1");
        data.extend_from_slice(&[0u8; 8]);

        let extent = find_size(&data, 0).unwrap();
        assert_eq!(extent.size_in_dump, 128 + 8);
    }

    #[test]
    fn truncated_payload_is_rejected() {
        // Header promises 32768 bytes of pixels but the dump ends early.
        let dump = dds_header_le(256, 256, b"DXT1", 0);
        assert_eq!(find_size(&dump, 0), None);
    }

    #[test]
    fn implausible_dimensions_are_rejected() {
        let dump = dds_header_le(0, 256, b"DXT1", 0);
        assert!(!validate(&dump, 0));
        assert_eq!(find_size(&dump, 0), None);
    }
}
