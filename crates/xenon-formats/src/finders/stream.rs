//! Compressed stream (zlib/gzip) size finders.
//!
//! These are the only finders whose two sizes differ: `size_in_dump` is
//! the compressed length consumed from the dump and `size_output` the
//! inflated length. Inflation is bounded; a stream that would inflate past
//! `max_size` is rejected rather than truncated.

use std::io::Read;

use flate2::bufread::{GzDecoder, ZlibDecoder};
use tracing::trace;

use crate::PayloadExtent;

pub const MIN_SIZE: u64 = 64;
pub const MAX_SIZE: u64 = 256 * 1024 * 1024;

/// Inflated output larger than this is considered a false positive.
const MAX_OUTPUT: u64 = 256 * 1024 * 1024;

/// Drive `decoder` to end-of-stream, counting output bytes without
/// keeping them. Returns the inflated length, or `None` on corrupt data
/// or oversized output.
fn inflated_len(decoder: &mut impl Read) -> Option<u64> {
    let mut scratch = [0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        match decoder.read(&mut scratch) {
            Ok(0) => return Some(total),
            Ok(read) => {
                total += read as u64;
                if total > MAX_OUTPUT {
                    return None;
                }
            }
            Err(error) => {
                trace!(%error, "stream inflation failed");
                return None;
            }
        }
    }
}

fn accept(offset: usize, consumed: u64, output: u64, data_len: usize) -> Option<PayloadExtent> {
    if consumed < MIN_SIZE || consumed > MAX_SIZE || output == 0 {
        return None;
    }
    if (offset as u64).checked_add(consumed)? > data_len as u64 {
        return None;
    }
    Some(PayloadExtent {
        size_in_dump: consumed,
        size_output: output,
        compressed: true,
    })
}

/// Inflate the full output of a reader, bounded by [`MAX_OUTPUT`].
fn inflate_to_vec(decoder: &mut impl Read) -> Option<Vec<u8>> {
    let mut output = Vec::new();
    let mut scratch = [0u8; 64 * 1024];
    loop {
        match decoder.read(&mut scratch) {
            Ok(0) => return Some(output),
            Ok(read) => {
                output.extend_from_slice(&scratch[..read]);
                if output.len() as u64 > MAX_OUTPUT {
                    return None;
                }
            }
            Err(_) => return None,
        }
    }
}

/// Inflate a zlib stream carved out of the dump. `input` must span exactly
/// the `size_in_dump` bytes the finder reported.
pub fn decompress_zlib(input: &[u8]) -> Option<Vec<u8>> {
    inflate_to_vec(&mut ZlibDecoder::new(input))
}

/// Inflate a gzip stream carved out of the dump.
pub fn decompress_gzip(input: &[u8]) -> Option<Vec<u8>> {
    inflate_to_vec(&mut GzDecoder::new(input))
}

pub fn find_size_zlib(data: &[u8], offset: usize) -> Option<PayloadExtent> {
    let input = data.get(offset..)?;
    let mut decoder = ZlibDecoder::new(input);
    let output = inflated_len(&mut decoder)?;
    // The slice reader advances exactly as far as the inflater consumed.
    let consumed = (input.len() - decoder.get_ref().len()) as u64;
    accept(offset, consumed, output, data.len())
}

pub fn find_size_gzip(data: &[u8], offset: usize) -> Option<PayloadExtent> {
    let input = data.get(offset..)?;
    let mut decoder = GzDecoder::new(input);
    let output = inflated_len(&mut decoder)?;
    let consumed = (input.len() - decoder.get_ref().len()) as u64;
    accept(offset, consumed, output, data.len())
}
