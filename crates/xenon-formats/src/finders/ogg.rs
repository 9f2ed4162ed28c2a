//! Ogg page chain size finder.

use crate::PayloadExtent;
use crate::finders::accept_stored;

pub const MIN_SIZE: u64 = 28;
pub const MAX_SIZE: u64 = 64 * 1024 * 1024;

const PAGE_HEADER_LEN: usize = 27;

/// Length of the Ogg page starting at `page`, or `None` when the bytes do
/// not form a version-0 page header.
fn page_len(page: &[u8]) -> Option<usize> {
    if page.len() < PAGE_HEADER_LEN || &page[0..4] != b"OggS" || page[4] != 0 {
        return None;
    }
    let segment_count = usize::from(page[26]);
    let segment_table = page.get(PAGE_HEADER_LEN..PAGE_HEADER_LEN + segment_count)?;
    let body: usize = segment_table.iter().map(|&lacing| usize::from(lacing)).sum();
    Some(PAGE_HEADER_LEN + segment_count + body)
}

pub fn validate(data: &[u8], offset: usize) -> bool {
    data.get(offset + 4) == Some(&0)
}

pub fn find_size(data: &[u8], offset: usize) -> Option<PayloadExtent> {
    let mut pos = offset;
    let mut pages = 0usize;

    while let Some(len) = data.get(pos..).and_then(page_len) {
        let next = pos.checked_add(len)?;
        if next > data.len() || (next - offset) as u64 > MAX_SIZE {
            break;
        }
        pos = next;
        pages += 1;
    }

    if pages == 0 {
        return None;
    }
    accept_stored(data, offset, (pos - offset) as u64, MIN_SIZE, MAX_SIZE)
}
