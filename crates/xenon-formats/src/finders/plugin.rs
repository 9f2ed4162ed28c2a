//! TES4 plugin (ESP/ESM) size finder.
//!
//! A plugin is one TES4 header record followed by top-level GRUPs, each of
//! which declares its total size (header included). The payload ends where
//! the GRUP chain stops.

use crate::PayloadExtent;
use crate::bytes::u32_le;
use crate::finders::accept_stored;

pub const MIN_SIZE: u64 = 24;
pub const MAX_SIZE: u64 = 64 * 1024 * 1024;

/// Record header length for TES4-era plugins.
const RECORD_HEADER_LEN: u64 = 24;
const MAX_TES4_DATA: u32 = 16 * 1024 * 1024;
const MAX_GROUPS: usize = 10_000;

pub fn validate(data: &[u8], offset: usize) -> bool {
    u32_le(data, offset + 4).is_some_and(|size| size <= MAX_TES4_DATA)
}

pub fn find_size(data: &[u8], offset: usize) -> Option<PayloadExtent> {
    let tes4_data_size = u32_le(data, offset + 4)?;
    if tes4_data_size > MAX_TES4_DATA {
        return None;
    }

    let mut end = (offset as u64)
        .checked_add(RECORD_HEADER_LEN)?
        .checked_add(u64::from(tes4_data_size))?;
    if end > data.len() as u64 {
        return None;
    }

    for _ in 0..MAX_GROUPS {
        let pos = usize::try_from(end).ok()?;
        let Some(tag) = data.get(pos..pos + 4) else {
            break;
        };
        if tag != b"GRUP" {
            break;
        }
        // Group size includes the 24-byte group header.
        let group_size = u64::from(u32_le(data, pos + 4)?);
        if group_size < RECORD_HEADER_LEN {
            break;
        }
        let next = end.checked_add(group_size)?;
        if next > data.len() as u64 || next - offset as u64 > MAX_SIZE {
            break;
        }
        end = next;
    }

    accept_stored(data, offset, end - offset as u64, MIN_SIZE, MAX_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tag: &[u8; 4], data_size: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(tag);
        bytes.extend_from_slice(&data_size.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 16]); // flags, id, revision, version
        bytes.extend_from_slice(&vec![0x77; data_size as usize]);
        bytes
    }

    fn group(payload: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"GRUP");
        bytes.extend_from_slice(&(24 + payload).to_le_bytes());
        bytes.extend_from_slice(&[0u8; 16]);
        bytes.extend_from_slice(&vec![0x88; payload as usize]);
        bytes
    }

    #[test]
    fn walks_header_record_and_groups() {
        let mut dump = record(b"TES4", 40);
        dump.extend(group(100));
        dump.extend(group(8));
        let expected = dump.len() as u64;
        dump.extend_from_slice(b"not a record tag and then some padding..");

        assert!(validate(&dump, 0));
        let extent = find_size(&dump, 0).unwrap();
        assert_eq!(extent.size_in_dump, expected);
    }

    #[test]
    fn header_record_alone_is_enough() {
        let dump = record(b"TES4", 16);
        let extent = find_size(&dump, 0).unwrap();
        assert_eq!(extent.size_in_dump, 40);
    }

    #[test]
    fn group_running_past_dump_end_is_not_followed() {
        let mut dump = record(b"TES4", 16);
        let expected = dump.len() as u64;
        dump.extend_from_slice(b"GRUP");
        dump.extend_from_slice(&4096u32.to_le_bytes());
        dump.extend_from_slice(&[0u8; 32]);

        let extent = find_size(&dump, 0).unwrap();
        assert_eq!(extent.size_in_dump, expected);
    }

    #[test]
    fn truncated_header_record_is_rejected() {
        let dump = record(b"TES4", 4096);
        assert_eq!(find_size(&dump[..64], 0), None);
    }
}
