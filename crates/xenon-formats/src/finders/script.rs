//! Bethesda script source (`scn` / `ScriptName`) size finder.
//!
//! Scripts live in memory as plain ASCII. The finder bounds the printable
//! run from the match, then ends the carve after the last balanced
//! begin/end block, or at the end of the printable run for scripts that
//! declare only variables.

use crate::PayloadExtent;
use crate::finders::accept_stored;

pub const MIN_SIZE: u64 = 16;
pub const MAX_SIZE: u64 = 64 * 1024;

fn is_script_byte(byte: u8) -> bool {
    matches!(byte, 0x20..=0x7E | b'\t' | b'\r' | b'\n')
}

/// Case-insensitive keyword test at the start of a trimmed line.
fn line_starts_with(line: &[u8], keyword: &str) -> bool {
    let trimmed = line
        .iter()
        .position(|&byte| byte != b' ' && byte != b'\t')
        .map_or(&[][..], |start| &line[start..]);
    trimmed.len() >= keyword.len()
        && trimmed[..keyword.len()].eq_ignore_ascii_case(keyword.as_bytes())
        && trimmed.get(keyword.len()).is_none_or(|&byte| !byte.is_ascii_alphanumeric())
}

pub fn find_size(data: &[u8], offset: usize) -> Option<PayloadExtent> {
    let window_end = data.len().min(offset + MAX_SIZE as usize);
    let printable_len = data[offset..window_end]
        .iter()
        .position(|&byte| !is_script_byte(byte))
        .unwrap_or(window_end - offset);
    let text = &data[offset..offset + printable_len];

    let mut depth = 0usize;
    let mut saw_begin = false;
    let mut balanced_end = None;

    let mut line_start = 0usize;
    while line_start < text.len() {
        let line_end = memchr::memchr(b'\n', &text[line_start..])
            .map_or(text.len(), |pos| line_start + pos);
        let line = &text[line_start..line_end];

        if line_starts_with(line, "begin") {
            saw_begin = true;
            depth += 1;
        } else if line_starts_with(line, "end") {
            if depth == 0 {
                // An end with no matching begin belongs to whatever
                // follows this script in memory.
                break;
            }
            depth -= 1;
            if depth == 0 {
                balanced_end = Some(text.len().min(line_end + 1));
            }
        }
        line_start = line_end + 1;
    }

    let size = if saw_begin {
        // Unbalanced blocks mean the script was cut off mid-write.
        balanced_end? as u64
    } else {
        printable_len as u64
    };
    accept_stored(data, offset, size, MIN_SIZE, MAX_SIZE)
}
