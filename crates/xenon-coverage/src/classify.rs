//! Gap content classification.
//!
//! Each unidentified gap is sampled and sorted into one of a closed set
//! of classes. The ladder runs cheapest-first: zero fill, single-byte
//! repeat, aligned 4-byte repeat, then an entropy measurement over a
//! larger window.

use serde::{Deserialize, Serialize};

use crate::entropy::shannon_entropy;
use crate::intervals::Interval;

/// First bytes read from every gap.
const SAMPLE_LEN: usize = 64;
/// Larger read used to confirm zero fill.
const ZERO_CONFIRM_LEN: usize = 4096;
/// Window for the entropy measurement.
const ENTROPY_WINDOW: usize = 64 * 1024;

/// Entropy at or above this is compressed or encrypted data.
const HIGH_ENTROPY_BITS: f64 = 7.0;
/// Entropy inside this band reads as text or table data.
const STRUCTURED_BITS: std::ops::RangeInclusive<f64> = 3.0..=5.0;

/// What a gap's bytes look like.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapClass {
    /// Entirely zero-filled.
    Zeros,
    /// A single non-zero byte repeated.
    RepeatByte(u8),
    /// An aligned 4-byte pattern repeated.
    Repeat4Byte([u8; 4]),
    /// Entropy >= 7 bits/byte: likely compressed or encrypted.
    HighEntropy,
    /// Entropy between 3 and 5 bits/byte: likely text or tables.
    Structured,
    Unknown,
}

impl GapClass {
    /// Whether the class is one of the repeat patterns.
    pub fn is_repeating(self) -> bool {
        matches!(self, Self::RepeatByte(_) | Self::Repeat4Byte(_))
    }

    /// Short label for the text report.
    pub fn label(self) -> &'static str {
        match self {
            Self::Zeros => "zeros",
            Self::RepeatByte(_) => "repeat-byte",
            Self::Repeat4Byte(_) => "repeat-4byte",
            Self::HighEntropy => "high-entropy",
            Self::Structured => "structured",
            Self::Unknown => "unknown",
        }
    }
}

/// An unidentified region with its classification and a header sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapRegion {
    pub start: u64,
    pub end: u64,
    pub size: u64,
    pub classification: GapClass,
    /// Hex of the first sample bytes (at most 32).
    pub sample_hex: String,
    /// Printable rendering of the same bytes.
    pub sample_ascii: String,
}

impl GapRegion {
    /// First four sample bytes, the candidate magic of the region.
    pub fn magic_prefix(&self) -> Option<[u8; 4]> {
        let hex = self.sample_hex.as_bytes();
        if hex.len() < 8 {
            return None;
        }
        let mut prefix = [0u8; 4];
        for (index, byte) in prefix.iter_mut().enumerate() {
            let pair = std::str::from_utf8(&hex[index * 2..index * 2 + 2]).ok()?;
            *byte = u8::from_str_radix(pair, 16).ok()?;
        }
        Some(prefix)
    }
}

fn render_ascii(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&byte| {
            if (0x20..0x7F).contains(&byte) {
                byte as char
            } else {
                '.'
            }
        })
        .collect()
}

/// Classify one gap of the dump.
pub fn classify_gap(data: &[u8], gap: Interval) -> GapRegion {
    let start = gap.start as usize;
    let end = gap.end as usize;
    let sample = &data[start..end.min(start + SAMPLE_LEN)];

    let classification = classify_bytes(data, start, end, sample);
    GapRegion {
        start: gap.start,
        end: gap.end,
        size: gap.width(),
        classification,
        sample_hex: hex_prefix(sample),
        sample_ascii: render_ascii(&sample[..sample.len().min(32)]),
    }
}

fn hex_prefix(sample: &[u8]) -> String {
    sample[..sample.len().min(32)]
        .iter()
        .fold(String::with_capacity(64), |mut out, byte| {
            use std::fmt::Write as _;
            let _ = write!(out, "{byte:02x}");
            out
        })
}

fn classify_bytes(data: &[u8], start: usize, end: usize, sample: &[u8]) -> GapClass {
    if sample.is_empty() {
        return GapClass::Unknown;
    }

    if sample.iter().all(|&byte| byte == 0) {
        // Confirm with a larger read before calling a big gap zeros.
        let confirm = &data[start..end.min(start + ZERO_CONFIRM_LEN)];
        if confirm.iter().all(|&byte| byte == 0) {
            return GapClass::Zeros;
        }
    }

    let first = sample[0];
    if sample.iter().all(|&byte| byte == first) {
        return GapClass::RepeatByte(first);
    }

    if sample.len() >= 8 {
        let word = [sample[0], sample[1], sample[2], sample[3]];
        if sample.chunks_exact(4).all(|chunk| chunk == word) {
            return GapClass::Repeat4Byte(word);
        }
    }

    let window = &data[start..end.min(start + ENTROPY_WINDOW)];
    let bits = shannon_entropy(window);
    if bits >= HIGH_ENTROPY_BITS {
        GapClass::HighEntropy
    } else if STRUCTURED_BITS.contains(&bits) {
        GapClass::Structured
    } else {
        GapClass::Unknown
    }
}
