//! Chunked multi-pattern signature scanning.
//!
//! The dump is searched in fixed-size chunks plus a trailing overlap
//! window so a magic straddling a chunk boundary is still seen. A match
//! that begins inside the overlap tail belongs to the next chunk and is
//! skipped there-and-then; the engine keeps a `(kind, offset)` set as a
//! second guard so every signature occurrence is accepted exactly once.

use memchr::memmem;
use xenon_formats::{Descriptor, FileKind};

/// Overlap window: at least the longest registered magic plus the header
/// bytes a validator may touch.
pub const OVERLAP: usize = 64;

/// Default scan chunk size (10 MiB); the coverage analyzer passes 50 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 10 * 1024 * 1024;

/// A raw signature hit, before validation and size finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMatch {
    pub kind: FileKind,
    pub offset: u64,
}

/// Prebuilt searchers for a set of descriptors.
pub struct SignatureScanner<'d> {
    finders: Vec<(FileKind, memmem::Finder<'d>)>,
}

impl<'d> SignatureScanner<'d> {
    pub fn new(descriptors: &[&'d Descriptor]) -> Self {
        let mut finders = Vec::new();
        for descriptor in descriptors {
            for magic in descriptor.magics {
                finders.push((descriptor.kind, memmem::Finder::new(*magic)));
            }
        }
        Self { finders }
    }

    /// Scan one chunk. `start` is the chunk's absolute offset; the window
    /// runs to `start + chunk_size + OVERLAP` (clamped to the dump end),
    /// but only matches beginning inside the canonical `chunk_size` span
    /// are reported.
    pub fn scan_chunk(&self, data: &[u8], start: usize, chunk_size: usize) -> Vec<RawMatch> {
        let window_end = data.len().min(start + chunk_size + OVERLAP);
        let window = &data[start..window_end];

        let mut matches = Vec::new();
        for (kind, finder) in &self.finders {
            for position in finder.find_iter(window) {
                if position >= chunk_size {
                    continue;
                }
                matches.push(RawMatch {
                    kind: *kind,
                    offset: (start + position) as u64,
                });
            }
        }
        matches.sort_unstable_by_key(|raw| (raw.offset, raw.kind));
        matches
    }
}

/// Chunk start offsets for a dump of `len` bytes.
pub fn chunk_starts(len: usize, chunk_size: usize) -> impl Iterator<Item = usize> {
    (0..len).step_by(chunk_size.max(1))
}
