//! The carving engine: scan, validate, size, reconcile, extract.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use xenon_formats::{FileKind, PayloadExtent, registry};

use crate::dump::DumpView;
use crate::error::{CarveError, Result};
use crate::manifest::{Manifest, ManifestEntry};
use crate::scanner::{DEFAULT_CHUNK_SIZE, OVERLAP, SignatureScanner, chunk_starts};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct CarveConfig {
    /// Root output directory; each dump gets a subtree named after its
    /// file stem.
    pub output_dir: PathBuf,
    /// Scan chunk size in bytes.
    pub chunk_size: usize,
    /// Cap on accepted matches per file type.
    pub max_files_per_type: usize,
}

impl CarveConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_files_per_type: 10_000,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_max_files_per_type(mut self, max_files_per_type: usize) -> Self {
        self.max_files_per_type = max_files_per_type;
        self
    }
}

/// Resolve external type names to kinds, rejecting unknown names.
pub fn resolve_kinds(names: &[impl AsRef<str>]) -> Result<Vec<FileKind>> {
    names
        .iter()
        .map(|name| {
            FileKind::from_name(name.as_ref())
                .ok_or_else(|| CarveError::UnknownFileType(name.as_ref().to_string()))
        })
        .collect()
}

/// An accepted match waiting for overlap resolution and extraction.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    kind: FileKind,
    offset: u64,
    extent: PayloadExtent,
}

pub struct Carver {
    config: CarveConfig,
    cancel: Arc<AtomicBool>,
}

impl Carver {
    pub fn new(config: CarveConfig) -> Self {
        Self {
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a cancellation flag (typically set from a Ctrl-C handler).
    /// Scanning stops at the next chunk boundary; everything found so far
    /// is still resolved, written, and flushed to the manifest.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Carve one dump. `kinds` of `None` selects the whole registry.
    /// Returns the manifest, which is also persisted in the dump's output
    /// directory.
    pub fn carve_dump(&self, dump_path: &Path, kinds: Option<&[FileKind]>) -> Result<Manifest> {
        let view = DumpView::open(dump_path)?;
        info!(
            dump = %dump_path.display(),
            size = view.len(),
            "carving dump"
        );

        let candidates = self.collect_candidates(&view, kinds);
        let kept = resolve_overlaps(candidates);

        let dump_dir = self.config.output_dir.join(view.stem());
        fs::create_dir_all(&dump_dir)?;

        let entries = self.extract(&view, &kept, &dump_dir);
        let manifest = Manifest::from_entries(entries);
        manifest.save(&dump_dir)?;

        info!(
            files = manifest.summary.total_files,
            bytes_in_dump = manifest.summary.total_bytes_in_dump,
            bytes_output = manifest.summary.total_bytes_output,
            "carve complete"
        );
        Ok(manifest)
    }

    /// Chunked scan of the whole dump, producing validated, sized
    /// candidates in offset order.
    fn collect_candidates(&self, view: &DumpView, kinds: Option<&[FileKind]>) -> Vec<Candidate> {
        let selected: Vec<FileKind> = kinds.map_or_else(|| FileKind::ALL.to_vec(), <[FileKind]>::to_vec);
        let descriptors: Vec<_> = selected.iter().map(|&kind| registry::descriptor(kind)).collect();
        let scanner = SignatureScanner::new(&descriptors);

        let data = view.bytes();
        let chunk_size = self.config.chunk_size.max(OVERLAP);

        let mut seen: HashSet<(FileKind, u64)> = HashSet::new();
        let mut per_type = vec![0usize; FileKind::ALL.len()];
        let mut capped: Vec<FileKind> = Vec::new();
        let mut candidates = Vec::new();

        for start in chunk_starts(data.len(), chunk_size) {
            if self.cancel.load(Ordering::Relaxed) {
                warn!(offset = start, "carve cancelled, flushing partial results");
                break;
            }

            for raw in scanner.scan_chunk(data, start, chunk_size) {
                if !seen.insert((raw.kind, raw.offset)) {
                    continue;
                }
                let count = &mut per_type[raw.kind as usize];
                if *count >= self.config.max_files_per_type {
                    if !capped.contains(&raw.kind) {
                        warn!(kind = %raw.kind, cap = self.config.max_files_per_type, "per-type cap reached");
                        capped.push(raw.kind);
                    }
                    continue;
                }

                let descriptor = registry::descriptor(raw.kind);
                let offset = raw.offset as usize;
                if let Some(validate) = descriptor.validator
                    && !validate(data, offset)
                {
                    continue;
                }

                let Some(extent) = run_size_finder(descriptor.size_finder, data, offset, raw.kind) else {
                    continue;
                };
                // Finders bound their own output; enforce the registry
                // bounds and dump extent once more before accepting.
                if extent.size_in_dump < descriptor.min_size
                    || extent.size_in_dump > descriptor.max_size
                    || raw.offset + extent.size_in_dump > view.len()
                {
                    continue;
                }

                *count += 1;
                candidates.push(Candidate {
                    kind: raw.kind,
                    offset: raw.offset,
                    extent,
                });
            }
        }

        debug!(candidates = candidates.len(), "scan finished");
        candidates
    }

    /// Write output files and build manifest entries. A record whose
    /// output cannot be produced or written is logged and omitted.
    fn extract(&self, view: &DumpView, kept: &[Candidate], dump_dir: &Path) -> Vec<ManifestEntry> {
        let data = view.bytes();
        let mut entries = Vec::with_capacity(kept.len());

        for candidate in kept {
            let descriptor = registry::descriptor(candidate.kind);
            let stored = &data
                [candidate.offset as usize..(candidate.offset + candidate.extent.size_in_dump) as usize];

            let Some(output) = output_bytes(candidate.kind, candidate.extent, stored) else {
                debug!(kind = %candidate.kind, offset = candidate.offset, "payload no longer inflates, dropped");
                continue;
            };

            let digest = hex::encode(Sha256::digest(output.as_ref()));
            let filename = format!(
                "{}_{:012X}_{}.{}",
                candidate.kind,
                candidate.offset,
                &digest[..8],
                descriptor.extension
            );

            let type_dir = dump_dir.join(candidate.kind.name());
            let path = type_dir.join(&filename);
            let write_result = fs::create_dir_all(&type_dir).and_then(|()| {
                if path.exists() {
                    debug!(file = %path.display(), "output already written, skipping");
                    Ok(())
                } else {
                    fs::write(&path, output.as_ref())
                }
            });
            if let Err(error) = write_result {
                warn!(file = %path.display(), %error, "failed to write output, omitting from manifest");
                continue;
            }

            entries.push(ManifestEntry {
                file_type: candidate.kind.name().to_string(),
                offset: candidate.offset,
                size_in_dump: candidate.extent.size_in_dump,
                size_output: output.len() as u64,
                sha256: digest,
                filename,
            });
        }
        entries
    }
}

/// Run a size finder, treating a panic as a rejection.
fn run_size_finder(
    finder: xenon_formats::descriptor::SizeFinder,
    data: &[u8],
    offset: usize,
    kind: FileKind,
) -> Option<PayloadExtent> {
    match panic::catch_unwind(AssertUnwindSafe(|| finder(data, offset))) {
        Ok(extent) => extent,
        Err(_) => {
            warn!(kind = %kind, offset, "size finder panicked, match dropped");
            None
        }
    }
}

/// Produce the output bytes for a candidate: the stored slice for plain
/// formats, the inflated stream for compressed ones.
fn output_bytes(kind: FileKind, extent: PayloadExtent, stored: &[u8]) -> Option<Cow<'_, [u8]>> {
    if !extent.compressed {
        return Some(Cow::Borrowed(stored));
    }
    match kind {
        FileKind::ZlibStream => xenon_formats::finders::stream::decompress_zlib(stored).map(Cow::Owned),
        FileKind::GzipStream => xenon_formats::finders::stream::decompress_gzip(stored).map(Cow::Owned),
        _ => None,
    }
}

/// Sort by offset (larger extents first on ties) and drop every record
/// fully contained in a previously accepted one. Records that merely
/// touch or partially overlap are both kept.
fn resolve_overlaps(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by_key(|candidate| {
        (
            candidate.offset,
            std::cmp::Reverse(candidate.extent.size_in_dump),
            candidate.kind,
        )
    });

    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    let mut max_end = 0u64;
    for candidate in candidates {
        let end = candidate.offset + candidate.extent.size_in_dump;
        if !kept.is_empty() && end <= max_end {
            debug!(kind = %candidate.kind, offset = candidate.offset, "contained in a larger record, dropped");
            continue;
        }
        max_end = max_end.max(end);
        kept.push(candidate);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(kind: FileKind, offset: u64, size: u64) -> Candidate {
        Candidate {
            kind,
            offset,
            extent: PayloadExtent::stored(size),
        }
    }

    #[test]
    fn contained_records_are_dropped() {
        let kept = resolve_overlaps(vec![
            candidate(FileKind::Nif, 0, 1000),
            candidate(FileKind::Dds, 100, 200),
            candidate(FileKind::Dds, 2000, 100),
        ]);
        let offsets: Vec<u64> = kept.iter().map(|c| c.offset).collect();
        assert_eq!(offsets, vec![0, 2000]);
    }

    #[test]
    fn partial_overlaps_are_both_kept() {
        let kept = resolve_overlaps(vec![
            candidate(FileKind::Nif, 0, 1000),
            candidate(FileKind::Bik, 500, 1000),
        ]);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn containment_checks_against_all_previous_records() {
        // The middle record is contained in the first, not the second;
        // dropping it must not hide the first record's extent from later
        // containment checks.
        let kept = resolve_overlaps(vec![
            candidate(FileKind::Nif, 0, 1000),
            candidate(FileKind::Bik, 100, 2000),
            candidate(FileKind::Dds, 900, 50),
        ]);
        let offsets: Vec<u64> = kept.iter().map(|c| c.offset).collect();
        assert_eq!(offsets, vec![0, 100]);
    }

    #[test]
    fn ties_prefer_the_outer_container() {
        let kept = resolve_overlaps(vec![
            candidate(FileKind::Dds, 64, 100),
            candidate(FileKind::Nif, 64, 500),
        ]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].kind, FileKind::Nif);
    }

    #[test]
    fn unknown_type_names_are_rejected() {
        assert!(resolve_kinds(&["dds", "xma"]).is_ok());
        assert!(matches!(
            resolve_kinds(&["dds", "jpeg"]),
            Err(CarveError::UnknownFileType(name)) if name == "jpeg"
        ));
    }
}
