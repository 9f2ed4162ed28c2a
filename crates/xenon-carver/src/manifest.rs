//! Carve manifest: the durable record of every carved file.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use xenon_formats::FileKind;

use crate::error::Result;

/// File name of the persisted manifest inside a dump's output directory.
pub const MANIFEST_FILE_NAME: &str = "carve_manifest.json";

/// One accepted signature match with a successfully written output file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    /// External format identifier (`dds`, `xma`, ...).
    pub file_type: String,
    /// Absolute offset of the payload in the dump.
    pub offset: u64,
    /// Bytes the payload occupies in the dump (compressed length for
    /// stream formats).
    pub size_in_dump: u64,
    /// Bytes written to the output file (inflated length for stream
    /// formats).
    pub size_output: u64,
    /// Hex sha256 of the output bytes.
    pub sha256: String,
    /// Deterministic output file name.
    pub filename: String,
}

impl ManifestEntry {
    pub fn kind(&self) -> Option<FileKind> {
        FileKind::from_name(&self.file_type)
    }

    /// End offset of the payload in the dump (closed-open).
    pub fn end_offset(&self) -> u64 {
        self.offset + self.size_in_dump
    }
}

/// Per-type aggregate statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypeStats {
    pub files: u64,
    pub bytes_in_dump: u64,
    pub bytes_output: u64,
}

/// Whole-run aggregate statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestSummary {
    pub total_files: u64,
    pub total_bytes_in_dump: u64,
    pub total_bytes_output: u64,
    pub by_type: BTreeMap<String, TypeStats>,
}

/// Ordered record of every carved file plus summary statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    /// Entries in ascending dump offset order.
    pub entries: Vec<ManifestEntry>,
    pub summary: ManifestSummary,
}

impl Manifest {
    /// Build a manifest from entries, sorting them by offset and
    /// computing the summary.
    pub fn from_entries(mut entries: Vec<ManifestEntry>) -> Self {
        entries.sort_by_key(|entry| (entry.offset, entry.filename.clone()));

        let mut summary = ManifestSummary::default();
        for entry in &entries {
            summary.total_files += 1;
            summary.total_bytes_in_dump += entry.size_in_dump;
            summary.total_bytes_output += entry.size_output;
            let stats = summary.by_type.entry(entry.file_type.clone()).or_default();
            stats.files += 1;
            stats.bytes_in_dump += entry.size_in_dump;
            stats.bytes_output += entry.size_output;
        }

        Self { entries, summary }
    }

    /// Persist to `<dir>/carve_manifest.json`.
    pub fn save(&self, directory: &Path) -> Result<()> {
        let path = directory.join(MANIFEST_FILE_NAME);
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// Load a manifest previously written by [`Manifest::save`].
    pub fn load(directory: &Path) -> Result<Self> {
        let path = directory.join(MANIFEST_FILE_NAME);
        Ok(serde_json::from_slice(&fs::read(path)?)?)
    }
}
