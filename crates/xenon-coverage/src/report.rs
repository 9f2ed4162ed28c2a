//! Coverage report: analysis, text rendering, and JSON persistence.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;
use xenon_carver::Manifest;

use crate::classify::{GapClass, GapRegion, classify_gap};
use crate::error::Result;
use crate::intervals::{Interval, gaps, merge, total_width};

/// Gaps at or above this size are listed individually in the report.
const LARGE_GAP_SIZE: u64 = 1024 * 1024;
/// How many large gaps the text report shows.
const LARGE_GAP_DISPLAY_LIMIT: usize = 20;
/// How many candidate magics the text report shows.
const MAGIC_DISPLAY_LIMIT: usize = 15;
/// Interesting gaps (candidate magic sources) must be at least this big.
const INTERESTING_GAP_SIZE: u64 = 1024;

/// Byte totals per gap classification.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassifiedBytes {
    pub zeros: u64,
    pub repeating: u64,
    pub high_entropy: u64,
    pub structured: u64,
    pub unknown: u64,
}

/// A recurring 4-byte prefix among unidentified regions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MagicHint {
    pub magic_hex: String,
    pub magic_ascii: String,
    pub regions: u64,
    pub total_bytes: u64,
}

/// Complete coverage analysis of one dump.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageReport {
    pub dump_file: String,
    pub dump_size: u64,
    /// Unique bytes covered by carved extents, overlaps merged out.
    pub identified_bytes: u64,
    /// Raw sum of carved output sizes (includes overlaps and inflation).
    pub total_carved_bytes: u64,
    pub unknown_bytes: u64,
    pub coverage_percent: f64,
    pub files_by_type: BTreeMap<String, u64>,
    pub bytes_by_type: BTreeMap<String, u64>,
    pub classified: ClassifiedBytes,
    pub gap_count: u64,
    pub large_gap_count: u64,
    /// Gaps of at least 1 MiB, largest first.
    pub large_gaps: Vec<GapRegion>,
    /// Candidate magics among unidentified regions, most frequent first.
    pub magic_hints: Vec<MagicHint>,
}

/// Analyze a dump against its manifest. `data` must be the same bytes the
/// manifest was carved from.
pub fn analyze(dump_file: &str, data: &[u8], manifest: &Manifest) -> CoverageReport {
    let dump_size = data.len() as u64;

    let covered = merge(
        manifest
            .entries
            .iter()
            .map(|entry| {
                Interval::new(entry.offset.min(dump_size), entry.end_offset().min(dump_size))
            })
            .collect(),
    );
    let identified_bytes = total_width(&covered);
    let gap_intervals = gaps(&covered, dump_size);

    info!(
        identified = identified_bytes,
        gaps = gap_intervals.len(),
        "coverage intervals merged"
    );

    let mut classified = ClassifiedBytes::default();
    let mut regions: Vec<GapRegion> = Vec::with_capacity(gap_intervals.len());
    for gap in &gap_intervals {
        let region = classify_gap(data, *gap);
        match region.classification {
            GapClass::Zeros => classified.zeros += region.size,
            GapClass::RepeatByte(_) | GapClass::Repeat4Byte(_) => classified.repeating += region.size,
            GapClass::HighEntropy => classified.high_entropy += region.size,
            GapClass::Structured => classified.structured += region.size,
            GapClass::Unknown => classified.unknown += region.size,
        }
        regions.push(region);
    }

    let mut large_gaps: Vec<GapRegion> = regions
        .iter()
        .filter(|region| region.size >= LARGE_GAP_SIZE)
        .cloned()
        .collect();
    large_gaps.sort_by_key(|region| std::cmp::Reverse(region.size));

    let magic_hints = collect_magic_hints(&regions);

    let mut files_by_type = BTreeMap::new();
    let mut bytes_by_type = BTreeMap::new();
    for (name, stats) in &manifest.summary.by_type {
        files_by_type.insert(name.clone(), stats.files);
        bytes_by_type.insert(name.clone(), stats.bytes_in_dump);
    }

    CoverageReport {
        dump_file: dump_file.to_string(),
        dump_size,
        identified_bytes,
        total_carved_bytes: manifest.summary.total_bytes_output,
        unknown_bytes: dump_size - identified_bytes,
        coverage_percent: if dump_size == 0 {
            0.0
        } else {
            identified_bytes as f64 / dump_size as f64 * 100.0
        },
        files_by_type,
        bytes_by_type,
        classified,
        gap_count: regions.len() as u64,
        large_gap_count: large_gaps.len() as u64,
        large_gaps,
        magic_hints,
    }
}

/// Group interesting unidentified regions by their first four bytes; the
/// recurring prefixes are the best candidates for registry extension.
fn collect_magic_hints(regions: &[GapRegion]) -> Vec<MagicHint> {
    let mut groups: BTreeMap<[u8; 4], (u64, u64)> = BTreeMap::new();
    for region in regions {
        if region.classification == GapClass::Zeros
            || region.classification.is_repeating()
            || region.size < INTERESTING_GAP_SIZE
        {
            continue;
        }
        if let Some(prefix) = region.magic_prefix() {
            let entry = groups.entry(prefix).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += region.size;
        }
    }

    let mut hints: Vec<MagicHint> = groups
        .into_iter()
        .map(|(prefix, (regions, total_bytes))| MagicHint {
            magic_hex: prefix.iter().fold(String::new(), |mut out, byte| {
                let _ = write!(out, "{byte:02x}");
                out
            }),
            magic_ascii: prefix
                .iter()
                .map(|&byte| if (0x20..0x7F).contains(&byte) { byte as char } else { '.' })
                .collect(),
            regions,
            total_bytes,
        })
        .collect();
    hints.sort_by_key(|hint| std::cmp::Reverse(hint.regions));
    hints
}

fn format_size(size: u64) -> String {
    let mut value = size as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{value:.2} {unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.2} TB")
}

impl CoverageReport {
    /// Human-readable text report.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(70);
        let thin = "-".repeat(70);

        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "MEMORY DUMP COVERAGE ANALYSIS REPORT");
        let _ = writeln!(out, "{rule}\n");
        let _ = writeln!(out, "Dump File: {}", self.dump_file);
        let _ = writeln!(out, "Dump Size: {}\n", format_size(self.dump_size));

        let _ = writeln!(out, "{thin}");
        let _ = writeln!(out, "COVERAGE SUMMARY");
        let _ = writeln!(out, "{thin}");
        let _ = writeln!(
            out,
            "Unique identified:  {:>15} ({:.2}%)",
            format_size(self.identified_bytes),
            self.coverage_percent
        );
        let _ = writeln!(
            out,
            "Total carved:       {:>15} (includes overlaps and inflation)",
            format_size(self.total_carved_bytes)
        );
        let _ = writeln!(
            out,
            "Unknown data:       {:>15} ({:.2}%)",
            format_size(self.unknown_bytes),
            100.0 - self.coverage_percent
        );
        let _ = writeln!(out, "  - zero-filled:    {:>15}", format_size(self.classified.zeros));
        let _ = writeln!(out, "  - repeating:      {:>15}", format_size(self.classified.repeating));
        let _ = writeln!(out, "  - high-entropy:   {:>15}", format_size(self.classified.high_entropy));
        let _ = writeln!(out, "  - structured:     {:>15}", format_size(self.classified.structured));
        let _ = writeln!(out, "  - unclassified:   {:>15}\n", format_size(self.classified.unknown));

        let _ = writeln!(out, "{thin}");
        let _ = writeln!(out, "FILES BY TYPE");
        let _ = writeln!(out, "{thin}");
        let _ = writeln!(out, "{:<20} {:>10} {:>15} {:>12}", "Type", "Count", "Size", "% of dump");
        let _ = writeln!(out, "{thin}");
        let mut by_bytes: Vec<(&String, &u64)> = self.bytes_by_type.iter().collect();
        by_bytes.sort_by_key(|&(_, &bytes)| std::cmp::Reverse(bytes));
        for (file_type, &bytes) in by_bytes {
            let count = self.files_by_type.get(file_type).copied().unwrap_or(0);
            let percent = if self.dump_size == 0 {
                0.0
            } else {
                bytes as f64 / self.dump_size as f64 * 100.0
            };
            let _ = writeln!(
                out,
                "{file_type:<20} {count:>10} {:>15} {percent:>11.2}%",
                format_size(bytes)
            );
        }
        let total_files: u64 = self.files_by_type.values().sum();
        let _ = writeln!(out, "{thin}");
        let _ = writeln!(
            out,
            "{:<20} {total_files:>10} {:>15} {:>11.2}%\n",
            "TOTAL",
            format_size(self.identified_bytes),
            self.coverage_percent
        );

        if !self.large_gaps.is_empty() {
            let _ = writeln!(out, "{thin}");
            let _ = writeln!(out, "LARGE UNKNOWN REGIONS (>= 1 MB): {}", self.large_gap_count);
            let _ = writeln!(out, "{thin}");
            let _ = writeln!(out, "{:<18} {:>15} {:<14} Sample (hex)", "Offset", "Size", "Class");
            let _ = writeln!(out, "{thin}");
            for region in self.large_gaps.iter().take(LARGE_GAP_DISPLAY_LIMIT) {
                let _ = writeln!(
                    out,
                    "{:#014X}     {:>15} {:<14} {}",
                    region.start,
                    format_size(region.size),
                    region.classification.label(),
                    region.sample_hex
                );
            }
            if self.large_gaps.len() > LARGE_GAP_DISPLAY_LIMIT {
                let _ = writeln!(out, "... and {} more regions", self.large_gaps.len() - LARGE_GAP_DISPLAY_LIMIT);
            }
            let _ = writeln!(out);
        }

        if !self.magic_hints.is_empty() {
            let _ = writeln!(out, "{thin}");
            let _ = writeln!(out, "POTENTIAL UNIDENTIFIED FILE SIGNATURES");
            let _ = writeln!(out, "{thin}");
            let _ = writeln!(out, "{:<20} {:>8} {:>15}  ASCII", "Magic (hex)", "Count", "Total size");
            let _ = writeln!(out, "{thin}");
            for hint in self.magic_hints.iter().take(MAGIC_DISPLAY_LIMIT) {
                let _ = writeln!(
                    out,
                    "{:<20} {:>8} {:>15}  {}",
                    hint.magic_hex,
                    hint.regions,
                    format_size(hint.total_bytes),
                    hint.magic_ascii
                );
            }
            let _ = writeln!(out);
        }

        let _ = writeln!(out, "{rule}");
        out
    }

    /// Write `coverage_report.txt` and `coverage_report.json` into
    /// `directory`. Returns both paths.
    pub fn save(&self, directory: &Path) -> Result<(PathBuf, PathBuf)> {
        fs::create_dir_all(directory)?;
        let text_path = directory.join("coverage_report.txt");
        fs::write(&text_path, self.render_text())?;

        let json_path = directory.join("coverage_report.json");
        fs::write(&json_path, serde_json::to_vec_pretty(self)?)?;

        info!(text = %text_path.display(), json = %json_path.display(), "coverage reports saved");
        Ok((text_path, json_path))
    }
}

#[cfg(test)]
mod tests {
    use xenon_carver::{Manifest, ManifestEntry};

    use super::*;

    fn entry(file_type: &str, offset: u64, size: u64) -> ManifestEntry {
        ManifestEntry {
            file_type: file_type.to_string(),
            offset,
            size_in_dump: size,
            size_output: size,
            sha256: "ab".repeat(32),
            filename: format!("{file_type}_{offset:012X}_abababab.bin"),
        }
    }

    #[test]
    fn coverage_identity_holds() {
        let mut data = vec![0u8; 8192];
        data[4096..8192].fill(0xCD);
        let manifest = Manifest::from_entries(vec![entry("dds", 0, 1024), entry("bik", 512, 1024)]);

        let report = analyze("test.dmp", &data, &manifest);
        assert_eq!(report.identified_bytes, 1536);
        assert_eq!(report.identified_bytes + report.unknown_bytes, report.dump_size);
        assert_eq!(report.gap_count, 1);
    }

    #[test]
    fn zero_and_repeat_gaps_are_tallied() {
        let mut data = vec![0u8; 4096];
        data[2048..].fill(0xCD);
        // Cover a slice in the middle so both gap flavors appear.
        let manifest = Manifest::from_entries(vec![entry("dds", 2000, 48)]);

        let report = analyze("test.dmp", &data, &manifest);
        assert_eq!(report.classified.zeros, 2000);
        assert_eq!(report.classified.repeating, 2048);
        assert_eq!(report.unknown_bytes, 4048);
    }

    #[test]
    fn overlapping_entries_do_not_double_count() {
        let data = vec![0u8; 4096];
        let manifest = Manifest::from_entries(vec![
            entry("nif", 0, 1000),
            entry("dds", 500, 1000),
            entry("dds", 500, 200),
        ]);

        let report = analyze("test.dmp", &data, &manifest);
        assert_eq!(report.identified_bytes, 1500);
    }

    #[test]
    fn magic_hints_surface_recurring_prefixes() {
        let mut data = vec![0u8; 16_384];
        for base in [1024usize, 5120, 9216] {
            data[base..base + 4].copy_from_slice(b"FORM");
            for (index, byte) in data[base + 4..base + 2048].iter_mut().enumerate() {
                *byte = (index % 191) as u8;
            }
        }
        // Carve tiny slivers between the FORM regions so each lands in
        // its own gap.
        let manifest = Manifest::from_entries(vec![
            entry("dds", 0, 1024),
            entry("dds", 4096, 1024),
            entry("dds", 8192, 1024),
            entry("dds", 12_288, 4096),
        ]);

        let report = analyze("test.dmp", &data, &manifest);
        let form = report
            .magic_hints
            .iter()
            .find(|hint| hint.magic_ascii == "FORM")
            .expect("FORM hint present");
        assert_eq!(form.regions, 3);
    }

    #[test]
    fn text_and_json_reports_are_written() {
        let data = vec![0u8; 2048];
        let manifest = Manifest::from_entries(vec![entry("lip", 0, 512)]);
        let report = analyze("fnv.dmp", &data, &manifest);

        let dir = tempfile::tempdir().unwrap();
        let (text_path, json_path) = report.save(dir.path()).unwrap();

        let text = fs::read_to_string(text_path).unwrap();
        assert!(text.contains("COVERAGE SUMMARY"));
        assert!(text.contains("lip"));

        let loaded: CoverageReport = serde_json::from_slice(&fs::read(json_path).unwrap()).unwrap();
        assert_eq!(loaded.identified_bytes, report.identified_bytes);
        assert_eq!(loaded.coverage_percent, report.coverage_percent);
    }
}
