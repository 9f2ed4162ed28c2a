//! Post-carve integrity checking.
//!
//! Validates that carved files are plausibly complete: headers parse,
//! declared sizes match what was written, dimensions are sane. Files that
//! fail are labeled INVALID in the report but kept on disk.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;
use walkdir::WalkDir;
use xenon_formats::FileKind;
use xenon_formats::bytes::{u16_le, u32_be, u32_le};

use crate::error::Result;

/// File name of the report inside the output directory.
pub const REPORT_FILE_NAME: &str = "integrity_report.txt";

/// How much of each file the header checks read.
const HEADER_SAMPLE: usize = 2048;

/// Outcome of checking one carved file.
#[derive(Debug, Default)]
pub struct CheckResult {
    pub valid: bool,
    pub size: u64,
    pub issues: Vec<String>,
    pub info: Vec<(&'static str, String)>,
}

impl CheckResult {
    fn issue(&mut self, message: impl Into<String>) {
        self.issues.push(message.into());
    }

    fn note(&mut self, key: &'static str, value: impl Into<String>) {
        self.info.push((key, value.into()));
    }
}

/// Check one carved file of a known kind.
pub fn check_file(path: &Path, kind: FileKind) -> CheckResult {
    let mut result = CheckResult::default();

    let Ok(metadata) = fs::metadata(path) else {
        result.issue("file does not exist");
        return result;
    };
    result.size = metadata.len();
    if result.size == 0 {
        result.issue("file is empty");
        return result;
    }

    let Ok(data) = read_header_sample(path) else {
        result.issue("error reading file");
        return result;
    };

    match kind {
        FileKind::Dds => check_dds(&data, &mut result),
        FileKind::Xma | FileKind::Wav => check_riff(&data, result.size, &mut result),
        FileKind::Nif => check_gamebryo(&data, &mut result),
        FileKind::ScriptScn => check_script(&data, &mut result),
        FileKind::Bik => check_bik(&data, result.size, &mut result),
        FileKind::Esp => check_plugin(&data, &mut result),
        FileKind::Lip => check_lip(&data, &mut result),
        FileKind::Bsa => check_bsa(&data, result.size, &mut result),
        FileKind::Mp3 => check_mp3(&data, &mut result),
        FileKind::Ogg => check_ogg(&data, &mut result),
        FileKind::Exe => check_pe(&data, &mut result),
        FileKind::ZlibStream | FileKind::GzipStream => {
            // Stream outputs are already inflated; there is no header
            // left to validate.
            result.note("note", "basic validation only");
            result.valid = true;
        }
    }
    result
}

fn read_header_sample(path: &Path) -> std::io::Result<Vec<u8>> {
    use std::io::Read as _;

    let file = fs::File::open(path)?;
    let mut data = Vec::with_capacity(HEADER_SAMPLE);
    file.take(HEADER_SAMPLE as u64).read_to_end(&mut data)?;
    Ok(data)
}

fn check_dds(data: &[u8], result: &mut CheckResult) {
    if data.len() < 128 {
        result.issue("file too small for DDS header");
        return;
    }
    if &data[0..4] != b"DDS " {
        result.issue("invalid DDS magic bytes");
        return;
    }

    let mut header_size = u32_le(data, 4).unwrap_or(0);
    let mut height = u32_le(data, 12).unwrap_or(0);
    let mut width = u32_le(data, 16).unwrap_or(0);
    if header_size != 124 || height == 0 || width == 0 || height > 16_384 || width > 16_384 {
        header_size = u32_be(data, 4).unwrap_or(0);
        height = u32_be(data, 12).unwrap_or(0);
        width = u32_be(data, 16).unwrap_or(0);
    }

    if header_size != 124 {
        result.issue(format!("invalid header size: {header_size} (expected 124)"));
    }
    if height == 0 || width == 0 {
        result.issue(format!("invalid dimensions: {width}x{height}"));
    } else if height > 16_384 || width > 16_384 {
        result.issue(format!("suspicious dimensions: {width}x{height}"));
    } else {
        result.note("width", width.to_string());
        result.note("height", height.to_string());
        result.note("fourcc", String::from_utf8_lossy(&data[84..88]).into_owned());
        result.valid = result.issues.is_empty();
    }
}

fn check_riff(data: &[u8], file_size: u64, result: &mut CheckResult) {
    if data.len() < 12 {
        result.issue("file too small for RIFF header");
        return;
    }
    if &data[0..4] != b"RIFF" {
        result.issue("invalid RIFF magic bytes");
        return;
    }
    let declared = u64::from(u32_le(data, 4).unwrap_or(0));
    result.note("format", String::from_utf8_lossy(&data[8..12]).into_owned());
    result.note("declared_size", declared.to_string());
    if declared == file_size {
        result.valid = true;
    } else {
        result.issue(format!("size mismatch: declared {declared}, actual {file_size}"));
    }
}

fn check_gamebryo(data: &[u8], result: &mut CheckResult) {
    if data.len() < 40 {
        result.issue("file too small for Gamebryo header");
        return;
    }
    if !data.starts_with(b"Gamebryo File Format") && !data.starts_with(b"NetImmerse File Format") {
        result.issue("invalid Gamebryo magic bytes");
        return;
    }
    let line_end = data[..data.len().min(64)]
        .iter()
        .position(|&byte| byte == b'\n' || byte == 0);
    if let Some(end) = line_end {
        result.note("version", String::from_utf8_lossy(&data[..end]).into_owned());
        result.valid = true;
    } else {
        result.issue("could not find version string");
    }
}

fn check_script(data: &[u8], result: &mut CheckResult) {
    let text = String::from_utf8_lossy(data);
    let lower = text.to_ascii_lowercase();

    let has_scriptname = lower.contains("scriptname") || lower.contains("scn ");
    if !has_scriptname {
        result.issue("no ScriptName found");
    }

    let begin_count = lower.matches("\nbegin").count() + usize::from(lower.starts_with("begin"));
    let end_count = lower.matches("\nend").count();
    result.note("begin_blocks", begin_count.to_string());
    result.note("end_blocks", end_count.to_string());
    if begin_count != end_count {
        result.issue(format!("mismatched begin/end: {begin_count} begin, {end_count} end"));
    }

    let printable = data
        .iter()
        .filter(|&&byte| matches!(byte, 0x20..=0x7E | b'\t' | b'\r' | b'\n'))
        .count();
    if !data.is_empty() && (printable as f64) / (data.len() as f64) < 0.9 {
        result.issue("contains non-printable characters");
    }

    result.valid = has_scriptname && result.issues.is_empty();
}

fn check_bik(data: &[u8], file_size: u64, result: &mut CheckResult) {
    if data.len() < 8 {
        result.issue("file too small for BIK header");
        return;
    }
    if &data[0..4] != b"BIKi" {
        result.issue("invalid BIK magic bytes");
        return;
    }
    let declared = u64::from(u32_le(data, 4).unwrap_or(0)) + 8;
    result.note("declared_size", declared.to_string());
    if declared == file_size {
        result.valid = true;
    } else {
        result.issue(format!("size mismatch: declared {declared}, actual {file_size}"));
    }
}

fn check_plugin(data: &[u8], result: &mut CheckResult) {
    if data.len() < 24 {
        result.issue("file too small for plugin header");
        return;
    }
    if &data[0..4] != b"TES4" {
        result.issue("invalid TES4 magic bytes");
        return;
    }
    result.note("type", "TES4 plugin");
    result.valid = true;
}

fn check_lip(data: &[u8], result: &mut CheckResult) {
    if data.len() < 8 {
        result.issue("file too small for LIP header");
        return;
    }
    if &data[0..4] != b"LIPS" {
        result.issue("invalid LIP magic bytes");
        return;
    }
    result.note("type", "lip-sync data");
    result.valid = true;
}

fn check_bsa(data: &[u8], file_size: u64, result: &mut CheckResult) {
    if data.len() < 36 {
        result.issue("file too small for BSA header");
        return;
    }
    if &data[0..4] != b"BSA\x00" {
        result.issue("invalid BSA magic bytes");
        return;
    }
    let version = u32_le(data, 4).unwrap_or(0);
    let folder_offset = u64::from(u32_le(data, 8).unwrap_or(0));
    let folder_count = u32_le(data, 16).unwrap_or(0);
    let file_count = u32_le(data, 20).unwrap_or(0);

    result.note("version", version.to_string());
    result.note("folders", folder_count.to_string());
    result.note("files", file_count.to_string());

    if folder_count > 10_000 {
        result.issue(format!("suspicious folder count: {folder_count}"));
    }
    if file_count > 100_000 {
        result.issue(format!("suspicious file count: {file_count}"));
    }
    if folder_offset < 36 || folder_offset > file_size {
        result.issue(format!("invalid folder offset: {folder_offset}"));
    }
    result.valid = result.issues.is_empty();
}

fn check_mp3(data: &[u8], result: &mut CheckResult) {
    if data.len() < 4 {
        result.issue("file too small for MP3 header");
        return;
    }
    if data[0] != 0xFF || !matches!(data[1], 0xFB | 0xFA | 0xF3 | 0xF2) {
        result.issue("invalid MP3 sync bytes");
        return;
    }
    let version = (data[1] >> 3) & 0x3;
    let layer = (data[1] >> 1) & 0x3;
    result.note(
        "mpeg_version",
        ["MPEG 2.5", "reserved", "MPEG 2", "MPEG 1"][usize::from(version)].to_string(),
    );
    result.note(
        "layer",
        ["reserved", "Layer III", "Layer II", "Layer I"][usize::from(layer)].to_string(),
    );
    result.valid = true;
}

fn check_ogg(data: &[u8], result: &mut CheckResult) {
    if data.len() < 27 {
        result.issue("file too small for OGG header");
        return;
    }
    if &data[0..4] != b"OggS" {
        result.issue("invalid OggS magic bytes");
        return;
    }
    let version = data[4];
    result.note("version", version.to_string());
    if version == 0 {
        result.valid = true;
    } else {
        result.issue(format!("unknown OGG version: {version}"));
    }
}

fn check_pe(data: &[u8], result: &mut CheckResult) {
    if data.len() < 64 {
        result.issue("file too small for PE header");
        return;
    }
    if &data[0..2] != b"MZ" {
        result.issue("invalid MZ magic bytes");
        return;
    }
    let pe_offset = u32_le(data, 0x3C).unwrap_or(u32::MAX) as usize;
    if pe_offset > 1024 || pe_offset + 24 > data.len() {
        result.issue(format!("invalid PE offset: {pe_offset}"));
        result.note("format", "DOS/MZ only");
        return;
    }
    if &data[pe_offset..pe_offset + 4] != b"PE\x00\x00" {
        result.issue("invalid PE signature");
        result.note("format", "DOS executable");
        return;
    }

    let machine = u16_le(data, pe_offset + 4).unwrap_or(0);
    let sections = u16_le(data, pe_offset + 6).unwrap_or(0);
    let machine_name = match machine {
        0x01F2 => "Xbox 360 (PowerPC-BE)".to_string(),
        0x01F0 => "PowerPC".to_string(),
        0x014C => "x86".to_string(),
        0x8664 => "x64".to_string(),
        other => format!("unknown ({other:#06X})"),
    };
    result.note("machine", machine_name);
    result.note("sections", sections.to_string());

    if sections == 0 {
        result.issue("no sections found");
    } else if sections > 96 {
        result.issue(format!("suspicious section count: {sections}"));
    }
    result.valid = result.issues.is_empty();
}

/// Kind of a carved file, recovered from its `<type>_` name prefix.
fn kind_from_filename(name: &str) -> Option<FileKind> {
    FileKind::ALL
        .iter()
        .copied()
        .find(|kind| name.strip_prefix(kind.name()).is_some_and(|rest| rest.starts_with('_')))
}

/// Walk a carve output tree, check every carved file, and write
/// `integrity_report.txt` at its root. Returns the report path.
pub fn generate_report(output_dir: &Path, kinds: Option<&[FileKind]>) -> Result<PathBuf> {
    let mut report = String::new();
    let _ = writeln!(report, "{}", "=".repeat(80));
    let _ = writeln!(report, "File Integrity Report");
    let _ = writeln!(report, "{}", "=".repeat(80));

    let mut checked = 0usize;
    let mut invalid = 0usize;

    for entry in WalkDir::new(output_dir).sort_by_file_name() {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name == REPORT_FILE_NAME {
            continue;
        }
        let Some(kind) = kind_from_filename(&name) else {
            continue;
        };
        if let Some(kinds) = kinds
            && !kinds.contains(&kind)
        {
            continue;
        }

        let result = check_file(entry.path(), kind);
        checked += 1;
        if !result.valid {
            invalid += 1;
        }

        let relative = entry
            .path()
            .strip_prefix(output_dir)
            .unwrap_or_else(|_| entry.path());
        let status = if result.valid { "VALID  " } else { "INVALID" };
        let _ = writeln!(report, "\n{status} - {}", relative.display());
        let _ = writeln!(report, "  type: {kind}");
        let _ = writeln!(report, "  size: {} bytes", result.size);
        for (key, value) in &result.info {
            let _ = writeln!(report, "  {key}: {value}");
        }
        for issue in &result.issues {
            let _ = writeln!(report, "  issue: {issue}");
        }
    }

    let _ = writeln!(report, "\n{}", "=".repeat(80));
    let _ = writeln!(report, "{checked} files checked, {invalid} invalid");
    let _ = writeln!(report, "{}", "=".repeat(80));

    let report_path = output_dir.join(REPORT_FILE_NAME);
    fs::write(&report_path, report)?;
    info!(checked, invalid, report = %report_path.display(), "integrity report written");
    Ok(report_path)
}
