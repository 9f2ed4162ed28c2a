//! Module reassembly from scattered memory fragments.
//!
//! For each module the reassembler selects every memory range whose
//! virtual addresses intersect the module's span, copies the
//! intersections into a zero-backed image buffer (first range in stream
//! order wins where ranges overlap), validates the PE header, and writes
//! the image out under its recorded name.

use std::fmt;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::error::Result;
use crate::parser::{MemoryRange, Minidump, ModuleRecord};

/// COFF machine field, decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineType {
    I386,
    Amd64,
    PowerPc,
    PowerPcBe,
    Unknown(u16),
}

impl MachineType {
    pub fn from_coff(machine: u16) -> Self {
        match machine {
            0x014C => Self::I386,
            0x8664 => Self::Amd64,
            0x01F0 => Self::PowerPc,
            0x01F2 => Self::PowerPcBe,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for MachineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I386 => f.write_str("i386"),
            Self::Amd64 => f.write_str("AMD64"),
            Self::PowerPc => f.write_str("PowerPC"),
            Self::PowerPcBe => f.write_str("PowerPC-BE"),
            Self::Unknown(machine) => write!(f, "{machine:#06X}"),
        }
    }
}

/// A successfully reconstructed and written module image.
#[derive(Debug)]
pub struct ReconstructedModule {
    /// Sanitized output file name.
    pub file_name: String,
    pub path: PathBuf,
    pub base_va: u64,
    pub size: u32,
    /// Bytes actually recovered from memory ranges.
    pub bytes_filled: u64,
    /// `bytes_filled / size`, in [0, 1].
    pub coverage_ratio: f64,
    pub machine: MachineType,
}

/// Extracts PE modules from minidumps into an output directory.
pub struct ModuleExtractor {
    output_dir: PathBuf,
}

impl ModuleExtractor {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Parse `data` as a minidump and reconstruct every module that
    /// yields a valid PE image. Also writes `module_list.txt` recording
    /// every module in the dump, reconstructed or not.
    pub fn extract(&self, data: &[u8], dump_name: &str) -> Result<Vec<ReconstructedModule>> {
        let minidump = Minidump::parse(data)?;
        fs::create_dir_all(&self.output_dir)?;
        self.write_module_list(dump_name, &minidump.modules)?;

        let mut reconstructed = Vec::new();
        for module in &minidump.modules {
            match self.reassemble(data, module, &minidump.memory_ranges)? {
                Some(image) => {
                    info!(
                        module = %image.file_name,
                        machine = %image.machine,
                        bytes_filled = image.bytes_filled,
                        size = image.size,
                        coverage_percent = image.coverage_ratio * 100.0,
                        "extracted module"
                    );
                    reconstructed.push(image);
                }
                None => debug!(module = %module.name, "module not reconstructable, skipped"),
            }
        }
        info!(count = reconstructed.len(), "module extraction complete");
        Ok(reconstructed)
    }

    /// Reassemble one module. Returns `Ok(None)` when the module has no
    /// memory ranges or fails PE validation; that is a skip, not an
    /// error.
    fn reassemble(
        &self,
        data: &[u8],
        module: &ModuleRecord,
        ranges: &[MemoryRange],
    ) -> Result<Option<ReconstructedModule>> {
        if module.size == 0 {
            return Ok(None);
        }
        let module_start = module.base_va;
        let module_end = module.end_va();

        // Proper interval overlap: the range must share at least one byte
        // with the module span.
        let selected: Vec<&MemoryRange> = ranges
            .iter()
            .filter(|range| range.va < module_end && range.end_va() > module_start)
            .collect();
        if selected.is_empty() {
            return Ok(None);
        }

        let mut image = vec![0u8; module.size as usize];
        let mut filled: Vec<(u64, u64)> = Vec::new();
        let mut bytes_filled = 0u64;

        for range in selected {
            let copy_start = range.va.max(module_start);
            let copy_end = range.end_va().min(module_end);
            let source = range.file_offset + (copy_start - range.va);
            let destination = copy_start - module_start;
            let length = copy_end - copy_start;

            // The payload may be truncated if the dump itself was cut
            // short; copy only what exists.
            let available = (data.len() as u64).saturating_sub(source).min(length);
            if available == 0 {
                continue;
            }

            // First range in stream order wins where ranges overlap.
            for (part_start, part_end) in uncovered((destination, destination + available), &filled) {
                let src = (source + (part_start - destination)) as usize;
                let len = (part_end - part_start) as usize;
                image[part_start as usize..part_end as usize]
                    .copy_from_slice(&data[src..src + len]);
                bytes_filled += part_end - part_start;
                filled.push((part_start, part_end));
            }
            filled.sort_unstable();
        }

        if !validate_pe(&image) {
            return Ok(None);
        }
        let machine = read_machine(&image);

        let file_name = sanitized_file_name(&module.name);
        let path = self.output_dir.join(&file_name);
        fs::write(&path, &image)?;

        Ok(Some(ReconstructedModule {
            file_name,
            path,
            base_va: module.base_va,
            size: module.size,
            bytes_filled,
            coverage_ratio: bytes_filled as f64 / f64::from(module.size),
            machine,
        }))
    }

    /// Text listing of every module in the dump.
    fn write_module_list(&self, dump_name: &str, modules: &[ModuleRecord]) -> Result<()> {
        let mut listing = String::new();
        let _ = writeln!(listing, "Modules found in {dump_name}:");
        let _ = writeln!(listing, "{}\n", "=".repeat(80));
        for (index, module) in modules.iter().enumerate() {
            let _ = writeln!(listing, "{}. {}", index + 1, module.name);
            let _ = writeln!(listing, "   Base Address: {:#018X}", module.base_va);
            let _ = writeln!(
                listing,
                "   Size: {} bytes ({:.2} MB)",
                module.size,
                f64::from(module.size) / 1024.0 / 1024.0
            );
            let _ = writeln!(listing, "   Timestamp: {}\n", module.timestamp);
        }
        fs::write(self.output_dir.join("module_list.txt"), listing)?;
        Ok(())
    }
}

/// Sub-intervals of `interval` not yet covered by `filled` (which must be
/// sorted and disjoint).
fn uncovered(interval: (u64, u64), filled: &[(u64, u64)]) -> Vec<(u64, u64)> {
    let (mut cursor, end) = interval;
    let mut parts = Vec::new();
    for &(covered_start, covered_end) in filled {
        if covered_end <= cursor {
            continue;
        }
        if covered_start >= end {
            break;
        }
        if covered_start > cursor {
            parts.push((cursor, covered_start.min(end)));
        }
        cursor = cursor.max(covered_end);
        if cursor >= end {
            return parts;
        }
    }
    if cursor < end {
        parts.push((cursor, end));
    }
    parts
}

/// MZ at 0, `PE\0\0` at the offset stored at 0x3C.
fn validate_pe(image: &[u8]) -> bool {
    if image.len() < 0x40 || &image[0..2] != b"MZ" {
        return false;
    }
    let pe_offset = u32::from_le_bytes([image[0x3C], image[0x3D], image[0x3E], image[0x3F]]) as usize;
    let Some(signature) = image.get(pe_offset..pe_offset + 4) else {
        return false;
    };
    signature == b"PE\x00\x00"
}

fn read_machine(image: &[u8]) -> MachineType {
    let pe_offset = u32::from_le_bytes([image[0x3C], image[0x3D], image[0x3E], image[0x3F]]) as usize;
    let machine = image
        .get(pe_offset + 4..pe_offset + 6)
        .map_or(0, |bytes| u16::from_le_bytes([bytes[0], bytes[1]]));
    MachineType::from_coff(machine)
}

/// Final path component of the recorded module name, with an executable
/// suffix guaranteed.
fn sanitized_file_name(name: &str) -> String {
    let base = name
        .rsplit(['\\', '/'])
        .next()
        .filter(|component| !component.is_empty())
        .unwrap_or("module");
    let lower = base.to_ascii_lowercase();
    if lower.ends_with(".exe") || lower.ends_with(".dll") || lower.ends_with(".xex") {
        base.to_string()
    } else {
        format!("{base}.dll")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn machine_types_decode_to_symbolic_names() {
        assert_eq!(MachineType::from_coff(0x01F2), MachineType::PowerPcBe);
        assert_eq!(MachineType::from_coff(0x01F2).to_string(), "PowerPC-BE");
        assert_eq!(MachineType::from_coff(0x8664).to_string(), "AMD64");
        assert_eq!(MachineType::from_coff(0xBEEF).to_string(), "0xBEEF");
    }

    #[test]
    fn module_names_are_sanitized() {
        assert_eq!(sanitized_file_name("D:\\games\\Fallout.xex"), "Fallout.xex");
        assert_eq!(sanitized_file_name("/dev/game/xam.dll"), "xam.dll");
        assert_eq!(sanitized_file_name("kernel"), "kernel.dll");
        assert_eq!(sanitized_file_name(""), "module.dll");
    }

    #[test]
    fn uncovered_subtracts_filled_intervals() {
        assert_eq!(uncovered((0, 10), &[]), vec![(0, 10)]);
        assert_eq!(uncovered((0, 10), &[(3, 5)]), vec![(0, 3), (5, 10)]);
        assert_eq!(uncovered((0, 10), &[(0, 10)]), Vec::<(u64, u64)>::new());
        assert_eq!(uncovered((4, 8), &[(0, 5), (7, 12)]), vec![(5, 7)]);
    }

    #[test]
    fn pe_validation_rejects_out_of_bounds_offsets() {
        let mut image = vec![0u8; 0x80];
        image[0..2].copy_from_slice(b"MZ");
        image[0x3C..0x40].copy_from_slice(&0x7Eu32.to_le_bytes());
        assert!(!validate_pe(&image));

        image[0x3C..0x40].copy_from_slice(&0x1000u32.to_le_bytes());
        assert!(!validate_pe(&image));
    }
}
