//! MDMP container parsing.
//!
//! All MDMP fields are little-endian regardless of the dumped machine's
//! architecture. Only two streams matter here: the module list (type 4)
//! and the Memory64 list (type 9); everything else is skipped.

use std::io::{Cursor, Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// ModuleListStream
const STREAM_MODULE_LIST: u32 = 4;
/// Memory64ListStream
const STREAM_MEMORY64_LIST: u32 = 9;

/// On-disk size of one MINIDUMP_MODULE record.
const MODULE_RECORD_LEN: u64 = 108;
/// Fields of the module record we read; the rest is version info and CV
/// data.
const MODULE_FIELDS_LEN: u64 = 24;

const MAX_MODULES: u32 = 4096;
const MAX_RANGES: u64 = 1_000_000;

/// A loaded module as recorded in the module list stream.
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub base_va: u64,
    pub size: u32,
    pub checksum: u32,
    pub timestamp: u32,
    /// Module path as recorded by the dumping machine (often a Windows
    /// or Xbox device path).
    pub name: String,
}

impl ModuleRecord {
    /// End of the module's virtual address span (closed-open).
    pub fn end_va(&self) -> u64 {
        self.base_va + u64::from(self.size)
    }
}

/// One entry of the Memory64 stream, with its payload position resolved.
#[derive(Debug, Clone, Copy)]
pub struct MemoryRange {
    pub va: u64,
    pub size: u64,
    /// Offset of this range's payload in the dump file.
    pub file_offset: u64,
}

impl MemoryRange {
    pub fn end_va(&self) -> u64 {
        self.va + self.size
    }
}

/// Parsed minidump: the streams the reassembler needs.
#[derive(Debug)]
pub struct Minidump {
    pub modules: Vec<ModuleRecord>,
    pub memory_ranges: Vec<MemoryRange>,
}

fn read_exact_at(cursor: &mut Cursor<&[u8]>, what: &'static str, buffer: &mut [u8]) -> Result<()> {
    cursor.read_exact(buffer).map_err(|_| Error::Truncated(what))
}

impl Minidump {
    /// Parse the MDMP header, stream directory, module list, and memory64
    /// list. A dump without one of the two streams parses to empty lists;
    /// a dump with a broken header is an error.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);

        let mut magic = [0u8; 4];
        read_exact_at(&mut cursor, "header", &mut magic)?;
        if &magic != b"MDMP" {
            return Err(Error::InvalidMagic(magic));
        }
        let _version = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| Error::Truncated("header"))?;
        let stream_count = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| Error::Truncated("header"))?;
        let stream_dir_rva = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| Error::Truncated("header"))?;

        let mut module_stream_rva = None;
        let mut memory64_stream_rva = None;

        cursor.seek(SeekFrom::Start(u64::from(stream_dir_rva)))?;
        for _ in 0..stream_count {
            let stream_type = cursor
                .read_u32::<LittleEndian>()
                .map_err(|_| Error::Truncated("stream directory"))?;
            let _data_size = cursor
                .read_u32::<LittleEndian>()
                .map_err(|_| Error::Truncated("stream directory"))?;
            let rva = cursor
                .read_u32::<LittleEndian>()
                .map_err(|_| Error::Truncated("stream directory"))?;

            match stream_type {
                STREAM_MODULE_LIST => module_stream_rva = Some(rva),
                STREAM_MEMORY64_LIST => memory64_stream_rva = Some(rva),
                _ => {}
            }
        }

        let modules = match module_stream_rva {
            Some(rva) => parse_modules(data, rva)?,
            None => {
                warn!("no module list stream in dump");
                Vec::new()
            }
        };
        let memory_ranges = match memory64_stream_rva {
            Some(rva) => parse_memory_ranges(data, rva)?,
            None => {
                warn!("no memory64 stream in dump");
                Vec::new()
            }
        };

        debug!(
            modules = modules.len(),
            ranges = memory_ranges.len(),
            "parsed minidump streams"
        );
        Ok(Self {
            modules,
            memory_ranges,
        })
    }
}

fn parse_modules(data: &[u8], rva: u32) -> Result<Vec<ModuleRecord>> {
    let mut cursor = Cursor::new(data);
    cursor.seek(SeekFrom::Start(u64::from(rva)))?;

    let module_count = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| Error::Truncated("module list"))?;
    if module_count > MAX_MODULES {
        return Err(Error::ImplausibleModuleCount(module_count));
    }

    let mut records = Vec::with_capacity(module_count as usize);
    let mut name_rvas = Vec::with_capacity(module_count as usize);
    for _ in 0..module_count {
        let base_va = cursor
            .read_u64::<LittleEndian>()
            .map_err(|_| Error::Truncated("module record"))?;
        let size = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| Error::Truncated("module record"))?;
        let checksum = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| Error::Truncated("module record"))?;
        let timestamp = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| Error::Truncated("module record"))?;
        let name_rva = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| Error::Truncated("module record"))?;
        cursor.seek(SeekFrom::Current((MODULE_RECORD_LEN - MODULE_FIELDS_LEN) as i64))?;

        records.push(ModuleRecord {
            base_va,
            size,
            checksum,
            timestamp,
            name: String::new(),
        });
        name_rvas.push(name_rva);
    }

    for (record, name_rva) in records.iter_mut().zip(name_rvas) {
        record.name = read_module_name(data, name_rva).unwrap_or_default();
    }
    Ok(records)
}

/// Module names are length-prefixed UTF-16LE at their own RVA.
fn read_module_name(data: &[u8], rva: u32) -> Result<String> {
    let mut cursor = Cursor::new(data);
    cursor.seek(SeekFrom::Start(u64::from(rva)))?;
    let byte_len = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| Error::Truncated("module name"))?;

    let mut units = Vec::with_capacity(byte_len as usize / 2);
    for _ in 0..byte_len / 2 {
        units.push(
            cursor
                .read_u16::<LittleEndian>()
                .map_err(|_| Error::Truncated("module name"))?,
        );
    }
    let name: String = char::decode_utf16(units)
        .map(|unit| unit.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    Ok(name.trim_end_matches('\0').to_string())
}

fn parse_memory_ranges(data: &[u8], rva: u32) -> Result<Vec<MemoryRange>> {
    let mut cursor = Cursor::new(data);
    cursor.seek(SeekFrom::Start(u64::from(rva)))?;

    let range_count = cursor
        .read_u64::<LittleEndian>()
        .map_err(|_| Error::Truncated("memory64 list"))?;
    if range_count > MAX_RANGES {
        return Err(Error::ImplausibleRangeCount(range_count));
    }
    let base_rva = cursor
        .read_u64::<LittleEndian>()
        .map_err(|_| Error::Truncated("memory64 list"))?;

    // Payloads are concatenated after the stream header; the i-th range
    // sits at base_rva plus the sizes of everything before it.
    let mut ranges = Vec::with_capacity(range_count as usize);
    let mut file_offset = base_rva;
    for _ in 0..range_count {
        let va = cursor
            .read_u64::<LittleEndian>()
            .map_err(|_| Error::Truncated("memory64 entry"))?;
        let size = cursor
            .read_u64::<LittleEndian>()
            .map_err(|_| Error::Truncated("memory64 entry"))?;
        ranges.push(MemoryRange {
            va,
            size,
            file_offset,
        });
        file_offset = file_offset
            .checked_add(size)
            .ok_or(Error::Truncated("memory64 entry"))?;
    }
    Ok(ranges)
}
