//! Read-only memory-mapped view of a dump file.
//!
//! One view is opened per dump and shared by every phase: the carving
//! scan, the size finders, the module reassembler, and the coverage gap
//! analysis all read through the same mapping.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapOptions};
use tracing::debug;

use crate::error::{CarveError, Result};

/// Smallest dump worth scanning; anything below cannot hold a payload.
const MIN_DUMP_SIZE: u64 = 16;

/// A dump file mapped read-only for the life of a run.
#[derive(Debug)]
pub struct DumpView {
    mmap: Mmap,
    path: PathBuf,
}

impl DumpView {
    /// Map a dump file read-only.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        if size < MIN_DUMP_SIZE {
            return Err(CarveError::DumpTooSmall {
                path: path.to_path_buf(),
                size,
            });
        }

        // SAFETY: the mapping is read-only and lives as long as the view;
        // dumps under analysis are not concurrently modified.
        #[allow(unsafe_code)]
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        debug!(path = %path.display(), size, "mapped dump");

        Ok(Self {
            mmap,
            path: path.to_path_buf(),
        })
    }

    /// Full dump contents.
    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// Dump length in bytes.
    pub fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Bounds-checked slice of the dump.
    pub fn slice(&self, offset: u64, length: u64) -> Result<&[u8]> {
        let end = offset.checked_add(length).ok_or(CarveError::OutOfBounds {
            offset,
            length,
            size: self.len(),
        })?;
        if end > self.len() {
            return Err(CarveError::OutOfBounds {
                offset,
                length,
                size: self.len(),
            });
        }
        Ok(&self.mmap[offset as usize..end as usize])
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Dump file name without its extension, used as the output subtree
    /// name.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map_or_else(|| "dump".to_string(), |stem| stem.to_string_lossy().into_owned())
    }
}
