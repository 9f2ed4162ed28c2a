//! # Xenon Minidump
//!
//! Parser for the MDMP container produced by Xbox 360 crash dumps, plus a
//! reassembler that reconstructs loaded PE modules from the discontiguous
//! memory fragments recorded in the Memory64 stream.
//!
//! Xbox 360 dumps scatter a module's image across many memory ranges; the
//! reassembler gathers every range whose virtual addresses intersect the
//! module's span and stitches them into a single zero-backed image.
//!
//! ```no_run
//! use xenon_minidump::{Minidump, ModuleExtractor};
//!
//! # fn example() -> xenon_minidump::Result<()> {
//! let data = std::fs::read("Fallout_Debug.xex.dmp")?;
//! let minidump = Minidump::parse(&data)?;
//! println!("{} modules, {} memory ranges", minidump.modules.len(), minidump.memory_ranges.len());
//!
//! let extractor = ModuleExtractor::new("./output/modules");
//! let modules = extractor.extract(&data, "Fallout_Debug.xex.dmp")?;
//! # Ok(())
//! # }
//! ```

pub mod parser;
pub mod reassembly;

mod error;

pub use error::{Error, Result};
pub use parser::{MemoryRange, Minidump, ModuleRecord};
pub use reassembly::{MachineType, ModuleExtractor, ReconstructedModule};
