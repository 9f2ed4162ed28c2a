//! # Xenon Carver
//!
//! Signature-driven carving engine for Xbox 360 memory dumps of Bethesda
//! game builds. The engine streams a dump in overlapping chunks, finds
//! every registered signature, asks the matching descriptor for the
//! payload extent, reconciles overlaps, and writes per-type output files
//! plus a JSON manifest sufficient to reproduce coverage analysis.
//!
//! ```no_run
//! use std::path::Path;
//! use xenon_carver::{CarveConfig, Carver};
//!
//! # fn example() -> xenon_carver::Result<()> {
//! let carver = Carver::new(CarveConfig::new("./output"));
//! let manifest = carver.carve_dump(Path::new("Fallout_Debug.xex.dmp"), None)?;
//! println!("carved {} files", manifest.summary.total_files);
//! # Ok(())
//! # }
//! ```

pub mod dump;
pub mod engine;
pub mod integrity;
pub mod manifest;
pub mod scanner;

mod error;

pub use dump::DumpView;
pub use engine::{CarveConfig, Carver};
pub use error::{CarveError, Result};
pub use manifest::{Manifest, ManifestEntry, ManifestSummary};
