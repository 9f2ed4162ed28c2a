//! # Xenon Formats
//!
//! File format signatures and payload size determination for carving
//! Bethesda game assets out of Xbox 360 memory dumps.
//!
//! The crate exposes a closed registry of [`Descriptor`]s. Each descriptor
//! pairs one or more magic byte patterns with a pure size finder that,
//! given the dump and a match offset, decides how many bytes the payload
//! occupies in the dump and how many bytes the extracted file will have
//! (the two differ for compressed streams). A finder that cannot confirm
//! the true end of a payload returns `None`; the carving engine drops the
//! match rather than emit a bogus size.
//!
//! ## Quick start
//!
//! ```
//! use xenon_formats::{FileKind, registry};
//!
//! let dds = registry::descriptor(FileKind::Dds);
//! assert_eq!(dds.extension, "dds");
//! assert!(registry::by_name("dds").is_some());
//! ```

pub mod bytes;
pub mod descriptor;
pub mod finders;
pub mod registry;

pub use descriptor::{Descriptor, Endianness, FileKind, PayloadExtent};
