//! Signature descriptor model.
//!
//! Descriptors are plain structs with function pointers. Formats are
//! indexed internally by [`FileKind`]; the string names only appear at the
//! external surface (manifest JSON, `--types` arguments).

use std::fmt;

/// Payload extent decided by a size finder.
///
/// `size_in_dump` is what the payload occupies in the dump (possibly
/// compressed); `size_output` is what the extracted file will contain
/// after inflation. They are equal for stored formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadExtent {
    pub size_in_dump: u64,
    pub size_output: u64,
    pub compressed: bool,
}

impl PayloadExtent {
    /// Extent for a format stored verbatim in the dump.
    pub fn stored(size: u64) -> Self {
        Self {
            size_in_dump: size,
            size_output: size,
            compressed: false,
        }
    }
}

/// Byte order of a format's header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
    /// Header fields are probed in one order and retried in the other
    /// (Xbox 360 assets mix console and PC byte order).
    Either,
}

/// The closed set of recognized formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileKind {
    Dds,
    Xma,
    Wav,
    Bik,
    Nif,
    Bsa,
    Esp,
    Lip,
    Mp3,
    Ogg,
    Exe,
    ScriptScn,
    ZlibStream,
    GzipStream,
}

impl FileKind {
    /// Every registered kind, in registry order.
    pub const ALL: [Self; 14] = [
        Self::Dds,
        Self::Xma,
        Self::Wav,
        Self::Bik,
        Self::Nif,
        Self::Bsa,
        Self::Esp,
        Self::Lip,
        Self::Mp3,
        Self::Ogg,
        Self::Exe,
        Self::ScriptScn,
        Self::ZlibStream,
        Self::GzipStream,
    ];

    /// Stable external identifier, used in manifests and `--types`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Dds => "dds",
            Self::Xma => "xma",
            Self::Wav => "wav",
            Self::Bik => "bik",
            Self::Nif => "nif",
            Self::Bsa => "bsa",
            Self::Esp => "esp",
            Self::Lip => "lip",
            Self::Mp3 => "mp3",
            Self::Ogg => "ogg",
            Self::Exe => "exe",
            Self::ScriptScn => "script_scn",
            Self::ZlibStream => "zlib_stream",
            Self::GzipStream => "gzip_stream",
        }
    }

    /// Resolve an external identifier back to a kind.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pure size finder: `(dump, match_offset)` to payload extent, or `None`
/// when the payload end cannot be confirmed.
pub type SizeFinder = fn(&[u8], usize) -> Option<PayloadExtent>;

/// Cheap pre-check run before the size finder to reject false positives.
pub type Validator = fn(&[u8], usize) -> bool;

/// Immutable registry entry for one format.
pub struct Descriptor {
    pub kind: FileKind,
    /// One or more magic byte patterns (some formats have LE and BE
    /// variants, MP3 has several sync words).
    pub magics: &'static [&'static [u8]],
    /// File suffix for extracted output.
    pub extension: &'static str,
    /// Bounds for accepted `size_in_dump`.
    pub min_size: u64,
    pub max_size: u64,
    pub endianness: Endianness,
    pub size_finder: SizeFinder,
    pub validator: Option<Validator>,
}

impl Descriptor {
    /// Length of the longest magic pattern of this descriptor.
    pub fn max_magic_len(&self) -> usize {
        self.magics.iter().map(|magic| magic.len()).max().unwrap_or(0)
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("kind", &self.kind)
            .field("extension", &self.extension)
            .field("min_size", &self.min_size)
            .field("max_size", &self.max_size)
            .field("endianness", &self.endianness)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for kind in FileKind::ALL {
            assert_eq!(FileKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(FileKind::from_name("tga"), None);
    }

    #[test]
    fn stored_extent_has_equal_sizes() {
        let extent = PayloadExtent::stored(512);
        assert_eq!(extent.size_in_dump, 512);
        assert_eq!(extent.size_output, 512);
        assert!(!extent.compressed);
    }
}
