//! The static signature registry.
//!
//! The set of recognized formats is closed; adding a format means adding a
//! descriptor here and a finder module under [`crate::finders`].

use crate::descriptor::{Descriptor, Endianness, FileKind};
use crate::finders;

/// All registered descriptors, in [`FileKind::ALL`] order.
pub static REGISTRY: &[Descriptor] = &[
    Descriptor {
        kind: FileKind::Dds,
        magics: &[b"DDS "],
        extension: "dds",
        min_size: finders::dds::MIN_SIZE,
        max_size: finders::dds::MAX_SIZE,
        endianness: Endianness::Either,
        size_finder: finders::dds::find_size,
        validator: Some(finders::dds::validate),
    },
    Descriptor {
        kind: FileKind::Xma,
        magics: &[b"RIFF"],
        extension: "xma",
        min_size: finders::riff::MIN_SIZE,
        max_size: finders::riff::MAX_SIZE,
        endianness: Endianness::Little,
        size_finder: finders::riff::find_size_xma,
        validator: Some(finders::riff::validate_xma),
    },
    Descriptor {
        kind: FileKind::Wav,
        magics: &[b"RIFF"],
        extension: "wav",
        min_size: finders::riff::MIN_SIZE,
        max_size: finders::riff::MAX_SIZE,
        endianness: Endianness::Little,
        size_finder: finders::riff::find_size_wav,
        validator: Some(finders::riff::validate_wav),
    },
    Descriptor {
        kind: FileKind::Bik,
        magics: &[b"BIKi"],
        extension: "bik",
        min_size: finders::bik::MIN_SIZE,
        max_size: finders::bik::MAX_SIZE,
        endianness: Endianness::Little,
        size_finder: finders::bik::find_size,
        validator: None,
    },
    Descriptor {
        kind: FileKind::Nif,
        magics: &[b"Gamebryo File Format", b"NetImmerse File Format"],
        extension: "nif",
        min_size: finders::gamebryo::MIN_SIZE,
        max_size: finders::gamebryo::MAX_SIZE,
        endianness: Endianness::Little,
        size_finder: finders::gamebryo::find_size,
        validator: None,
    },
    Descriptor {
        kind: FileKind::Bsa,
        magics: &[b"BSA\x00"],
        extension: "bsa",
        min_size: finders::bsa::MIN_SIZE,
        max_size: finders::bsa::MAX_SIZE,
        endianness: Endianness::Little,
        size_finder: finders::bsa::find_size,
        validator: Some(finders::bsa::validate),
    },
    Descriptor {
        kind: FileKind::Esp,
        magics: &[b"TES4"],
        extension: "esp",
        min_size: finders::plugin::MIN_SIZE,
        max_size: finders::plugin::MAX_SIZE,
        endianness: Endianness::Little,
        size_finder: finders::plugin::find_size,
        validator: Some(finders::plugin::validate),
    },
    Descriptor {
        kind: FileKind::Lip,
        magics: &[b"LIPS"],
        extension: "lip",
        min_size: finders::lip::MIN_SIZE,
        max_size: finders::lip::MAX_SIZE,
        endianness: Endianness::Little,
        size_finder: finders::lip::find_size,
        validator: None,
    },
    Descriptor {
        kind: FileKind::Mp3,
        magics: &[
            &[0xFF, 0xFB],
            &[0xFF, 0xFA],
            &[0xFF, 0xF3],
            &[0xFF, 0xF2],
        ],
        extension: "mp3",
        min_size: finders::mp3::MIN_SIZE,
        max_size: finders::mp3::MAX_SIZE,
        endianness: Endianness::Big,
        size_finder: finders::mp3::find_size,
        validator: None,
    },
    Descriptor {
        kind: FileKind::Ogg,
        magics: &[b"OggS"],
        extension: "ogg",
        min_size: finders::ogg::MIN_SIZE,
        max_size: finders::ogg::MAX_SIZE,
        endianness: Endianness::Little,
        size_finder: finders::ogg::find_size,
        validator: Some(finders::ogg::validate),
    },
    Descriptor {
        kind: FileKind::Exe,
        magics: &[b"MZ"],
        extension: "exe",
        min_size: finders::pe::MIN_SIZE,
        max_size: finders::pe::MAX_SIZE,
        endianness: Endianness::Little,
        size_finder: finders::pe::find_size,
        validator: Some(finders::pe::validate),
    },
    Descriptor {
        kind: FileKind::ScriptScn,
        magics: &[b"scn ", b"ScriptName"],
        extension: "txt",
        min_size: finders::script::MIN_SIZE,
        max_size: finders::script::MAX_SIZE,
        endianness: Endianness::Little,
        size_finder: finders::script::find_size,
        validator: None,
    },
    Descriptor {
        kind: FileKind::ZlibStream,
        magics: &[&[0x78, 0x01], &[0x78, 0x9C], &[0x78, 0xDA]],
        extension: "zlib.bin",
        min_size: finders::stream::MIN_SIZE,
        max_size: finders::stream::MAX_SIZE,
        endianness: Endianness::Big,
        size_finder: finders::stream::find_size_zlib,
        validator: None,
    },
    Descriptor {
        kind: FileKind::GzipStream,
        magics: &[&[0x1F, 0x8B, 0x08]],
        extension: "gz.bin",
        min_size: finders::stream::MIN_SIZE,
        max_size: finders::stream::MAX_SIZE,
        endianness: Endianness::Little,
        size_finder: finders::stream::find_size_gzip,
        validator: None,
    },
];

/// Descriptor for a kind. Registry order matches the `FileKind`
/// discriminants, so the lookup is a direct index.
pub fn descriptor(kind: FileKind) -> &'static Descriptor {
    let descriptor = &REGISTRY[kind as usize];
    debug_assert_eq!(descriptor.kind, kind);
    descriptor
}

/// Look up a descriptor by its external name.
pub fn by_name(name: &str) -> Option<&'static Descriptor> {
    FileKind::from_name(name).map(descriptor)
}

/// Length of the longest magic across the whole registry. The carving
/// engine sizes its chunk overlap from this.
pub fn max_magic_len() -> usize {
    REGISTRY
        .iter()
        .map(Descriptor::max_magic_len)
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_every_kind_once() {
        assert_eq!(REGISTRY.len(), FileKind::ALL.len());
        for kind in FileKind::ALL {
            assert_eq!(descriptor(kind).kind, kind);
        }
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(by_name("dds").map(|d| d.kind), Some(FileKind::Dds));
        assert_eq!(by_name("zlib_stream").map(|d| d.kind), Some(FileKind::ZlibStream));
        assert!(by_name("pdf").is_none());
    }

    #[test]
    fn overlap_window_covers_longest_magic() {
        // "NetImmerse File Format" is the longest registered magic.
        assert_eq!(max_magic_len(), 22);
        assert!(max_magic_len() <= 64);
    }

    #[test]
    fn size_bounds_are_ordered() {
        for descriptor in REGISTRY {
            assert!(descriptor.min_size <= descriptor.max_size, "{}", descriptor.kind);
            assert!(!descriptor.magics.is_empty(), "{}", descriptor.kind);
        }
    }
}
