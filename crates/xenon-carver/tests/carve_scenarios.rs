//! End-to-end carving scenarios over synthetic dumps.

use std::fs;
use std::io::Write as _;
use std::path::PathBuf;

use pretty_assertions::assert_eq;
use xenon_carver::{CarveConfig, Carver, Manifest};
use xenon_formats::FileKind;

fn write_dump(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, bytes).unwrap();
    path
}

fn carve(dump: &[u8], chunk_size: usize) -> (tempfile::TempDir, Manifest) {
    let dir = tempfile::tempdir().unwrap();
    let dump_path = write_dump(&dir, "test.dmp", dump);
    let out_dir = dir.path().join("output");
    let carver = Carver::new(CarveConfig::new(&out_dir).with_chunk_size(chunk_size));
    let manifest = carver.carve_dump(&dump_path, None).unwrap();
    (dir, manifest)
}

/// 128-byte DDS header: 256x256, DXT1, no mip chain.
fn dds_256_dxt1() -> Vec<u8> {
    let mut header = vec![0u8; 128];
    header[0..4].copy_from_slice(b"DDS ");
    header[4..8].copy_from_slice(&124u32.to_le_bytes());
    header[12..16].copy_from_slice(&256u32.to_le_bytes());
    header[16..20].copy_from_slice(&256u32.to_le_bytes());
    header[84..88].copy_from_slice(b"DXT1");
    header
}

/// Minimal 20.2.0.7 Gamebryo stream whose block data is `payload`.
fn nif_with_payload(payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"Gamebryo File Format, Version 20.2.0.7\n");
    data.extend_from_slice(&0x1402_0007u32.to_le_bytes());
    data.push(1); // little-endian
    data.extend_from_slice(&11u32.to_le_bytes()); // user version
    data.extend_from_slice(&1u32.to_le_bytes()); // num blocks
    data.extend_from_slice(&34u32.to_le_bytes()); // BS stream version
    data.extend_from_slice(&[0, 0, 0]); // empty export strings
    data.extend_from_slice(&1u16.to_le_bytes()); // num block types
    data.extend_from_slice(&6u32.to_le_bytes());
    data.extend_from_slice(b"NiNode");
    data.extend_from_slice(&0u16.to_le_bytes()); // block type index
    data.extend_from_slice(&(payload.len() as u32).to_le_bytes()); // block size
    data.extend_from_slice(&0u32.to_le_bytes()); // num strings
    data.extend_from_slice(&0u32.to_le_bytes()); // max string length
    data.extend_from_slice(&0u32.to_le_bytes()); // num groups
    data.extend_from_slice(payload);
    data.extend_from_slice(&0u32.to_le_bytes()); // num roots
    data
}

#[test]
fn s1_dds_at_offset_zero() {
    let mut dump = dds_256_dxt1();
    dump.extend_from_slice(&vec![0x5Au8; 32_768]);
    dump.extend_from_slice(&vec![0u8; 1024]);

    let (_dir, manifest) = carve(&dump, 1024 * 1024);

    assert_eq!(manifest.entries.len(), 1);
    let entry = &manifest.entries[0];
    assert_eq!(entry.file_type, "dds");
    assert_eq!(entry.offset, 0);
    assert_eq!(entry.size_in_dump, 32_896);
    assert_eq!(entry.size_output, 32_896);
}

#[test]
fn s2_riff_xma_declared_size() {
    let mut dump = Vec::new();
    dump.extend_from_slice(b"RIFF");
    dump.extend_from_slice(&2044u32.to_le_bytes());
    dump.extend_from_slice(b"XMA ");
    dump.extend_from_slice(&vec![0x10u8; 2036]);

    let (_dir, manifest) = carve(&dump, 1024 * 1024);

    assert_eq!(manifest.entries.len(), 1);
    let entry = &manifest.entries[0];
    assert_eq!(entry.file_type, "xma");
    assert_eq!(entry.size_in_dump, 2044);
}

#[test]
fn s3_contained_nif_is_dropped() {
    let inner = nif_with_payload(&[0xAB; 64]);
    let mut padded = inner.clone();
    padded.extend_from_slice(&[0x13; 32]);
    let outer = nif_with_payload(&padded);
    let outer_len = outer.len() as u64;

    let mut dump = outer;
    dump.extend_from_slice(&[0u8; 256]);

    let (_dir, manifest) = carve(&dump, 1024 * 1024);

    let nif_entries: Vec<_> = manifest
        .entries
        .iter()
        .filter(|entry| entry.file_type == "nif")
        .collect();
    assert_eq!(nif_entries.len(), 1);
    assert_eq!(nif_entries[0].offset, 0);
    assert_eq!(nif_entries[0].size_in_dump, outer_len);
}

#[test]
fn s5_chunk_size_does_not_change_the_manifest() {
    // Artifacts spread across several 64 KiB chunk boundaries, one of
    // them straddling a boundary.
    let mut dump = vec![0u8; 300 * 1024];
    let dds = dds_256_dxt1();
    let mut dds_file = dds.clone();
    dds_file.extend_from_slice(&vec![0x77u8; 32_768]);
    dump[10_000..10_000 + dds_file.len()].copy_from_slice(&dds_file);

    let mut bik = Vec::new();
    bik.extend_from_slice(b"BIKi");
    bik.extend_from_slice(&500u32.to_le_bytes());
    bik.extend_from_slice(&vec![0x21u8; 500]);
    // Straddles the 128 KiB boundary with 64 KiB chunks.
    let boundary = 2 * 64 * 1024 - 2;
    dump[boundary..boundary + bik.len()].copy_from_slice(&bik);

    let lip_offset = 280 * 1024;
    dump[lip_offset..lip_offset + 4].copy_from_slice(b"LIPS");
    dump[lip_offset + 4..lip_offset + 8].copy_from_slice(&64u32.to_le_bytes());

    let (_dir_small, small_chunks) = carve(&dump, 64 * 1024);
    let (_dir_large, large_chunks) = carve(&dump, 50 * 1024 * 1024);

    assert_eq!(small_chunks.entries, large_chunks.entries);
    assert_eq!(small_chunks.summary, large_chunks.summary);
    assert!(small_chunks.entries.iter().any(|entry| entry.offset == boundary as u64));
}

#[test]
fn s6_magic_at_final_bytes_never_overruns() {
    let mut dump = vec![0u8; 4096];
    let len = dump.len();
    dump[len - 4..].copy_from_slice(b"LIPS");

    let (_dir, manifest) = carve(&dump, 1024);

    for entry in &manifest.entries {
        assert!(entry.offset + entry.size_in_dump <= dump.len() as u64);
    }
}

#[test]
fn manifest_is_sorted_and_boundary_safe() {
    let mut dump = vec![0u8; 64 * 1024];
    let mut bik = Vec::new();
    bik.extend_from_slice(b"BIKi");
    bik.extend_from_slice(&100u32.to_le_bytes());
    bik.extend_from_slice(&vec![0x44u8; 100]);
    dump[40_000..40_000 + bik.len()].copy_from_slice(&bik);
    dump[1000..1000 + 4].copy_from_slice(b"LIPS");
    dump[1004..1008].copy_from_slice(&32u32.to_le_bytes());

    let (_dir, manifest) = carve(&dump, 16 * 1024);

    let offsets: Vec<u64> = manifest.entries.iter().map(|entry| entry.offset).collect();
    let mut sorted = offsets.clone();
    sorted.sort_unstable();
    assert_eq!(offsets, sorted);
    for entry in &manifest.entries {
        assert!(entry.end_offset() <= dump.len() as u64);
    }
}

#[test]
fn zlib_stream_inflates_to_output_file() {
    let payload: Vec<u8> = {
        let mut state = 0x9E37_79B9_7F4A_7C15u64;
        (0..4096)
            .map(|_| {
                state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
                (state >> 56) as u8
            })
            .collect()
    };
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&payload).unwrap();
    let compressed = encoder.finish().unwrap();
    let compressed_len = compressed.len() as u64;

    let mut dump = vec![0u8; 512];
    dump.extend_from_slice(&compressed);
    dump.extend_from_slice(&[0u8; 512]);

    let dir = tempfile::tempdir().unwrap();
    let dump_path = write_dump(&dir, "stream.dmp", &dump);
    let out_dir = dir.path().join("output");
    let carver = Carver::new(CarveConfig::new(&out_dir));
    let manifest = carver
        .carve_dump(&dump_path, Some(&[FileKind::ZlibStream]))
        .unwrap();

    assert_eq!(manifest.entries.len(), 1);
    let entry = &manifest.entries[0];
    assert_eq!(entry.offset, 512);
    assert_eq!(entry.size_in_dump, compressed_len);
    assert_eq!(entry.size_output, 4096);

    let written = fs::read(out_dir.join("stream").join("zlib_stream").join(&entry.filename)).unwrap();
    assert_eq!(written, payload);
}

#[test]
fn filenames_are_deterministic_across_runs() {
    let mut dump = dds_256_dxt1();
    dump.extend_from_slice(&vec![0x5Au8; 32_768]);

    let (_dir_a, first) = carve(&dump, 8 * 1024);
    let (_dir_b, second) = carve(&dump, 8 * 1024);

    let names_a: Vec<&str> = first.entries.iter().map(|entry| entry.filename.as_str()).collect();
    let names_b: Vec<&str> = second.entries.iter().map(|entry| entry.filename.as_str()).collect();
    assert_eq!(names_a, names_b);
}

#[test]
fn type_selection_limits_the_scan() {
    let mut dump = vec![0u8; 8192];
    dump[100..104].copy_from_slice(b"LIPS");
    dump[104..108].copy_from_slice(&64u32.to_le_bytes());
    let mut bik = Vec::new();
    bik.extend_from_slice(b"BIKi");
    bik.extend_from_slice(&64u32.to_le_bytes());
    bik.extend_from_slice(&vec![0x01u8; 64]);
    dump[4000..4000 + bik.len()].copy_from_slice(&bik);

    let dir = tempfile::tempdir().unwrap();
    let dump_path = write_dump(&dir, "select.dmp", &dump);
    let carver = Carver::new(CarveConfig::new(dir.path().join("out")));
    let manifest = carver.carve_dump(&dump_path, Some(&[FileKind::Bik])).unwrap();

    assert_eq!(manifest.entries.len(), 1);
    assert_eq!(manifest.entries[0].file_type, "bik");
}
