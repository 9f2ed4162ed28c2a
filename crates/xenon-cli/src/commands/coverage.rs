//! The coverage command: carve into a scratch directory, then analyze.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Context;
use tracing::info;
use xenon_carver::engine::resolve_kinds;
use xenon_carver::{CarveConfig, Carver, DumpView};
use xenon_formats::FileKind;

/// The analyzer scans with larger chunks and a higher per-type cap than
/// interactive carve runs.
const ANALYZER_CHUNK_SIZE: usize = 50 * 1024 * 1024;
const ANALYZER_MAX_FILES: usize = 50_000;

pub struct CoverageOptions {
    pub dump: PathBuf,
    pub output: PathBuf,
    pub types: Vec<String>,
}

/// Analyze one dump: run the carver against a cleared scratch directory,
/// merge the resulting manifest, classify the gaps, and save the text +
/// JSON reports. Returns both report paths.
pub fn run(options: &CoverageOptions, cancel: &Arc<AtomicBool>) -> anyhow::Result<(PathBuf, PathBuf)> {
    let view = DumpView::open(&options.dump)?;
    let stem = view.stem();
    info!(dump = %options.dump.display(), size = view.len(), "analyzing coverage");

    let kinds: Option<Vec<FileKind>> = if options.types.is_empty() {
        None
    } else {
        Some(resolve_kinds(&options.types)?)
    };

    // Scratch carve tree, cleared up front so stale files from an earlier
    // run cannot skew the statistics.
    let scratch = options.output.join(&stem).join("carved");
    if scratch.exists() {
        fs::remove_dir_all(&scratch)
            .with_context(|| format!("cannot clear scratch directory {}", scratch.display()))?;
    }
    fs::create_dir_all(&scratch)?;

    let config = CarveConfig::new(&scratch)
        .with_chunk_size(ANALYZER_CHUNK_SIZE)
        .with_max_files_per_type(ANALYZER_MAX_FILES);
    let carver = Carver::new(config).with_cancel_flag(Arc::clone(cancel));
    let manifest = carver.carve_dump(&options.dump, kinds.as_deref())?;

    let dump_name = options
        .dump
        .file_name()
        .map_or_else(|| stem.clone(), |name| name.to_string_lossy().into_owned());
    let report = xenon_coverage::analyze(&dump_name, view.bytes(), &manifest);

    println!("\n{}", report.render_text());

    let report_dir = options.output.join(&stem);
    let (text_path, json_path) = report.save(&report_dir)?;
    Ok((text_path, json_path))
}
