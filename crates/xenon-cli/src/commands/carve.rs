//! The carve command: batch processing of one or more dumps.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, bail};
use tracing::{error, info, warn};
use xenon_carver::engine::resolve_kinds;
use xenon_carver::{CarveConfig, Carver, DumpView, Manifest, integrity};
use xenon_formats::FileKind;
use xenon_minidump::ModuleExtractor;

use crate::output::{self, OutputStyle};

/// Options for a carve run, mirrored from the CLI surface.
pub struct CarveOptions {
    pub dumps: Vec<PathBuf>,
    pub all: bool,
    pub types: Vec<String>,
    pub output: PathBuf,
    /// Chunk size in MiB.
    pub chunk_size: usize,
    pub max_files: usize,
    pub extract_modules: bool,
    pub check_integrity: bool,
}

/// Every `*.dmp` in `directory`, sorted by name.
pub fn find_dump_files(directory: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dumps: Vec<PathBuf> = fs::read_dir(directory)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file() && path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("dmp"))
        })
        .collect();
    dumps.sort();
    Ok(dumps)
}

/// Run a full carve batch. Returns the number of dumps that failed.
pub fn run(options: &CarveOptions, cancel: &Arc<AtomicBool>) -> anyhow::Result<usize> {
    let style = OutputStyle::new();

    let dumps = if options.all {
        let found = find_dump_files(Path::new("."))?;
        if found.is_empty() {
            bail!("no .dmp files found in current directory");
        }
        info!("found {} dump file(s) to process", found.len());
        found
    } else {
        options.dumps.clone()
    };

    for dump in &dumps {
        if !dump.exists() {
            bail!("dump file not found: {}", dump.display());
        }
    }

    let kinds: Option<Vec<FileKind>> = if options.types.is_empty() {
        None
    } else {
        Some(resolve_kinds(&options.types)?)
    };

    fs::create_dir_all(&options.output)
        .with_context(|| format!("cannot create output directory {}", options.output.display()))?;

    let config = CarveConfig::new(&options.output)
        .with_chunk_size(options.chunk_size * 1024 * 1024)
        .with_max_files_per_type(options.max_files);
    let carver = Carver::new(config).with_cancel_flag(Arc::clone(cancel));

    // Module extraction pass first, mirroring the carve pass's per-dump
    // failure isolation.
    if options.extract_modules {
        info!("extracting modules from minidumps");
        for dump in &dumps {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            if let Err(extract_error) = extract_modules(dump, &options.output) {
                error!(dump = %dump.display(), error = %extract_error, "module extraction failed");
            }
        }
    }

    let mut manifests: Vec<Manifest> = Vec::new();
    let mut failures = 0usize;
    for (index, dump) in dumps.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            warn!("cancelled before dump {}/{}", index + 1, dumps.len());
            break;
        }
        info!("processing dump {}/{}", index + 1, dumps.len());
        match carver.carve_dump(dump, kinds.as_deref()) {
            Ok(manifest) => manifests.push(manifest),
            Err(carve_error) => {
                error!(dump = %dump.display(), error = %carve_error, "carve failed");
                failures += 1;
            }
        }
    }

    let total_files: u64 = manifests.iter().map(|manifest| manifest.summary.total_files).sum();
    println!("\n{}", output::format_header("Carving complete", &style));
    println!("{}", output::format_success(&format!("total files carved: {total_files}"), &style));
    if total_files > 0 {
        println!("{}", output::summary_table(&manifests));
    }

    if options.check_integrity && total_files > 0 && !cancel.load(Ordering::Relaxed) {
        info!("running integrity check");
        match integrity::generate_report(&options.output, kinds.as_deref()) {
            Ok(report_path) => {
                println!("integrity report saved to: {}", report_path.display());
            }
            Err(integrity_error) => {
                error!(error = %integrity_error, "integrity report failed");
            }
        }
    }

    Ok(failures)
}

/// Reassemble modules of one dump into `<output>/<stem>/modules/`.
fn extract_modules(dump: &Path, output: &Path) -> anyhow::Result<()> {
    let view = DumpView::open(dump)?;
    let stem = view.stem();
    let module_dir = output.join(&stem).join("modules");
    let extractor = ModuleExtractor::new(module_dir);

    let dump_name = dump
        .file_name()
        .map_or_else(|| stem.clone(), |name| name.to_string_lossy().into_owned());
    let modules = extractor.extract(view.bytes(), &dump_name)?;
    info!(dump = %dump_name, modules = modules.len(), "modules extracted");
    Ok(())
}
