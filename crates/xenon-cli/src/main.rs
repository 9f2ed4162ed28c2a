//! `xcarve`: carve files out of Xbox 360 memory dumps.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{CommandFactory, Parser};
use tracing::error;

use xenon_cli::commands::carve::{self, CarveOptions};
use xenon_cli::{EXIT_CANCELLED, init_logging};

#[derive(Parser)]
#[command(
    name = "xcarve",
    about = "Carve files from Xbox 360 memory dumps",
    version,
    long_about = "Scans raw Xbox 360 minidumps of Bethesda game builds for embedded \
assets (textures, audio, models, scripts, archives, compressed streams, loaded \
executables), extracts them into per-type directories, and writes a JSON manifest \
per dump."
)]
struct Cli {
    /// Path(s) to .dmp file(s) to process
    dump_files: Vec<PathBuf>,

    /// Process all .dmp files in the current directory
    #[arg(long)]
    all: bool,

    /// Specific file types to carve (default: all types)
    #[arg(long, num_args = 1.., value_name = "TYPE")]
    types: Vec<String>,

    /// Output directory for carved files
    #[arg(long, default_value = "./output")]
    output: PathBuf,

    /// Chunk size in MiB for scanning
    #[arg(long, default_value_t = 10)]
    chunk_size: usize,

    /// Maximum files to carve per type
    #[arg(long, default_value_t = 10_000)]
    max_files: usize,

    /// Extract loaded modules (EXE/DLL) by reassembling minidump memory
    /// ranges
    #[arg(long)]
    extract_modules: bool,

    /// Run an integrity check on carved files after extraction
    #[arg(long)]
    check_integrity: bool,

    /// Enable verbose logging
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.dump_files.is_empty() && !cli.all {
        let _ = Cli::command().print_help();
        return ExitCode::FAILURE;
    }

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        if let Err(handler_error) = ctrlc::set_handler(move || cancel.store(true, Ordering::Relaxed)) {
            error!(error = %handler_error, "could not install Ctrl-C handler");
        }
    }

    let options = CarveOptions {
        dumps: cli.dump_files,
        all: cli.all,
        types: cli.types,
        output: cli.output,
        chunk_size: cli.chunk_size.max(1),
        max_files: cli.max_files,
        extract_modules: cli.extract_modules,
        check_integrity: cli.check_integrity,
    };

    match carve::run(&options, &cancel) {
        Ok(failures) => {
            if cancel.load(Ordering::Relaxed) {
                ExitCode::from(EXIT_CANCELLED)
            } else if failures > 0 {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(run_error) => {
            error!("{run_error:#}");
            ExitCode::FAILURE
        }
    }
}
