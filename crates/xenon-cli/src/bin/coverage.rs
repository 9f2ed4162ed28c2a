//! `xcarve-coverage`: coverage and gap analysis for one dump.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use tracing::error;

use xenon_cli::commands::coverage::{self, CoverageOptions};
use xenon_cli::{EXIT_CANCELLED, init_logging};

#[derive(Parser)]
#[command(
    name = "xcarve-coverage",
    about = "Analyze how much of a memory dump is identifiable as known file types",
    version
)]
struct Cli {
    /// Path to the .dmp file to analyze
    dump_file: PathBuf,

    /// Output directory for reports
    #[arg(long, short, default_value = "./coverage_analysis")]
    output: PathBuf,

    /// Specific file types to search for (default: all)
    #[arg(long, num_args = 1.., value_name = "TYPE")]
    types: Vec<String>,

    /// Enable verbose logging
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        if let Err(handler_error) = ctrlc::set_handler(move || cancel.store(true, Ordering::Relaxed)) {
            error!(error = %handler_error, "could not install Ctrl-C handler");
        }
    }

    let options = CoverageOptions {
        dump: cli.dump_file,
        output: cli.output,
        types: cli.types,
    };

    match coverage::run(&options, &cancel) {
        Ok((text_path, json_path)) => {
            if cancel.load(Ordering::Relaxed) {
                return ExitCode::from(EXIT_CANCELLED);
            }
            println!("reports saved to:");
            println!("  text: {}", text_path.display());
            println!("  json: {}", json_path.display());
            ExitCode::SUCCESS
        }
        Err(run_error) => {
            error!("{run_error:#}");
            ExitCode::FAILURE
        }
    }
}
