//! ejzip: recursive archive extraction with legacy encoding repair
//!
//! # Architecture
//!
//! The binary is a thin shell around the library:
//! 1. parse and validate CLI arguments into `ExtractOptions`,
//! 2. set up `tracing` diagnostics on stderr,
//! 3. run the `Extractor` over the source with the `chardetng` oracle and the
//!    interactive conflict prompt,
//! 4. print a run summary.
//!
//! Diagnostics default to `warn` (`debug` with `-v`, `error` with `-q`) and
//! can be overridden through `RUST_LOG`.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ejzip::args::Args;
use ejzip::{ChardetOracle, Extractor, InteractivePrompt, RunSummary, format_size};

fn setup_logging(verbose: bool, quiet: u8) {
    let default_level = if verbose {
        "ejzip=debug"
    } else if quiet > 0 {
        "ejzip=error"
    } else {
        "ejzip=warn"
    };

    let filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => EnvFilter::new(default_level),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_summary(summary: &RunSummary) {
    println!(
        "Processed {} archives: {} extracted, {} empty, {} failed",
        summary.archives_found,
        summary.archives_extracted,
        summary.archives_empty,
        summary.archives_failed
    );
    println!(
        "{} files ({}) extracted, {} skipped, {} failed, {} converted to UTF-8",
        summary.files_extracted,
        format_size(summary.bytes),
        summary.files_skipped,
        summary.files_failed,
        summary.files_converted
    );
    if summary.archives_deleted > 0 {
        println!("Deleted {} archives", summary.archives_deleted);
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let options = args.extract_options()?;

    setup_logging(options.verbose, options.quiet);

    let quiet = options.quiet;
    let mut extractor = Extractor::new(options, ChardetOracle, InteractivePrompt::new());
    let summary = extractor
        .run(&args.source)
        .with_context(|| format!("Failed to read source: {}", args.source.display()))?;

    if quiet == 0 {
        print_summary(&summary);
    }
    Ok(())
}
