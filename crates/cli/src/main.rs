//! docindex: index a file or directory tree into a persistent full-text index.
//!
//! ```text
//! docindex -docs <path> [-index <path>] [-update] [-config <file>] [-stopwords <file>]
//! ```
//!
//! Without `-update` the run replaces whatever the index held; with it,
//! documents are added or replace earlier versions with the same path.

mod commands;
mod parse;

use std::process;
use std::time::Instant;

use clap::error::ErrorKind;
use docindex_core::Result;
use docindex_engine::{check_source, index_path, IndexWriter, IngestOptions};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use commands::build_cli;
use parse::{matches_to_options, normalize_legacy_flags, CliOptions, Verbosity};

fn main() {
    let args = normalize_legacy_flags(std::env::args_os());
    let matches = match build_cli().try_get_matches_from(args) {
        Ok(matches) => matches,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => {
                let _ = e.print();
                process::exit(1);
            }
        },
    };

    let options = match matches_to_options(&matches) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    init_logging(options.verbosity);
    debug!(target: "docindex::cli", ?options, "Parsed arguments");

    if let Err(e) = run(&options) {
        eprintln!("{}", e);
        process::exit(1);
    }
}

fn init_logging(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(options: &CliOptions) -> Result<()> {
    let start = Instant::now();

    // Nothing is created at the index location until the source checks out.
    check_source(&options.docs)?;
    let config = options.load_config()?;

    println!("Indexing to directory '{}'...", options.index.display());

    let ingest = IngestOptions::from_config(&config).exclude(&options.index);
    let mut writer = IndexWriter::open(&options.index, options.mode, config)?;
    let report = index_path(&mut writer, &options.docs, &ingest)?;
    let commit = writer.close()?;

    for skipped in &report.skipped {
        eprintln!("skipped {}: {}", skipped.path.display(), skipped.reason);
    }
    println!(
        "{} documents indexed ({} added, {} replaced), {} skipped",
        report.indexed,
        report.added(),
        report.replaced,
        report.skipped.len()
    );
    println!(
        "Generation {}: {} documents in {} segments",
        commit.generation, commit.live_docs, commit.segments
    );
    println!("{} ms total", start.elapsed().as_millis());
    Ok(())
}
