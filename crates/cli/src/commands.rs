//! Clap command definition.
//!
//! Flags are declared with long names only; the single-dash spellings
//! (`-index`, `-docs`, ...) are rewritten to these by
//! `parse::normalize_legacy_flags` before clap sees them.

use std::path::PathBuf;

use clap::{value_parser, Arg, ArgAction, Command};

/// Build the `docindex` command.
pub fn build_cli() -> Command {
    Command::new("docindex")
        .version(clap::crate_version!())
        .about("Index a tree of text documents into a persistent full-text index")
        .arg(
            Arg::new("index")
                .long("index")
                .value_name("PATH")
                .help("Index location (default: index)")
                .default_value("index")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("docs")
                .long("docs")
                .value_name("PATH")
                .help("File or directory of documents to index")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("update")
                .long("update")
                .help("Add to the existing index instead of replacing it")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("TOML configuration file")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("stopwords")
                .long("stopwords")
                .value_name("FILE")
                .help("Stop-word list, one word per line (used when apply_stop_words = true)")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log per-document progress")
                .action(ArgAction::SetTrue)
                .conflicts_with("quiet"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only log warnings and errors")
                .action(ArgAction::SetTrue),
        )
}
