//! Argument normalization and ArgMatches → CliOptions conversion.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::ArgMatches;
use docindex_core::{IndexConfig, Result};
use docindex_engine::OpenMode;

/// Flags also accepted with a single leading dash.
const LEGACY_FLAGS: &[&str] = &["index", "docs", "update", "config", "stopwords"];

/// Log verbosity selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub fn filter(self) -> &'static str {
        match self {
            Verbosity::Quiet => "warn",
            Verbosity::Normal => "info",
            Verbosity::Verbose => "debug",
        }
    }
}

/// Everything one indexing run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOptions {
    pub index: PathBuf,
    pub docs: PathBuf,
    pub mode: OpenMode,
    pub config: Option<PathBuf>,
    pub stop_words: Option<PathBuf>,
    pub verbosity: Verbosity,
}

impl CliOptions {
    /// Load the configuration file (or defaults) and apply the
    /// `--stopwords` override.
    pub fn load_config(&self) -> Result<IndexConfig> {
        let mut config = match &self.config {
            Some(path) => IndexConfig::from_file(path)?,
            None => IndexConfig::default(),
        };
        if let Some(path) = &self.stop_words {
            config.tokenizer.stop_words_file = Some(path.clone());
        }
        Ok(config)
    }
}

/// Rewrite `-index`, `-docs=x`, ... to their double-dash forms.
///
/// Short flags (`-v`, `-q`) and anything unrecognized pass through
/// unchanged so clap can report them.
pub fn normalize_legacy_flags<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let legacy = arg
                .to_str()
                .and_then(|s| s.strip_prefix('-'))
                .filter(|rest| !rest.starts_with('-'))
                .filter(|rest| {
                    let name = rest.split('=').next().unwrap_or_default();
                    LEGACY_FLAGS.contains(&name)
                })
                .map(|rest| OsString::from(format!("--{}", rest)));
            legacy.unwrap_or(arg)
        })
        .collect()
}

/// Convert parsed matches into options.
pub fn matches_to_options(matches: &ArgMatches) -> std::result::Result<CliOptions, String> {
    let docs = matches
        .get_one::<PathBuf>("docs")
        .cloned()
        .ok_or_else(|| "Usage: docindex -docs <path> [-index <path>] [-update]".to_string())?;
    let index = matches
        .get_one::<PathBuf>("index")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("index"));

    let mode = if matches.get_flag("update") {
        OpenMode::Update
    } else {
        OpenMode::Create
    };
    let verbosity = if matches.get_flag("verbose") {
        Verbosity::Verbose
    } else if matches.get_flag("quiet") {
        Verbosity::Quiet
    } else {
        Verbosity::Normal
    };

    Ok(CliOptions {
        index,
        docs,
        mode,
        config: matches.get_one::<PathBuf>("config").cloned(),
        stop_words: matches.get_one::<PathBuf>("stopwords").cloned(),
        verbosity,
    })
}
