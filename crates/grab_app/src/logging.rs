//! Logger setup for the `instagrab` binary.

use std::path::PathBuf;

use grab_logging::LogDestination;
use log::LevelFilter;

/// Picks where log lines go: the terminal always, plus a file when asked.
pub fn destination(log_file: Option<PathBuf>) -> LogDestination {
    match log_file {
        Some(path) => LogDestination::Both(path),
        None => LogDestination::Terminal,
    }
}

pub fn level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    }
}

pub fn initialize(log_file: Option<PathBuf>, verbose: bool) {
    grab_logging::initialize(destination(log_file), level(verbose));
}
