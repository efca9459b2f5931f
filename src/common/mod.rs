//! Common functionality.

use bytesize::ByteSize;
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};

pub mod io;

/// Commonly used command line arguments.
#[derive(Parser, Debug)]
pub struct Args {
    /// Verbosity of the program
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            verbose: Verbosity::new(0, 0),
        }
    }
}

/// Helper to print the current memory resident set size via `tracing`.
pub fn trace_rss_now() {
    match procfs::process::Process::myself().and_then(|me| me.stat()) {
        Ok(stat) => tracing::debug!(
            "RSS now: {}",
            ByteSize::b(stat.rss * procfs::page_size())
        ),
        Err(e) => tracing::debug!("could not determine RSS: {}", e),
    }
}

/// Split a multi-valued table cell on `|` or `,`, trimming and dropping
/// empty values.
pub fn split_multi(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(|c| c == '|' || c == ',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
