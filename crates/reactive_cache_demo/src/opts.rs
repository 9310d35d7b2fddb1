use std::path::PathBuf;

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};

#[derive(Parser)]
#[command(name = "reactive_cache_demo")]
#[command(bin_name = "reactive_cache_demo")]
#[command(version, about, long_about = None)]
pub struct Opts {
    /// Number of concurrent observers of the posts cache
    #[arg(long, default_value_t = 3)]
    pub observers: usize,

    /// Latency of the simulated fetch, in milliseconds
    #[arg(long, default_value_t = 250)]
    pub delay_ms: u64,

    /// Make the first fetch fail
    #[arg(long)]
    pub fail_first: bool,

    /// Number of explicit refreshes after the initial fetch
    #[arg(long, default_value_t = 1)]
    pub refreshes: usize,

    /// Trace log file
    #[arg(long, num_args = 0..=1, default_missing_value = "trace.log")]
    pub trace: Option<PathBuf>,

    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}
