use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing_log::AsTrace;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Logs to stdout at the requested verbosity (`RUST_LOG` directives take precedence) and, when a
/// trace file is given, everything to that file.
pub fn configure_tracing(trace: Option<PathBuf>, verbose: Verbosity<InfoLevel>) -> anyhow::Result<()> {
    let stdout_filter = EnvFilter::builder()
        .with_default_directive(
            verbose
                .log_level_filter()
                .as_trace()
                .into(),
        )
        .from_env_lossy();
    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_filter(stdout_filter);

    let trace_layer = match trace {
        Some(path) => {
            let file = File::create(&path).with_context(|| format!("Unable to create trace log. path: {:?}", path))?;
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .with_filter(LevelFilter::TRACE);
            Some(layer)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(trace_layer)
        .try_init()?;

    Ok(())
}
