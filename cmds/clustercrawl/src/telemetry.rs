//! Logging setup.

use std::io::IsTerminal;

use anyhow::{Context as _, Result};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Pick the log filter.
///
/// Priority for log level:
/// 1. `--debug` CLI flag (debug)
/// 2. `RUST_LOG` environment variable
/// 3. Default: info
fn filter(verbose: bool) -> EnvFilter {
	if verbose {
		return EnvFilter::new(Level::DEBUG.as_str());
	}
	EnvFilter::builder()
		.with_default_directive(Level::INFO.into())
		.from_env_lossy()
}

/// Install the global subscriber.
///
/// Log lines go to stdout as plain text with their level label, so the run
/// log and the diagnostic snapshot read as one stream.
pub fn init(verbose: bool) -> Result<()> {
	let fmt_layer = tracing_subscriber::fmt::layer()
		.with_writer(std::io::stdout)
		.with_ansi(std::io::stdout().is_terminal())
		.with_target(false)
		.without_time();

	tracing_subscriber::registry()
		.with(filter(verbose))
		.with(fmt_layer)
		.try_init()
		.context("failed to install log subscriber")
}
