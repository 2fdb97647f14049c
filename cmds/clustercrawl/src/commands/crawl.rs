//! Crawl command handler.

use std::{future::pending, path::Path, process::ExitCode};

use anyhow::{Context, Result};
use chrono::Local;
use clap::Args;
use tracing::{info, instrument, warn};

use crate::{
	config::CrawlConfig,
	exec::ProcessRunner,
	outcome::Finalization,
	run::{run_crawl, RunReport},
};

#[derive(Args, Debug, Default)]
pub struct CrawlArgs {
	/// Per-call timeout in seconds, overriding `callTimeoutSecs` (0 disables)
	#[arg(long, value_name = "SECS")]
	pub timeout: Option<u64>,
}

/// Run the crawl command.
pub fn run(args: CrawlArgs, mut config: CrawlConfig, workdir: &Path) -> Result<ExitCode> {
	if let Some(secs) = args.timeout {
		config.call_timeout_secs = secs;
	}

	// Create a tokio runtime for async operations
	let runtime = tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()
		.context("creating tokio runtime")?;

	let report = runtime.block_on(run_async(&config, workdir));
	log_report(&report);
	Ok(ExitCode::from(report.exit_code() as u8))
}

#[instrument(skip_all, fields(workdir = %workdir.display()))]
async fn run_async(config: &CrawlConfig, workdir: &Path) -> RunReport {
	let runner = ProcessRunner::new(config.call_timeout());
	let today = Local::now().date_naive();
	run_crawl(config, &runner, workdir, today, interrupted()).await
}

/// Resolves on Ctrl-C or SIGTERM. A signal that cannot be listened for is
/// logged and never fires.
async fn interrupted() {
	let ctrl_c = async {
		if let Err(err) = tokio::signal::ctrl_c().await {
			warn!("cannot listen for interrupts: {err}");
			pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		use tokio::signal::unix::{signal, SignalKind};

		match signal(SignalKind::terminate()) {
			Ok(mut sigterm) => {
				sigterm.recv().await;
			}
			Err(err) => {
				warn!("cannot listen for SIGTERM: {err}");
				pending::<()>().await;
			}
		}
	};
	#[cfg(not(unix))]
	let terminate = pending::<()>();

	tokio::select! {
		() = ctrl_c => info!("received SIGINT"),
		() = terminate => info!("received SIGTERM"),
	}
}

fn log_report(report: &RunReport) {
	match &report.finalization {
		Some(Finalization::Promoted) => info!("run complete, cache promoted"),
		Some(Finalization::Retained { unprocessed }) if unprocessed.is_empty() => {
			info!("run incomplete, cache retained")
		}
		Some(Finalization::Retained { unprocessed }) => info!(
			"run incomplete, cache retained; unprocessed: {}",
			unprocessed.join(", ")
		),
		None => {}
	}
}
