//! One complete crawl run: rebuild decision, pipeline, finalization.

use std::{future::Future, path::Path};

use chrono::NaiveDate;
use tracing::{error, info};

use crate::{
	cache::{CacheStore, ResetScope},
	config::CrawlConfig,
	diagnostics::Snapshot,
	error::CrawlError,
	exec::CommandRunner,
	marker::MarkerLedger,
	outcome::{Finalization, Finalizer},
	pipeline::{Pipeline, RunContext},
};

/// Everything a caller needs to report on a finished run.
#[derive(Debug)]
pub struct RunReport {
	pub force_rebuild: bool,
	/// The fatal error that aborted the run, if any.
	pub error: Option<CrawlError>,
	/// Captured when the run aborted.
	pub snapshot: Option<Snapshot>,
	/// `None` only if finalization itself failed.
	pub finalization: Option<Finalization>,
}

impl RunReport {
	pub fn exit_code(&self) -> i32 {
		if self.error.is_some() {
			1
		} else {
			0
		}
	}
}

/// Day-scoped cache store and marker ledger for `workdir`.
pub fn open(config: &CrawlConfig, workdir: &Path, today: NaiveDate) -> (CacheStore, MarkerLedger) {
	let (cache_base, marker) = config.paths(workdir);
	(
		CacheStore::for_day(&cache_base, today, config.validation),
		MarkerLedger::new(marker),
	)
}

/// Run a full crawl for `today`, abandoning it once `shutdown` resolves.
///
/// The marker left by the previous run is consumed up front, so a run that
/// does not promote its cache always leaves the next one to rebuild.
/// Finalization always runs, whether the pipeline succeeds, fails, is
/// interrupted, or this future is dropped part way.
pub async fn run_crawl<R, S>(
	config: &CrawlConfig,
	runner: &R,
	workdir: &Path,
	today: NaiveDate,
	shutdown: S,
) -> RunReport
where
	R: CommandRunner,
	S: Future<Output = ()>,
{
	let (store, ledger) = open(config, workdir, today);
	let finalizer = Finalizer::new(&store, &ledger);

	// only a promoted run writes the marker back
	let mut ctx = RunContext::new(!ledger.has_prior_success());
	let result = match ledger.clear() {
		Ok(()) => tokio::select! {
			biased;
			() = shutdown => Err(CrawlError::Interrupted),
			result = crawl(config, runner, &store, &mut ctx) => result,
		},
		Err(err) => Err(err),
	};

	let snapshot = result.as_ref().err().map(|err| {
		error!("{err}");
		let snapshot = Snapshot::capture(workdir, store.dir());
		snapshot.emit();
		snapshot
	});

	let mut error = result.err();
	let finalization = match finalizer.complete() {
		Ok(finalization) => Some(finalization),
		Err(err) => {
			error!("{err}");
			error.get_or_insert(err);
			None
		}
	};

	RunReport {
		force_rebuild: ctx.force_rebuild,
		error,
		snapshot,
		finalization,
	}
}

async fn crawl<R: CommandRunner>(
	config: &CrawlConfig,
	runner: &R,
	store: &CacheStore,
	ctx: &mut RunContext,
) -> Result<(), CrawlError> {
	store.ensure_dir()?;
	if ctx.force_rebuild {
		info!(dir = %store.dir().display(), "no record of a fully successful previous run, rebuilding cache");
		store.reset(ResetScope::All)?;
	}
	Pipeline::new(store, runner, config).crawl(ctx).await?;
	Ok(())
}
