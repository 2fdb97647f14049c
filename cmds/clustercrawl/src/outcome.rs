//! Run outcome tracking and the end-of-run finalizer.
//!
//! A run is promoted to "fully successful" when every cluster in the cached
//! name/id map has a describe artifact. Workload artifacts do not count: a
//! cluster without an orchestration context is still processed.

use std::collections::BTreeMap;

use tracing::{error, info, warn};

use crate::{
	cache::{ArtifactKind, CacheStore, ResetScope},
	directory,
	error::CrawlError,
	marker::MarkerLedger,
};

/// Per-cluster classification at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
	processed: BTreeMap<String, bool>,
}

impl RunOutcome {
	/// Classify every cluster of the cached map. A missing or unreadable map
	/// yields an empty outcome, which never counts as success.
	pub fn scan(store: &CacheStore) -> Self {
		let entry = store.name_id_map();
		if !store.exists_and_nonempty(&entry) {
			return Self::default();
		}
		let map = match directory::load(store) {
			Ok(map) => map,
			Err(err) => {
				warn!(error = %err, "cannot classify clusters");
				return Self::default();
			}
		};
		let processed = map
			.iter()
			.map(|cluster| {
				let describe = store.cluster(&cluster.name, ArtifactKind::Describe);
				(cluster.name.clone(), store.exists_and_nonempty(&describe))
			})
			.collect();
		Self { processed }
	}

	pub fn all_processed(&self) -> bool {
		!self.processed.is_empty() && self.processed.values().all(|done| *done)
	}

	pub fn unprocessed(&self) -> Vec<String> {
		self.processed
			.iter()
			.filter(|(_, done)| !**done)
			.map(|(name, _)| name.clone())
			.collect()
	}

	pub fn len(&self) -> usize {
		self.processed.len()
	}

	pub fn is_empty(&self) -> bool {
		self.processed.is_empty()
	}
}

/// What the finalizer did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finalization {
	/// Marker recorded and working state removed.
	Promoted,
	/// Everything kept for inspection; no marker written.
	Retained { unprocessed: Vec<String> },
}

/// Promote or retain the run based on what is on disk.
pub fn finalize(store: &CacheStore, ledger: &MarkerLedger) -> Result<Finalization, CrawlError> {
	let outcome = RunOutcome::scan(store);
	if !outcome.all_processed() {
		let unprocessed = outcome.unprocessed();
		if outcome.is_empty() {
			warn!("no clusters resolved, keeping working state");
		} else {
			warn!(clusters = %unprocessed.join(", "), "not every cluster was processed, keeping working state");
		}
		return Ok(Finalization::Retained { unprocessed });
	}

	ledger.record_success()?;
	store.reset(ResetScope::WorkingState)?;
	info!(clusters = outcome.len(), "all clusters processed");
	Ok(Finalization::Promoted)
}

/// Guard that runs [`finalize`] exactly once.
///
/// Call [`complete`](Self::complete) on every normal exit path. If the guard is
/// dropped without it, for example because the crawl future was cancelled by
/// a signal, finalization runs from `Drop`.
#[derive(Debug)]
pub struct Finalizer<'a> {
	store: &'a CacheStore,
	ledger: &'a MarkerLedger,
	done: bool,
}

impl<'a> Finalizer<'a> {
	pub fn new(store: &'a CacheStore, ledger: &'a MarkerLedger) -> Self {
		Self {
			store,
			ledger,
			done: false,
		}
	}

	pub fn complete(mut self) -> Result<Finalization, CrawlError> {
		self.done = true;
		finalize(self.store, self.ledger)
	}
}

impl Drop for Finalizer<'_> {
	fn drop(&mut self) {
		if self.done {
			return;
		}
		if let Err(err) = finalize(self.store, self.ledger) {
			error!(error = %err, "finalization failed");
		}
	}
}
