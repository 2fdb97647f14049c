//! Marker ledger: one persisted bit saying the previous run fully succeeded.
//!
//! The sentinel is working state: a run reads it, removes it, and only a run
//! that promotes its cache writes it back. Its absence (first run, or a failed
//! or interrupted run before it) makes the next run rebuild the cache.

use std::{
	fs, io,
	path::{Path, PathBuf},
};

use chrono::Local;
use tracing::{debug, info};

use crate::error::CrawlError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerState {
	NoRecord,
	Recorded,
}

#[derive(Debug, Clone)]
pub struct MarkerLedger {
	path: PathBuf,
}

impl MarkerLedger {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn state(&self) -> MarkerState {
		if self.path.is_file() {
			MarkerState::Recorded
		} else {
			MarkerState::NoRecord
		}
	}

	pub fn has_prior_success(&self) -> bool {
		self.state() == MarkerState::Recorded
	}

	/// Create the sentinel. The timestamp inside is informational only.
	pub fn record_success(&self) -> Result<(), CrawlError> {
		let stamp = format!("{}\n", Local::now().to_rfc3339());
		write_sentinel(&self.path, &stamp)
			.map_err(|source| CrawlError::infrastructure("failed to write marker", &self.path, source))?;
		info!(marker = %self.path.display(), "recorded successful run");
		Ok(())
	}

	/// Remove the sentinel. A missing one is not an error.
	pub fn clear(&self) -> Result<(), CrawlError> {
		match fs::remove_file(&self.path) {
			Ok(()) => {
				debug!(marker = %self.path.display(), "cleared previous run record");
				Ok(())
			}
			Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
			Err(source) => Err(CrawlError::infrastructure(
				"failed to remove marker",
				&self.path,
				source,
			)),
		}
	}
}

fn write_sentinel(path: &Path, contents: &str) -> io::Result<()> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent)?;
	}
	fs::write(path, contents)
}
