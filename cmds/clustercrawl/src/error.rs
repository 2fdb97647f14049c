//! Error taxonomy for a crawl run.
//!
//! Every variant of [`CrawlError`] is fatal to the run. The single tolerated
//! failure, a missing orchestration context, never becomes an error: it is
//! reported as [`crate::context::Activation::Skipped`] instead.

use std::{io, path::PathBuf, time::Duration};

use thiserror::Error;

use crate::directory::{MapParseError, TableParseError};

/// Failure of a single external CLI invocation.
#[derive(Debug, Error)]
pub enum CallError {
	#[error("failed to start `{command}`: {source}")]
	Spawn {
		command: String,
		#[source]
		source: io::Error,
	},

	#[error("`{command}` exited with {}: {stderr}", exit_label(.code))]
	NonZeroExit {
		command: String,
		code: Option<i32>,
		stderr: String,
	},

	#[error("`{command}` did not finish within {}s", .timeout.as_secs())]
	TimedOut { command: String, timeout: Duration },

	#[error("failed to capture output of `{command}` into {}: {source}", .path.display())]
	Sink {
		command: String,
		path: PathBuf,
		#[source]
		source: io::Error,
	},
}

fn exit_label(code: &Option<i32>) -> String {
	match code {
		Some(code) => format!("code {code}"),
		None => "a signal".to_string(),
	}
}

/// Fatal conditions that abort a crawl run.
#[derive(Debug, Error)]
pub enum CrawlError {
	/// Filesystem failure on the cache directory, an artifact or the marker.
	#[error("{action} {}: {source}", .path.display())]
	Infrastructure {
		action: &'static str,
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error(transparent)]
	Call(#[from] CallError),

	/// A call reported success but left nothing usable behind.
	#[error("{what} is empty or invalid ({})", .path.display())]
	IncompleteResult { what: String, path: PathBuf },

	#[error("cluster listing for tenant `{tenant}` has an unexpected shape: {source}")]
	TableParse {
		tenant: String,
		#[source]
		source: TableParseError,
	},

	#[error("cached name/id map {} is malformed: {source}", .path.display())]
	MapParse {
		path: PathBuf,
		#[source]
		source: MapParseError,
	},

	/// The context exists but switching to it failed; later workload
	/// queries would target the wrong cluster.
	#[error("failed to activate context `{context}` for cluster `{cluster}`: {source}")]
	ContextActivation {
		cluster: String,
		context: String,
		#[source]
		source: CallError,
	},

	#[error("crawl interrupted by signal")]
	Interrupted,
}

impl CrawlError {
	pub(crate) fn infrastructure(
		action: &'static str,
		path: impl Into<PathBuf>,
		source: io::Error,
	) -> Self {
		Self::Infrastructure {
			action,
			path: path.into(),
			source,
		}
	}
}
