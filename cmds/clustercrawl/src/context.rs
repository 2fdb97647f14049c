//! Orchestration context switching.
//!
//! Workload queries run against whatever context is active, so each cluster's
//! context must be activated before its pods and ingresses are fetched.

use tracing::{debug, warn};

use crate::{config::OrchestrationConfig, error::CrawlError, exec::CommandRunner};

/// Result of trying to activate a cluster's context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
	/// The context is now active.
	Switched { context: String },
	/// No matching context exists; workload collection is skipped.
	Skipped { context: String },
}

pub struct ContextSwitcher<'a, R> {
	runner: &'a R,
	config: &'a OrchestrationConfig,
}

impl<'a, R: CommandRunner> ContextSwitcher<'a, R> {
	pub fn new(runner: &'a R, config: &'a OrchestrationConfig) -> Self {
		Self { runner, config }
	}

	/// Whether a context named `context` exists.
	///
	/// A failing probe is treated as "absent": missing orchestration access
	/// is a topology fact, not a reason to abort.
	pub async fn probe(&self, context: &str) -> bool {
		match self.runner.capture(&self.config.list_contexts()).await {
			Ok(listing) => listing.lines().any(|line| line.trim() == context),
			Err(err) => {
				warn!(context = %context, error = %err, "could not list contexts");
				false
			}
		}
	}

	/// Activate the context for `cluster`.
	pub async fn activate(&self, cluster: &str) -> Result<Activation, CrawlError> {
		let context = self.config.context_for(cluster);
		if !self.probe(&context).await {
			warn!(cluster = %cluster, context = %context, "no matching context, skipping workload collection");
			return Ok(Activation::Skipped { context });
		}

		self.runner
			.capture(&self.config.use_context(&context))
			.await
			.map_err(|source| CrawlError::ContextActivation {
				cluster: cluster.to_string(),
				context: context.clone(),
				source,
			})?;
		debug!(cluster = %cluster, context = %context, "context activated");
		Ok(Activation::Switched { context })
	}
}
