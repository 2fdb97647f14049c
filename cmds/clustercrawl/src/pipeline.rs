//! The crawl pipeline.
//!
//! Stages run in a fixed order and each one finishes for every cluster before
//! the next starts:
//!
//! 1. IP inventory (one call for the whole fleet)
//! 2. name/id resolution ([`crate::directory::resolve`])
//! 3. per-cluster describe
//! 4. per-cluster workload snapshot (pods and ingress)
//!
//! Every artifact is checked against the cache first, so rerunning a
//! partially failed crawl only repeats the missing work.

use std::collections::BTreeMap;

use tracing::{debug, info, instrument, warn};

use crate::{
	cache::{ArtifactKind, CacheEntry, CacheStore},
	config::CrawlConfig,
	context::{Activation, ContextSwitcher},
	directory::{self, NameIdMap},
	error::CrawlError,
	exec::{CommandRunner, Invocation},
};

/// How far a cluster got in this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterProgress {
	Described,
	/// No orchestration context; workload collection was skipped.
	ContextMissing,
	WorkloadCollected,
}

/// Process-scoped state threaded through a run.
#[derive(Debug, Default)]
pub struct RunContext {
	/// Set when the previous run did not fully succeed; the cache is wiped
	/// before the pipeline starts.
	pub force_rebuild: bool,
	progress: BTreeMap<String, ClusterProgress>,
}

impl RunContext {
	pub fn new(force_rebuild: bool) -> Self {
		Self {
			force_rebuild,
			progress: BTreeMap::new(),
		}
	}

	pub fn record(&mut self, cluster: &str, progress: ClusterProgress) {
		self.progress.insert(cluster.to_string(), progress);
	}

	pub fn progress(&self, cluster: &str) -> Option<ClusterProgress> {
		self.progress.get(cluster).copied()
	}

	/// Clusters whose workload collection was skipped for lack of a context.
	pub fn skipped(&self) -> impl Iterator<Item = &str> {
		self.progress
			.iter()
			.filter(|(_, p)| **p == ClusterProgress::ContextMissing)
			.map(|(name, _)| name.as_str())
	}
}

pub struct Pipeline<'a, R> {
	store: &'a CacheStore,
	runner: &'a R,
	config: &'a CrawlConfig,
}

impl<'a, R: CommandRunner> Pipeline<'a, R> {
	pub fn new(store: &'a CacheStore, runner: &'a R, config: &'a CrawlConfig) -> Self {
		Self {
			store,
			runner,
			config,
		}
	}

	/// Run all stages. Returns the resolved map.
	pub async fn crawl(&self, ctx: &mut RunContext) -> Result<NameIdMap, CrawlError> {
		self.ip_inventory().await?;
		let map = directory::resolve(
			self.store,
			self.runner,
			&self.config.control_plane,
			&self.config.tenants,
		)
		.await?;
		self.describe_all(&map, ctx).await?;
		self.collect_workloads(&map, ctx).await?;
		Ok(map)
	}

	#[instrument(skip_all)]
	pub async fn ip_inventory(&self) -> Result<(), CrawlError> {
		let entry = self.store.ip_inventory();
		if self.fetch(&entry, &self.config.control_plane.ip_list()).await? {
			info!("collected IP inventory");
		}
		Ok(())
	}

	#[instrument(skip_all)]
	pub async fn describe_all(
		&self,
		map: &NameIdMap,
		ctx: &mut RunContext,
	) -> Result<(), CrawlError> {
		for cluster in map.iter() {
			let entry = self.store.cluster(&cluster.name, ArtifactKind::Describe);
			let invocation = self.config.control_plane.cluster_describe(&cluster.id);
			if self.fetch(&entry, &invocation).await? {
				info!(cluster = %cluster.name, "described cluster");
			}
			ctx.record(&cluster.name, ClusterProgress::Described);
		}
		Ok(())
	}

	#[instrument(skip_all)]
	pub async fn collect_workloads(
		&self,
		map: &NameIdMap,
		ctx: &mut RunContext,
	) -> Result<(), CrawlError> {
		let switcher = ContextSwitcher::new(self.runner, &self.config.orchestration);
		let orchestration = &self.config.orchestration;

		for cluster in map.iter() {
			let pods = self.store.cluster(&cluster.name, ArtifactKind::Pods);
			let ingress = self.store.cluster(&cluster.name, ArtifactKind::Ingress);
			if self.store.exists_and_nonempty(&pods) && self.store.exists_and_nonempty(&ingress) {
				debug!(cluster = %cluster.name, "workload snapshot cached");
				ctx.record(&cluster.name, ClusterProgress::WorkloadCollected);
				continue;
			}

			if let Activation::Skipped { .. } = switcher.activate(&cluster.name).await? {
				ctx.record(&cluster.name, ClusterProgress::ContextMissing);
				continue;
			}

			self.fetch(&pods, &orchestration.pods()).await?;
			self.fetch(&ingress, &orchestration.ingress()).await?;
			info!(cluster = %cluster.name, "collected workload snapshot");
			ctx.record(&cluster.name, ClusterProgress::WorkloadCollected);
		}

		let skipped: Vec<_> = ctx.skipped().collect();
		if !skipped.is_empty() {
			warn!(clusters = %skipped.join(", "), "workload collection skipped");
		}
		Ok(())
	}

	/// Produce `entry` with `invocation` unless it is cached.
	/// Returns whether a call was made.
	async fn fetch(&self, entry: &CacheEntry, invocation: &Invocation) -> Result<bool, CrawlError> {
		if self.store.exists_and_nonempty(entry) {
			debug!(key = %entry.key, "cached");
			return Ok(false);
		}
		let staged = self.store.stage(entry);
		self.runner.stream_to(invocation, staged.path()).await?;
		staged.commit()?;
		Ok(true)
	}
}
