//! Cluster directory: the authoritative name → id mapping for a run.

use std::fmt::Write as _;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::{
	cache::CacheStore,
	config::ControlPlaneConfig,
	error::CrawlError,
	exec::CommandRunner,
};

/// A cluster known for this run. `id` may change between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
	pub name: String,
	pub id: String,
}

impl Cluster {
	pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			id: id.into(),
		}
	}
}

/// Column layout of the control-plane cluster listing.
///
/// Rows are split on whitespace. The first `header_rows` lines are skipped and
/// the identifier and display name are read from fixed, zero-based columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableLayout {
	pub header_rows: usize,
	pub id_column: usize,
	pub name_column: usize,
}

impl Default for TableLayout {
	/// `UID  TENANT  PROJECT  NAME  ...`
	fn default() -> Self {
		Self {
			header_rows: 1,
			id_column: 0,
			name_column: 3,
		}
	}
}

impl TableLayout {
	pub fn validate(&self) -> Result<(), TableParseError> {
		if self.id_column == self.name_column {
			return Err(TableParseError::OverlappingColumns(self.id_column));
		}
		Ok(())
	}

	fn min_columns(&self) -> usize {
		self.id_column.max(self.name_column) + 1
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableParseError {
	#[error("line {line}: expected at least {expected} columns, found {found}")]
	TooFewColumns {
		line: usize,
		expected: usize,
		found: usize,
	},

	#[error("id and name are both read from column {0}")]
	OverlappingColumns(usize),

	/// Names become file names in the cache directory.
	#[error("line {line}: `{name}` cannot be used as a cluster name")]
	InvalidName { line: usize, name: String },
}

fn is_safe_name(name: &str) -> bool {
	name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// Parse a tabular cluster listing.
pub fn parse_cluster_table(
	output: &str,
	layout: &TableLayout,
) -> Result<Vec<Cluster>, TableParseError> {
	layout.validate()?;
	let expected = layout.min_columns();
	let mut clusters = Vec::new();
	for (index, line) in output.lines().enumerate().skip(layout.header_rows) {
		if line.trim().is_empty() {
			continue;
		}
		let columns: Vec<&str> = line.split_whitespace().collect();
		if columns.len() < expected {
			return Err(TableParseError::TooFewColumns {
				line: index + 1,
				expected,
				found: columns.len(),
			});
		}
		let name = columns[layout.name_column];
		if !is_safe_name(name) {
			return Err(TableParseError::InvalidName {
				line: index + 1,
				name: name.to_string(),
			});
		}
		clusters.push(Cluster::new(name, columns[layout.id_column]));
	}
	Ok(clusters)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapParseError {
	#[error("line {0}: expected `name;id`")]
	MissingSeparator(usize),

	#[error("line {0}: name and id must not be empty")]
	EmptyField(usize),
}

/// Ordered name → id mapping, unique by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameIdMap {
	clusters: Vec<Cluster>,
}

impl NameIdMap {
	pub fn new() -> Self {
		Self::default()
	}

	/// Parse the `name;id` line format of `name_id.map`.
	pub fn parse(text: &str) -> Result<Self, MapParseError> {
		let mut map = Self::new();
		for (index, line) in text.lines().enumerate() {
			let line = line.trim();
			if line.is_empty() {
				continue;
			}
			let (name, id) = line
				.split_once(';')
				.ok_or(MapParseError::MissingSeparator(index + 1))?;
			let (name, id) = (name.trim(), id.trim());
			if name.is_empty() || id.is_empty() {
				return Err(MapParseError::EmptyField(index + 1));
			}
			map.insert(Cluster::new(name, id));
		}
		Ok(map)
	}

	pub fn render(&self) -> String {
		let mut out = String::new();
		for cluster in &self.clusters {
			let _ = writeln!(out, "{};{}", cluster.name, cluster.id);
		}
		out
	}

	/// Add a cluster. A name seen before keeps its first id.
	pub fn insert(&mut self, cluster: Cluster) {
		match self.get(&cluster.name) {
			Some(existing) if existing.id != cluster.id => {
				warn!(
					cluster = %cluster.name,
					kept = %existing.id,
					ignored = %cluster.id,
					"duplicate cluster name with a different id"
				);
			}
			Some(_) => {}
			None => self.clusters.push(cluster),
		}
	}

	pub fn get(&self, name: &str) -> Option<&Cluster> {
		self.clusters.iter().find(|c| c.name == name)
	}

	pub fn iter(&self) -> impl Iterator<Item = &Cluster> {
		self.clusters.iter()
	}

	pub fn len(&self) -> usize {
		self.clusters.len()
	}

	pub fn is_empty(&self) -> bool {
		self.clusters.is_empty()
	}
}

/// Read the cached map, or build it by listing every tenant.
///
/// Fails if any listing call fails or prints nothing, or if the accumulated
/// map is empty.
#[instrument(skip_all)]
pub async fn resolve<R: CommandRunner>(
	store: &CacheStore,
	runner: &R,
	control_plane: &ControlPlaneConfig,
	tenants: &[String],
) -> Result<NameIdMap, CrawlError> {
	let entry = store.name_id_map();
	if store.exists_and_nonempty(&entry) {
		info!("using cached name/id map");
		return load(store);
	}

	let mut map = NameIdMap::new();
	for tenant in tenants {
		let listing = runner.capture(&control_plane.cluster_list(tenant)).await?;
		// a header with no rows is a tenant without clusters; no output at all
		// is a failed listing
		if listing.trim().is_empty() {
			return Err(CrawlError::IncompleteResult {
				what: format!("cluster listing for tenant `{tenant}`"),
				path: entry.path,
			});
		}
		let clusters = parse_cluster_table(&listing, &control_plane.table).map_err(|source| {
			CrawlError::TableParse {
				tenant: tenant.clone(),
				source,
			}
		})?;
		debug!(tenant = %tenant, count = clusters.len(), "listed clusters");
		for cluster in clusters {
			map.insert(cluster);
		}
	}

	if map.is_empty() {
		return Err(CrawlError::IncompleteResult {
			what: entry.describe(),
			path: entry.path,
		});
	}

	store.write_bytes(&entry, map.render().as_bytes())?;
	info!(clusters = map.len(), "resolved cluster names");
	Ok(map)
}

/// Load the cached map.
pub fn load(store: &CacheStore) -> Result<NameIdMap, CrawlError> {
	let entry = store.name_id_map();
	let text = store.read_to_string(&entry)?;
	NameIdMap::parse(&text).map_err(|source| CrawlError::MapParse {
		path: entry.path,
		source,
	})
}
