//! Day-scoped artifact cache.
//!
//! All artifacts of one calendar day live in `info_cache_<YYYYMMDD>`. An
//! artifact counts as present only if its file is non-empty (and, under
//! [`Validation::Structural`], parses). Present artifacts are never
//! rewritten within a run; that is what makes a crawl resumable.

use std::{
	fs::{self, File},
	io::{self, BufReader},
	path::{Path, PathBuf},
};

use chrono::NaiveDate;
use serde::de::IgnoredAny;
use tracing::{debug, warn};

use crate::{config::Validation, directory::NameIdMap, error::CrawlError};

pub const IP_INVENTORY_FILE: &str = "cluster_ips.json";
pub const NAME_ID_MAP_FILE: &str = "name_id.map";

const STAGING_SUFFIX: &str = ".partial";

/// What an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
	IpInventory,
	NameIdMap,
	Describe,
	Pods,
	Ingress,
}

impl ArtifactKind {
	pub const PER_CLUSTER: [ArtifactKind; 3] = [Self::Describe, Self::Pods, Self::Ingress];

	/// Working state is dropped once a run fully succeeds.
	pub fn is_working_state(self) -> bool {
		matches!(self, Self::IpInventory | Self::NameIdMap)
	}

	/// File name suffix of per-cluster kinds.
	pub fn cluster_suffix(self) -> Option<&'static str> {
		match self {
			Self::Describe => Some("_describe.json"),
			Self::Pods => Some("_pods.json"),
			Self::Ingress => Some("_ingress.json"),
			Self::IpInventory | Self::NameIdMap => None,
		}
	}

	/// Human-readable label used in logs and errors.
	pub fn label(self) -> &'static str {
		match self {
			Self::IpInventory => "IP inventory",
			Self::NameIdMap => "name/id map",
			Self::Describe => "cluster description",
			Self::Pods => "pod inventory",
			Self::Ingress => "ingress inventory",
		}
	}
}

/// A named artifact inside a [`CacheStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
	pub key: String,
	pub path: PathBuf,
	pub kind: ArtifactKind,
}

impl CacheEntry {
	pub fn describe(&self) -> String {
		format!("{} `{}`", self.kind.label(), self.key)
	}
}

/// Which entries [`CacheStore::reset`] removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetScope {
	All,
	WorkingState,
}

#[derive(Debug, Clone)]
pub struct CacheStore {
	dir: PathBuf,
	validation: Validation,
}

/// Name of the cache directory for `date`.
pub fn day_dir_name(date: NaiveDate) -> String {
	format!("info_cache_{}", date.format("%Y%m%d"))
}

impl CacheStore {
	pub fn for_day(base: &Path, date: NaiveDate, validation: Validation) -> Self {
		Self::at(base.join(day_dir_name(date)), validation)
	}

	pub fn at(dir: impl Into<PathBuf>, validation: Validation) -> Self {
		Self {
			dir: dir.into(),
			validation,
		}
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Create the cache directory. Existing directories are fine.
	pub fn ensure_dir(&self) -> Result<(), CrawlError> {
		fs::create_dir_all(&self.dir).map_err(|source| {
			CrawlError::infrastructure("failed to create cache directory", &self.dir, source)
		})
	}

	pub fn ip_inventory(&self) -> CacheEntry {
		self.entry(IP_INVENTORY_FILE.to_string(), ArtifactKind::IpInventory)
	}

	pub fn name_id_map(&self) -> CacheEntry {
		self.entry(NAME_ID_MAP_FILE.to_string(), ArtifactKind::NameIdMap)
	}

	/// Per-cluster entry. Panics in debug builds for non-cluster kinds.
	pub fn cluster(&self, cluster: &str, kind: ArtifactKind) -> CacheEntry {
		let suffix = kind.cluster_suffix().unwrap_or_default();
		debug_assert!(!suffix.is_empty(), "{kind:?} is not a per-cluster artifact");
		self.entry(format!("{cluster}{suffix}"), kind)
	}

	fn entry(&self, key: String, kind: ArtifactKind) -> CacheEntry {
		CacheEntry {
			path: self.dir.join(&key),
			key,
			kind,
		}
	}

	/// Whether `entry` is present and usable.
	pub fn exists_and_nonempty(&self, entry: &CacheEntry) -> bool {
		self.check(&entry.path, entry.kind)
	}

	fn check(&self, path: &Path, kind: ArtifactKind) -> bool {
		match fs::metadata(path) {
			Ok(meta) if meta.is_file() && meta.len() > 0 => {}
			_ => return false,
		}
		if self.validation == Validation::NonEmpty {
			return true;
		}
		let valid = match kind {
			ArtifactKind::NameIdMap => fs::read_to_string(path)
				.ok()
				.and_then(|text| NameIdMap::parse(&text).ok())
				.is_some_and(|map| !map.is_empty()),
			_ => File::open(path).is_ok_and(|file| {
				serde_json::from_reader::<_, IgnoredAny>(BufReader::new(file)).is_ok()
			}),
		};
		if !valid {
			warn!(path = %path.display(), "cached {} is malformed, treating as absent", kind.label());
		}
		valid
	}

	/// Start writing `entry`. Output goes to a staging file that only
	/// replaces the entry on [`StagedWrite::commit`].
	pub fn stage(&self, entry: &CacheEntry) -> StagedWrite<'_> {
		let mut staging = entry.path.clone().into_os_string();
		staging.push(STAGING_SUFFIX);
		StagedWrite {
			store: self,
			entry: entry.clone(),
			staging: PathBuf::from(staging),
			committed: false,
		}
	}

	/// Write `contents` to `entry` through a staged write.
	pub fn write_bytes(&self, entry: &CacheEntry, contents: &[u8]) -> Result<(), CrawlError> {
		let staged = self.stage(entry);
		fs::write(staged.path(), contents).map_err(|source| {
			CrawlError::infrastructure("failed to write", staged.path(), source)
		})?;
		staged.commit()
	}

	pub fn read_to_string(&self, entry: &CacheEntry) -> Result<String, CrawlError> {
		fs::read_to_string(&entry.path)
			.map_err(|source| CrawlError::infrastructure("failed to read", &entry.path, source))
	}

	pub fn remove(&self, entry: &CacheEntry) -> Result<(), CrawlError> {
		match fs::remove_file(&entry.path) {
			Ok(()) => {
				debug!(path = %entry.path.display(), "removed");
				Ok(())
			}
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
			Err(source) => Err(CrawlError::infrastructure(
				"failed to remove",
				&entry.path,
				source,
			)),
		}
	}

	/// Remove cached entries. The directory itself is kept.
	pub fn reset(&self, scope: ResetScope) -> Result<(), CrawlError> {
		match scope {
			ResetScope::WorkingState => {
				self.remove(&self.ip_inventory())?;
				self.remove(&self.name_id_map())
			}
			ResetScope::All => {
				let entries = match fs::read_dir(&self.dir) {
					Ok(entries) => entries,
					Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
					Err(source) => {
						return Err(CrawlError::infrastructure(
							"failed to list cache directory",
							&self.dir,
							source,
						))
					}
				};
				for entry in entries {
					let path = entry
						.map_err(|source| {
							CrawlError::infrastructure("failed to list cache directory", &self.dir, source)
						})?
						.path();
					let removed = if path.is_dir() {
						fs::remove_dir_all(&path)
					} else {
						fs::remove_file(&path)
					};
					removed.map_err(|source| {
						CrawlError::infrastructure("failed to remove", &path, source)
					})?;
				}
				debug!(dir = %self.dir.display(), "cache reset");
				Ok(())
			}
		}
	}

	/// Sorted `(file name, size)` pairs of the cache directory.
	pub fn listing(&self) -> io::Result<Vec<(String, u64)>> {
		list_dir(&self.dir)
	}
}

/// Sorted `(file name, size)` pairs of `dir`.
pub fn list_dir(dir: &Path) -> io::Result<Vec<(String, u64)>> {
	let mut items = Vec::new();
	for entry in fs::read_dir(dir)? {
		let entry = entry?;
		let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
		items.push((entry.file_name().to_string_lossy().into_owned(), size));
	}
	items.sort();
	Ok(items)
}

/// An in-progress write of one cache entry.
///
/// Dropping it without [`commit`](Self::commit) deletes the staging file, so an
/// aborted or failed call never leaves a half-written artifact behind.
#[derive(Debug)]
pub struct StagedWrite<'a> {
	store: &'a CacheStore,
	entry: CacheEntry,
	staging: PathBuf,
	committed: bool,
}

impl StagedWrite<'_> {
	/// Where the producer should write.
	pub fn path(&self) -> &Path {
		&self.staging
	}

	/// Validate the staged output and move it into place.
	pub fn commit(mut self) -> Result<(), CrawlError> {
		if !self.store.check(&self.staging, self.entry.kind) {
			return Err(CrawlError::IncompleteResult {
				what: self.entry.describe(),
				path: self.entry.path.clone(),
			});
		}
		fs::rename(&self.staging, &self.entry.path).map_err(|source| {
			CrawlError::infrastructure("failed to store", &self.entry.path, source)
		})?;
		self.committed = true;
		debug!(path = %self.entry.path.display(), "stored {}", self.entry.kind.label());
		Ok(())
	}
}

impl Drop for StagedWrite<'_> {
	fn drop(&mut self) {
		if !self.committed {
			let _ = fs::remove_file(&self.staging);
		}
	}
}
