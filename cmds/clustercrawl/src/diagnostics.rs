//! Diagnostic snapshot emitted when a run aborts.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::cache::list_dir;

/// Directory listings captured at the moment of a fatal error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
	pub working_dir: PathBuf,
	pub working_entries: Vec<(String, u64)>,
	pub cache_dir: PathBuf,
	/// `None` when the cache directory could not be read.
	pub cache_entries: Option<Vec<(String, u64)>>,
}

impl Snapshot {
	pub fn capture(working_dir: &Path, cache_dir: &Path) -> Self {
		Self {
			working_dir: working_dir.to_path_buf(),
			working_entries: list_dir(working_dir).unwrap_or_default(),
			cache_dir: cache_dir.to_path_buf(),
			cache_entries: list_dir(cache_dir).ok(),
		}
	}

	/// Log the snapshot; visible in terse mode.
	pub fn emit(&self) {
		error!("diagnostic snapshot follows");
		info!("working directory {}:", self.working_dir.display());
		for (name, size) in &self.working_entries {
			info!("  {name} ({size} bytes)");
		}
		match &self.cache_entries {
			Some(entries) => {
				info!("cache directory {}:", self.cache_dir.display());
				for (name, size) in entries {
					info!("  {name} ({size} bytes)");
				}
			}
			None => info!("cache directory {} is not readable", self.cache_dir.display()),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::fs;

	use tempfile::TempDir;

	use super::*;

	#[test]
	fn test_capture_lists_both_directories() {
		let temp = TempDir::new().unwrap();
		let cache = temp.path().join("info_cache_20240101");
		fs::create_dir(&cache).unwrap();
		fs::write(cache.join("name_id.map"), "a;1\n").unwrap();
		fs::write(temp.path().join("notes.txt"), "hi").unwrap();

		let snapshot = Snapshot::capture(temp.path(), &cache);

		assert_eq!(
			snapshot.working_entries,
			vec![
				("info_cache_20240101".to_string(), snapshot.working_entries[0].1),
				("notes.txt".to_string(), 2),
			]
		);
		assert_eq!(
			snapshot.cache_entries,
			Some(vec![("name_id.map".to_string(), 4)])
		);
	}

	#[test]
	fn test_capture_without_cache_dir() {
		let temp = TempDir::new().unwrap();
		let snapshot = Snapshot::capture(temp.path(), &temp.path().join("missing"));
		assert_eq!(snapshot.cache_entries, None);
		snapshot.emit();
	}
}
