//! Per-day cache status for operators.

use std::{collections::BTreeMap, io::Write};

use anyhow::Result;
use tabwriter::TabWriter;

use crate::{
	cache::{ArtifactKind, CacheStore},
	directory,
	marker::{MarkerLedger, MarkerState},
};

/// Cache state of one cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterStatus {
	pub name: String,
	/// Known only while the name/id map is cached.
	pub id: Option<String>,
	pub describe: bool,
	pub pods: bool,
	pub ingress: bool,
}

/// Clusters for the day: from the name/id map when cached, otherwise from the
/// per-cluster artifact file names.
pub fn collect(store: &CacheStore) -> Vec<ClusterStatus> {
	let mut ids: BTreeMap<String, Option<String>> = BTreeMap::new();
	if store.exists_and_nonempty(&store.name_id_map()) {
		if let Ok(map) = directory::load(store) {
			for cluster in map.iter() {
				ids.insert(cluster.name.clone(), Some(cluster.id.clone()));
			}
		}
	}
	if ids.is_empty() {
		for (file, _) in store.listing().unwrap_or_default() {
			if let Some(name) = ArtifactKind::PER_CLUSTER
				.iter()
				.find_map(|kind| file.strip_suffix(kind.cluster_suffix()?))
			{
				ids.entry(name.to_string()).or_insert(None);
			}
		}
	}

	ids.into_iter()
		.map(|(name, id)| {
			let present = |kind| store.exists_and_nonempty(&store.cluster(&name, kind));
			ClusterStatus {
				describe: present(ArtifactKind::Describe),
				pods: present(ArtifactKind::Pods),
				ingress: present(ArtifactKind::Ingress),
				id,
				name,
			}
		})
		.collect()
}

/// Print the marker state and a table of cluster artifacts.
pub fn write_status<W: Write>(
	store: &CacheStore,
	ledger: &MarkerLedger,
	writer: W,
) -> Result<()> {
	let mut tw = TabWriter::new(writer);
	let marker = match ledger.state() {
		MarkerState::Recorded => "recorded",
		MarkerState::NoRecord => "absent (next crawl rebuilds the cache)",
	};
	writeln!(tw, "cache:\t{}", store.dir().display())?;
	writeln!(tw, "last run successful:\t{marker}")?;
	writeln!(tw)?;
	writeln!(tw, "CLUSTER\tID\tDESCRIBE\tPODS\tINGRESS")?;
	for status in collect(store) {
		writeln!(
			tw,
			"{}\t{}\t{}\t{}\t{}",
			status.name,
			status.id.as_deref().unwrap_or("-"),
			mark(status.describe),
			mark(status.pods),
			mark(status.ingress),
		)?;
	}
	tw.flush()?;
	Ok(())
}

fn mark(present: bool) -> &'static str {
	if present {
		"yes"
	} else {
		"no"
	}
}

#[cfg(test)]
mod tests {
	use std::fs;

	use chrono::NaiveDate;
	use tempfile::TempDir;

	use super::*;
	use crate::config::Validation;

	fn store(temp: &TempDir) -> CacheStore {
		let store = CacheStore::for_day(
			temp.path(),
			NaiveDate::from_ymd_opt(2024, 8, 9).unwrap(),
			Validation::Structural,
		);
		store.ensure_dir().unwrap();
		store
	}

	#[test]
	fn test_collect_from_map() {
		let temp = TempDir::new().unwrap();
		let store = store(&temp);
		fs::write(store.name_id_map().path, "prod-1;a\nprod-2;b\n").unwrap();
		fs::write(store.cluster("prod-1", ArtifactKind::Describe).path, "{}").unwrap();

		let statuses = collect(&store);

		assert_eq!(
			statuses,
			vec![
				ClusterStatus {
					name: "prod-1".to_string(),
					id: Some("a".to_string()),
					describe: true,
					pods: false,
					ingress: false,
				},
				ClusterStatus {
					name: "prod-2".to_string(),
					id: Some("b".to_string()),
					describe: false,
					pods: false,
					ingress: false,
				},
			]
		);
	}

	#[test]
	fn test_collect_from_artifacts_after_promotion() {
		let temp = TempDir::new().unwrap();
		let store = store(&temp);
		fs::write(store.cluster("prod-1", ArtifactKind::Describe).path, "{}").unwrap();
		fs::write(store.cluster("prod-1", ArtifactKind::Ingress).path, "{}").unwrap();

		let statuses = collect(&store);

		assert_eq!(statuses.len(), 1);
		assert_eq!(statuses[0].id, None);
		assert!(statuses[0].describe && statuses[0].ingress && !statuses[0].pods);
	}

	#[test]
	fn test_write_status_table() {
		let temp = TempDir::new().unwrap();
		let store = store(&temp);
		fs::write(store.cluster("prod-1", ArtifactKind::Describe).path, "{}").unwrap();
		let ledger = MarkerLedger::new(temp.path().join(".clustercrawl_success"));

		let mut out = Vec::new();
		write_status(&store, &ledger, &mut out).unwrap();
		let out = String::from_utf8(out).unwrap();

		assert!(out.contains("absent"));
		let lines: Vec<&str> = out.lines().collect();
		assert!(lines.iter().any(|l| l.starts_with("CLUSTER")));
		let row = lines.iter().find(|l| l.starts_with("prod-1")).unwrap();
		assert_eq!(
			row.split_whitespace().collect::<Vec<_>>(),
			vec!["prod-1", "-", "yes", "no", "no"]
		);
	}
}
