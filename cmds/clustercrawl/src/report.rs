//! Markdown ingress reports built from cached `<cluster>_ingress.json` files.

use std::{
	collections::BTreeSet,
	fmt::Write as _,
	fs,
	io::Write,
	path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

const INGRESS_SUFFIX: &str = "_ingress.json";
const MISSING: &str = "N/A";

#[derive(Debug, Default, Deserialize)]
pub struct IngressList {
	#[serde(default)]
	pub items: Vec<Ingress>,
}

#[derive(Debug, Deserialize)]
pub struct Ingress {
	pub metadata: Metadata,
	#[serde(default)]
	pub spec: IngressSpec,
	#[serde(default)]
	pub status: IngressStatus,
}

#[derive(Debug, Deserialize)]
pub struct Metadata {
	#[serde(default)]
	pub namespace: String,
	pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct IngressSpec {
	#[serde(default)]
	pub tls: Option<serde_json::Value>,
	#[serde(default)]
	pub rules: Vec<IngressRule>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IngressRule {
	pub host: Option<String>,
	#[serde(default)]
	pub http: HttpRule,
}

#[derive(Debug, Default, Deserialize)]
pub struct HttpRule {
	#[serde(default)]
	pub paths: Vec<HttpPath>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HttpPath {
	#[serde(default)]
	pub backend: Backend,
}

#[derive(Debug, Default, Deserialize)]
pub struct Backend {
	#[serde(default)]
	pub service: ServiceBackend,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServiceBackend {
	#[serde(default)]
	pub port: ServicePort,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServicePort {
	pub number: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressStatus {
	#[serde(default)]
	pub load_balancer: LoadBalancerStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoadBalancerStatus {
	#[serde(default)]
	pub ingress: Vec<LoadBalancerIngress>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoadBalancerIngress {
	pub ip: Option<String>,
}

/// One table row of a cluster report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRow {
	pub namespace: String,
	pub name: String,
	pub hosts: String,
	pub address: String,
	pub ports: String,
}

impl IngressRow {
	pub fn from_ingress(item: &Ingress) -> Self {
		let hosts = item
			.spec
			.rules
			.iter()
			.map(|rule| rule.host.as_deref().unwrap_or(MISSING))
			.collect::<Vec<_>>()
			.join(", ");

		let address = item
			.status
			.load_balancer
			.ingress
			.iter()
			.map(|lb| lb.ip.as_deref().unwrap_or(MISSING))
			.collect::<Vec<_>>()
			.join(", ");

		let mut ports = BTreeSet::new();
		if item.spec.tls.is_some() {
			ports.insert(443);
		}
		for rule in &item.spec.rules {
			for path in &rule.http.paths {
				ports.insert(path.backend.service.port.number.unwrap_or(80));
			}
		}
		if ports.is_empty() {
			ports.insert(80);
		}
		let ports = ports
			.iter()
			.map(u32::to_string)
			.collect::<Vec<_>>()
			.join(", ");

		Self {
			namespace: item.metadata.namespace.clone(),
			name: item.metadata.name.clone(),
			hosts,
			address,
			ports,
		}
	}

	pub fn hosts_missing(&self) -> bool {
		self.hosts.is_empty() || self.hosts.contains(MISSING)
	}

	fn cells(&self) -> [&str; 5] {
		[
			self.namespace.as_str(),
			self.name.as_str(),
			self.hosts.as_str(),
			self.address.as_str(),
			self.ports.as_str(),
		]
	}
}

/// Rows for every ingress, warning about missing hosts and addresses.
pub fn extract_rows(list: &IngressList) -> Vec<IngressRow> {
	list.items
		.iter()
		.map(|item| {
			let row = IngressRow::from_ingress(item);
			debug!(namespace = %row.namespace, name = %row.name, "extracted ingress");
			if row.hosts_missing() {
				warn!(namespace = %row.namespace, name = %row.name, "ingress has missing hosts");
			}
			if row.address.is_empty() {
				warn!(namespace = %row.namespace, name = %row.name, "ingress has no load balancer address");
			}
			row
		})
		.collect()
}

/// Render a cluster's report as Markdown with a pipe table.
pub fn render_markdown(cluster: &str, rows: &[IngressRow]) -> String {
	const HEADERS: [&str; 5] = ["Namespace", "Name", "Hosts", "Address", "Ports"];

	let mut widths = HEADERS.map(|h| h.chars().count());
	for row in rows {
		for (width, cell) in widths.iter_mut().zip(row.cells()) {
			*width = (*width).max(cell.chars().count());
		}
	}

	let mut out = format!("# Ingress Summary for Cluster: {cluster}\n\n");
	write_row(&mut out, &HEADERS, &widths);
	out.push('|');
	for width in widths {
		let _ = write!(out, ":{}|", "-".repeat(width + 1));
	}
	out.push('\n');
	for row in rows {
		write_row(&mut out, &row.cells(), &widths);
	}
	out
}

fn write_row(out: &mut String, cells: &[&str; 5], widths: &[usize; 5]) {
	out.push('|');
	for (cell, width) in cells.iter().zip(widths) {
		let pad = width - cell.chars().count();
		let _ = write!(out, " {cell}{} |", " ".repeat(pad));
	}
	out.push('\n');
}

/// Cluster name up to the first `-`.
pub fn cluster_prefix(cluster: &str) -> &str {
	cluster.split('-').next().unwrap_or(cluster)
}

/// An ingress with missing hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIssue {
	pub cluster: String,
	pub row: IngressRow,
}

#[derive(Debug, Default)]
pub struct ReportSummary {
	pub written: Vec<PathBuf>,
	pub missing_prefixes: Vec<String>,
	pub host_issues: Vec<HostIssue>,
}

impl ReportSummary {
	pub fn write_to<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
		if self.missing_prefixes.is_empty() {
			writeln!(writer, "All expected clusters were processed.")?;
		} else {
			writeln!(
				writer,
				"Warning: The following expected clusters were not processed: {}",
				self.missing_prefixes.join(", ")
			)?;
		}

		writeln!(writer, "\nSummary of Ingresses with Issues:")?;
		for issue in &self.host_issues {
			writeln!(
				writer,
				"Cluster: {}, Namespace: {}, Name: {}, Hosts: {} (Warning: Hosts missing)",
				issue.cluster, issue.row.namespace, issue.row.name, issue.row.hosts
			)?;
		}
		writer.flush()
	}
}

/// Build a Markdown report for every cached ingress inventory in `cache_dir`.
pub fn generate(
	cache_dir: &Path,
	output_dir: &Path,
	expected_prefixes: &[String],
) -> Result<ReportSummary> {
	if !cache_dir.is_dir() {
		bail!(
			"the directory '{}' does not exist. Please check the date or directory path",
			cache_dir.display()
		);
	}
	fs::create_dir_all(output_dir)
		.with_context(|| format!("failed to create {}", output_dir.display()))?;

	let mut files: Vec<(String, PathBuf)> = fs::read_dir(cache_dir)
		.with_context(|| format!("failed to read {}", cache_dir.display()))?
		.filter_map(|entry| entry.ok())
		.filter_map(|entry| {
			let name = entry.file_name().to_string_lossy().into_owned();
			let cluster = name.strip_suffix(INGRESS_SUFFIX)?.to_string();
			Some((cluster, entry.path()))
		})
		.collect();
	files.sort();

	let mut summary = ReportSummary::default();
	let mut seen_prefixes = BTreeSet::new();
	for (cluster, path) in files {
		let content = fs::read_to_string(&path)
			.with_context(|| format!("failed to read {}", path.display()))?;
		let list: IngressList = serde_json::from_str(&content)
			.with_context(|| format!("failed to parse {}", path.display()))?;

		let rows = extract_rows(&list);
		let report_path = output_dir.join(format!("{cluster}_ingress.md"));
		fs::write(&report_path, render_markdown(&cluster, &rows))
			.with_context(|| format!("failed to write {}", report_path.display()))?;
		info!(cluster = %cluster, "markdown report created");

		seen_prefixes.insert(cluster_prefix(&cluster).to_string());
		summary.host_issues.extend(
			rows.into_iter()
				.filter(IngressRow::hosts_missing)
				.map(|row| HostIssue {
					cluster: cluster.clone(),
					row,
				}),
		);
		summary.written.push(report_path);
	}

	summary.missing_prefixes = expected_prefixes
		.iter()
		.filter(|prefix| !seen_prefixes.contains(prefix.as_str()))
		.cloned()
		.collect();
	Ok(summary)
}
