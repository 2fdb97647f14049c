//! Configuration file support for clustercrawl.
//!
//! Supports `.clustercrawl.yaml` files that can be placed anywhere in the
//! directory hierarchy. clustercrawl searches from the working directory
//! upward to the filesystem root. Every key is optional.
//!
//! The config only describes how the external CLIs are reached and which
//! tenants exist. Stage order is fixed.

use std::{
	fs,
	path::{Path, PathBuf},
	time::Duration,
};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::{directory::TableLayout, exec::Invocation};

/// The name of the config file clustercrawl looks for
pub const CONFIG_FILE_NAME: &str = ".clustercrawl.yaml";

/// Root configuration structure for .clustercrawl.yaml
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrawlConfig {
	/// Cluster groups whose clusters are crawled, in order.
	pub tenants: Vec<String>,

	pub control_plane: ControlPlaneConfig,

	pub orchestration: OrchestrationConfig,

	/// Per-call timeout in seconds; 0 waits forever.
	pub call_timeout_secs: u64,

	pub validation: Validation,

	/// Directory holding the day-scoped cache directories.
	pub cache_base: PathBuf,

	/// Sentinel recording that the previous run fully succeeded.
	pub marker_file: PathBuf,

	pub report: ReportConfig,
}

impl Default for CrawlConfig {
	fn default() -> Self {
		Self {
			tenants: Vec::new(),
			control_plane: ControlPlaneConfig::default(),
			orchestration: OrchestrationConfig::default(),
			call_timeout_secs: 300,
			validation: Validation::default(),
			cache_base: PathBuf::from("."),
			marker_file: PathBuf::from(".clustercrawl_success"),
			report: ReportConfig::default(),
		}
	}
}

/// How strictly cached artifacts are checked before they count as present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Validation {
	/// Any non-empty file is accepted.
	NonEmpty,
	/// Non-empty and parseable (JSON artifacts, `name;id` map).
	#[default]
	Structural,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControlPlaneConfig {
	pub program: String,
	pub ip_list: Vec<String>,
	/// Placeholder: `{tenant}`
	pub cluster_list: Vec<String>,
	/// Placeholder: `{id}`
	pub cluster_describe: Vec<String>,
	pub table: TableLayout,
}

impl Default for ControlPlaneConfig {
	fn default() -> Self {
		Self {
			program: "cloudctl".to_string(),
			ip_list: args(&["ip", "list", "-o", "json"]),
			cluster_list: args(&["cluster", "ls", "--tenant", "{tenant}"]),
			cluster_describe: args(&["cluster", "describe", "{id}", "-o", "json"]),
			table: TableLayout::default(),
		}
	}
}

impl ControlPlaneConfig {
	pub fn ip_list(&self) -> Invocation {
		render(&self.program, &self.ip_list, &[])
	}

	pub fn cluster_list(&self, tenant: &str) -> Invocation {
		render(&self.program, &self.cluster_list, &[("tenant", tenant)])
	}

	pub fn cluster_describe(&self, id: &str) -> Invocation {
		render(&self.program, &self.cluster_describe, &[("id", id)])
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrchestrationConfig {
	pub program: String,
	/// Must print one context name per line.
	pub list_contexts: Vec<String>,
	/// Placeholder: `{context}`
	pub use_context: Vec<String>,
	pub pods: Vec<String>,
	pub ingress: Vec<String>,
	/// Context name for a cluster. Placeholder: `{cluster}`
	pub context_name: String,
}

impl Default for OrchestrationConfig {
	fn default() -> Self {
		Self {
			program: "kubectl".to_string(),
			list_contexts: args(&["config", "get-contexts", "-o", "name"]),
			use_context: args(&["config", "use-context", "{context}"]),
			pods: args(&["get", "pods", "--all-namespaces", "-o", "json"]),
			ingress: args(&["get", "ingress", "--all-namespaces", "-o", "json"]),
			context_name: "{cluster}".to_string(),
		}
	}
}

impl OrchestrationConfig {
	pub fn list_contexts(&self) -> Invocation {
		render(&self.program, &self.list_contexts, &[])
	}

	pub fn use_context(&self, context: &str) -> Invocation {
		render(&self.program, &self.use_context, &[("context", context)])
	}

	pub fn pods(&self) -> Invocation {
		render(&self.program, &self.pods, &[])
	}

	pub fn ingress(&self) -> Invocation {
		render(&self.program, &self.ingress, &[])
	}

	pub fn context_for(&self, cluster: &str) -> String {
		substitute(&self.context_name, &[("cluster", cluster)])
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportConfig {
	pub output_dir: PathBuf,
	/// Cluster name prefixes (up to the first `-`) every report must cover.
	pub expected_cluster_prefixes: Vec<String>,
}

impl Default for ReportConfig {
	fn default() -> Self {
		Self {
			output_dir: PathBuf::from("results"),
			expected_cluster_prefixes: Vec::new(),
		}
	}
}

fn args(items: &[&str]) -> Vec<String> {
	items.iter().map(|s| (*s).to_string()).collect()
}

fn substitute(template: &str, vars: &[(&str, &str)]) -> String {
	let mut out = template.to_string();
	for (name, value) in vars {
		out = out.replace(&format!("{{{name}}}"), value);
	}
	out
}

fn render(program: &str, template: &[String], vars: &[(&str, &str)]) -> Invocation {
	Invocation::new(program, template.iter().map(|arg| substitute(arg, vars)))
}

/// Placeholders used in `template` that are not in `allowed`.
fn unknown_placeholders<'a>(template: &'a str, allowed: &[&str]) -> Vec<&'a str> {
	let mut found = Vec::new();
	let mut rest = template;
	while let Some(start) = rest.find('{') {
		let Some(len) = rest[start..].find('}') else {
			break;
		};
		let name = &rest[start + 1..start + len];
		if !name.is_empty()
			&& name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
			&& !allowed.contains(&name)
		{
			found.push(name);
		}
		rest = &rest[start + len + 1..];
	}
	found
}

impl CrawlConfig {
	/// Load config by searching from the given directory upward, falling
	/// back to defaults when no file exists.
	pub fn load_from_directory(start_dir: &Path) -> Result<Self> {
		match find_config_file(start_dir) {
			Some(path) => Self::load_from_file(&path),
			None => Ok(Self::default()),
		}
	}

	/// Load config from a specific file path
	pub fn load_from_file(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path)
			.with_context(|| format!("failed to read config file: {}", path.display()))?;
		let config: CrawlConfig = serde_yaml_with_quirks::from_str(&content)
			.with_context(|| format!("failed to parse config file: {}", path.display()))?;
		config
			.validate()
			.with_context(|| format!("invalid config file: {}", path.display()))?;
		Ok(config)
	}

	/// Reject templates that reference placeholders nothing will fill in.
	pub fn validate(&self) -> Result<()> {
		let cp = &self.control_plane;
		let orch = &self.orchestration;
		let checks: [(&str, &[String], &[&str]); 7] = [
			("controlPlane.ipList", &cp.ip_list, &[]),
			("controlPlane.clusterList", &cp.cluster_list, &["tenant"]),
			("controlPlane.clusterDescribe", &cp.cluster_describe, &["id"]),
			("orchestration.listContexts", &orch.list_contexts, &[]),
			("orchestration.useContext", &orch.use_context, &["context"]),
			("orchestration.pods", &orch.pods, &[]),
			("orchestration.ingress", &orch.ingress, &[]),
		];
		for (key, template, allowed) in checks {
			for arg in template {
				if let Some(name) = unknown_placeholders(arg, allowed).first() {
					bail!("{key} uses unknown placeholder `{{{name}}}`");
				}
			}
		}
		if let Some(name) = unknown_placeholders(&orch.context_name, &["cluster"]).first() {
			bail!("orchestration.contextName uses unknown placeholder `{{{name}}}`");
		}
		cp.table.validate()?;
		Ok(())
	}

	pub fn call_timeout(&self) -> Option<Duration> {
		(self.call_timeout_secs > 0).then(|| Duration::from_secs(self.call_timeout_secs))
	}

	/// Resolve the cache base and marker file against the working directory.
	pub fn paths(&self, workdir: &Path) -> (PathBuf, PathBuf) {
		(workdir.join(&self.cache_base), workdir.join(&self.marker_file))
	}
}

/// Search for a config file starting from `start_dir` and walking up to the filesystem root
pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
	let mut current = start_dir.to_path_buf();

	if let Ok(canonical) = current.canonicalize() {
		current = canonical;
	}

	loop {
		let config_path = current.join(CONFIG_FILE_NAME);
		if config_path.exists() {
			return Some(config_path);
		}

		match current.parent() {
			Some(parent) if parent != current => current = parent.to_path_buf(),
			_ => break,
		}
	}

	None
}

#[cfg(test)]
mod tests {
	use indoc::indoc;
	use tempfile::TempDir;

	use super::*;

	#[test]
	fn test_find_config_in_parent_dir() {
		let temp = TempDir::new().unwrap();
		let config_path = temp.path().join(CONFIG_FILE_NAME);
		fs::write(&config_path, "tenants: [a]").unwrap();

		let subdir = temp.path().join("subdir");
		fs::create_dir(&subdir).unwrap();

		let found = find_config_file(&subdir);
		// Compare file names only to avoid canonicalization issues on macOS
		assert!(found.is_some());
		assert_eq!(found.unwrap().file_name(), config_path.file_name());
	}

	#[test]
	fn test_missing_config_uses_defaults() {
		let temp = TempDir::new().unwrap();
		let config = CrawlConfig::load_from_directory(temp.path()).unwrap();
		assert!(config.tenants.is_empty());
		assert_eq!(config.control_plane.program, "cloudctl");
		assert_eq!(config.call_timeout(), Some(Duration::from_secs(300)));
		assert_eq!(config.validation, Validation::Structural);
	}

	#[test]
	fn test_load_full_config() {
		let temp = TempDir::new().unwrap();
		let config_path = temp.path().join(CONFIG_FILE_NAME);
		fs::write(
			&config_path,
			indoc! {"
				tenants: [alpha, beta]
				controlPlane:
				  program: /opt/bin/cloudctl
				  table:
				    headerRows: 0
				    idColumn: 1
				    nameColumn: 0
				orchestration:
				  contextName: 'garden-{cluster}'
				callTimeoutSecs: 0
				validation: non-empty
				report:
				  expectedClusterPrefixes: [prod, stage]
			"},
		)
		.unwrap();

		let config = CrawlConfig::load_from_file(&config_path).unwrap();
		assert_eq!(config.tenants, vec!["alpha", "beta"]);
		assert_eq!(config.control_plane.program, "/opt/bin/cloudctl");
		assert_eq!(config.control_plane.table.header_rows, 0);
		assert_eq!(config.orchestration.context_for("prod-1"), "garden-prod-1");
		assert_eq!(config.call_timeout(), None);
		assert_eq!(config.validation, Validation::NonEmpty);
		assert_eq!(config.report.expected_cluster_prefixes, vec!["prod", "stage"]);
		// untouched sections keep their defaults
		assert_eq!(config.orchestration.program, "kubectl");
	}

	#[test]
	fn test_render_templates() {
		let config = CrawlConfig::default();
		assert_eq!(
			config.control_plane.cluster_list("acme").to_string(),
			"cloudctl cluster ls --tenant acme"
		);
		assert_eq!(
			config.control_plane.cluster_describe("f00d").to_string(),
			"cloudctl cluster describe f00d -o json"
		);
		assert_eq!(
			config.orchestration.use_context("prod-1").to_string(),
			"kubectl config use-context prod-1"
		);
	}

	#[test]
	fn test_unknown_placeholder_rejected() {
		let temp = TempDir::new().unwrap();
		let config_path = temp.path().join(CONFIG_FILE_NAME);
		fs::write(
			&config_path,
			"controlPlane:\n  clusterDescribe: [cluster, describe, '{name}']",
		)
		.unwrap();

		let err = CrawlConfig::load_from_file(&config_path).unwrap_err();
		assert!(format!("{err:#}").contains("unknown placeholder `{name}`"));
	}

	#[test]
	fn test_json_braces_are_not_placeholders() {
		assert!(unknown_placeholders("{.items[*].metadata.name}", &[]).is_empty());
		assert_eq!(unknown_placeholders("{tenant}-{zone}", &["tenant"]), vec!["zone"]);
	}
}
