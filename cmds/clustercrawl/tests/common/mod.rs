//! A fake fleet: shell stand-ins for the control-plane and orchestration
//! CLIs, driven by fixture files inside a temporary directory.
//!
//! Both scripts append every invocation to `calls.log`. A call fails with
//! exit code 1 while a `fail_<key>` fixture exists, where `<key>` is the
//! subcommand (`ip`, `ls`, `describe_<id>`, `use_<context>`, `pods_<context>`,
//! `ingress_<context>`). A describe call stalls for a few seconds while a
//! `slow_describe_<id>` fixture exists. Scripts are run through `sh` so the
//! freshly written files never need to be executable.

#![allow(dead_code)]

use std::{
	fs::{self, OpenOptions},
	future::pending,
	io::Write as _,
	path::{Path, PathBuf},
};

use chrono::NaiveDate;
use clustercrawl::{
	cache::CacheStore,
	config::CrawlConfig,
	exec::ProcessRunner,
	marker::MarkerLedger,
	run::{self, RunReport},
};
use indoc::formatdoc;
use tempfile::TempDir;

pub const CONTROL_PLANE_SCRIPT: &str = r#"
F="$FIXTURES"
echo "cloudctl $*" >> "$F/calls.log"
fail() {
	if [ -f "$F/fail_$1" ]; then
		echo "injected failure: $1" >&2
		exit 1
	fi
}
slow() {
	if [ -f "$F/slow_$1" ]; then
		sleep 5
	fi
}
case "$1 $2" in
	"ip list") fail ip; cat "$F/ips.json" ;;
	"cluster ls") fail ls; cat "$F/tenant_$4.txt" ;;
	"cluster describe") fail "describe_$3"; slow "describe_$3"; cat "$F/describe_$3.json" ;;
	*) echo "unknown command: $*" >&2; exit 2 ;;
esac
"#;

pub const ORCHESTRATION_SCRIPT: &str = r#"
F="$FIXTURES"
echo "kubectl $*" >> "$F/calls.log"
[ -s "$MAP" ] || echo "kubectl $*" >> "$F/before_map.log"
fail() {
	if [ -f "$F/fail_$1" ]; then
		echo "injected failure: $1" >&2
		exit 1
	fi
}
case "$1 $2" in
	"config get-contexts") cat "$F/contexts.txt" ;;
	"config use-context") fail "use_$3"; echo "$3" > "$F/current" ;;
	"get pods") ctx=$(cat "$F/current"); fail "pods_$ctx"; cat "$F/pods_$ctx.json" ;;
	"get ingress") ctx=$(cat "$F/current"); fail "ingress_$ctx"; cat "$F/ingress_$ctx.json" ;;
	*) echo "unknown command: $*" >&2; exit 2 ;;
esac
"#;

pub fn crawl_date() -> NaiveDate {
	NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
}

pub struct Fleet {
	_temp: TempDir,
	pub workdir: PathBuf,
	pub fixtures: PathBuf,
	pub config: CrawlConfig,
}

impl Fleet {
	/// A fleet with a single tenant `acme` and no clusters.
	pub fn new() -> Self {
		let temp = TempDir::new().unwrap();
		let workdir = temp.path().join("work");
		let fixtures = temp.path().join("fleet");
		fs::create_dir_all(&workdir).unwrap();
		fs::create_dir_all(&fixtures).unwrap();

		let mut config = CrawlConfig {
			tenants: vec!["acme".to_string()],
			call_timeout_secs: 30,
			..CrawlConfig::default()
		};
		let map = run::open(&config, &workdir, crawl_date())
			.0
			.name_id_map()
			.path;
		let header = format!(
			"FIXTURES='{}'\nMAP='{}'\n",
			fixtures.display(),
			map.display()
		);
		let cloudctl = fixtures.join("cloudctl.sh");
		let kubectl = fixtures.join("kubectl.sh");
		fs::write(&cloudctl, format!("{header}{CONTROL_PLANE_SCRIPT}")).unwrap();
		fs::write(&kubectl, format!("{header}{ORCHESTRATION_SCRIPT}")).unwrap();

		let cp = &mut config.control_plane;
		cp.program = "sh".to_string();
		for template in [&mut cp.ip_list, &mut cp.cluster_list, &mut cp.cluster_describe] {
			template.insert(0, cloudctl.display().to_string());
		}
		let orch = &mut config.orchestration;
		orch.program = "sh".to_string();
		for template in [
			&mut orch.list_contexts,
			&mut orch.use_context,
			&mut orch.pods,
			&mut orch.ingress,
		] {
			template.insert(0, kubectl.display().to_string());
		}

		fs::write(fixtures.join("ips.json"), r#"[{"ip": "10.0.0.1"}]"#).unwrap();
		fs::write(fixtures.join("contexts.txt"), "").unwrap();
		fs::write(fixtures.join("tenant_acme.txt"), "UID TENANT PROJECT NAME\n").unwrap();

		Self {
			_temp: temp,
			workdir,
			fixtures,
			config,
		}
	}

	/// Register a cluster of tenant `acme` with a matching context.
	pub fn add_cluster(&self, name: &str, id: &str) -> &Self {
		self.add_cluster_without_context(name, id);
		self.append("contexts.txt", &format!("{name}\n"));
		fs::write(
			self.fixtures.join(format!("pods_{name}.json")),
			format!(r#"{{"items": [{{"metadata": {{"name": "{name}-pod"}}}}]}}"#),
		)
		.unwrap();
		fs::write(
			self.fixtures.join(format!("ingress_{name}.json")),
			r#"{"items": []}"#,
		)
		.unwrap();
		self
	}

	/// Register a cluster that has no orchestration context.
	pub fn add_cluster_without_context(&self, name: &str, id: &str) -> &Self {
		self.append("tenant_acme.txt", &format!("{id} acme web {name}\n"));
		fs::write(
			self.fixtures.join(format!("describe_{id}.json")),
			format!(r#"{{"id": "{id}", "name": "{name}"}}"#),
		)
		.unwrap();
		self
	}

	/// Register another tenant whose listing prints `listing` verbatim.
	pub fn add_tenant(&mut self, tenant: &str, listing: &str) -> &mut Self {
		fs::write(self.fixtures.join(format!("tenant_{tenant}.txt")), listing).unwrap();
		self.config.tenants.push(tenant.to_string());
		self
	}

	pub fn fail(&self, key: &str) {
		fs::write(self.fixtures.join(format!("fail_{key}")), "").unwrap();
	}

	pub fn slow(&self, key: &str) {
		fs::write(self.fixtures.join(format!("slow_{key}")), "").unwrap();
	}

	pub fn heal(&self, key: &str) {
		fs::remove_file(self.fixtures.join(format!("fail_{key}"))).unwrap();
	}

	/// Calls made so far, without the script path.
	pub fn calls(&self) -> Vec<String> {
		read_lines(&self.fixtures.join("calls.log"))
	}

	pub fn clear_calls(&self) {
		let _ = fs::remove_file(self.fixtures.join("calls.log"));
	}

	/// Orchestration calls made while the name/id map was not yet written.
	pub fn calls_before_map(&self) -> Vec<String> {
		read_lines(&self.fixtures.join("before_map.log"))
	}

	pub fn store(&self) -> CacheStore {
		run::open(&self.config, &self.workdir, crawl_date()).0
	}

	pub fn ledger(&self) -> MarkerLedger {
		run::open(&self.config, &self.workdir, crawl_date()).1
	}

	pub fn runner(&self) -> ProcessRunner {
		ProcessRunner::new(self.config.call_timeout())
	}

	pub async fn crawl(&self) -> RunReport {
		run::run_crawl(
			&self.config,
			&self.runner(),
			&self.workdir,
			crawl_date(),
			pending(),
		)
		.await
	}

	/// Write `.clustercrawl.yaml` into the working directory.
	pub fn write_config_file(&self) {
		let list = |items: &[String]| serde_json::to_string(items).unwrap();
		let cp = &self.config.control_plane;
		let orch = &self.config.orchestration;
		let yaml = formatdoc!(
			"
				tenants: {tenants}
				callTimeoutSecs: {timeout}
				controlPlane:
				  program: sh
				  ipList: {ip_list}
				  clusterList: {cluster_list}
				  clusterDescribe: {cluster_describe}
				orchestration:
				  program: sh
				  listContexts: {list_contexts}
				  useContext: {use_context}
				  pods: {pods}
				  ingress: {ingress}
				report:
				  expectedClusterPrefixes: [prod, edge]
			",
			tenants = list(&self.config.tenants),
			timeout = self.config.call_timeout_secs,
			ip_list = list(&cp.ip_list),
			cluster_list = list(&cp.cluster_list),
			cluster_describe = list(&cp.cluster_describe),
			list_contexts = list(&orch.list_contexts),
			use_context = list(&orch.use_context),
			pods = list(&orch.pods),
			ingress = list(&orch.ingress),
		);
		fs::write(self.workdir.join(".clustercrawl.yaml"), yaml).unwrap();
	}

	fn append(&self, file: &str, line: &str) {
		let mut f = OpenOptions::new()
			.create(true)
			.append(true)
			.open(self.fixtures.join(file))
			.unwrap();
		f.write_all(line.as_bytes()).unwrap();
	}
}

fn read_lines(path: &Path) -> Vec<String> {
	fs::read_to_string(path)
		.map(|text| text.lines().map(str::to_string).collect())
		.unwrap_or_default()
}
