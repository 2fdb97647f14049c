use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clustercrawl::{
	commands::{self, util::BrokenPipeGuard},
	config::CrawlConfig,
	telemetry,
};

#[cfg(all(
	target_os = "linux",
	feature = "mimalloc",
	not(feature = "system-alloc")
))]
#[global_allocator]
static GLOBAL: mimallocator::Mimalloc = mimallocator::Mimalloc;

#[derive(Parser)]
#[command(name = "clustercrawl")]
#[command(about = "Crawl cluster inventories into a resumable daily cache", long_about = None)]
#[command(version = env!("CLUSTERCRAWL_VERSION"))]
struct Cli {
	/// Verbose logging
	#[arg(short, long, global = true)]
	debug: bool,

	/// Config file (default: nearest .clustercrawl.yaml)
	#[arg(long, global = true, value_name = "PATH")]
	config: Option<std::path::PathBuf>,

	#[command(subcommand)]
	command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
	/// Crawl all clusters into today's cache (default)
	Crawl(commands::crawl::CrawlArgs),

	/// Write Markdown ingress reports from a cached day
	Report(commands::report::ReportArgs),

	/// Show what is cached for a day
	Status(commands::status::StatusArgs),
}

fn main() -> Result<ExitCode> {
	let cli = Cli::parse();

	telemetry::init(cli.debug)?;

	let workdir = std::env::current_dir().context("failed to determine working directory")?;
	let config = match &cli.config {
		Some(path) => CrawlConfig::load_from_file(path)?,
		None => CrawlConfig::load_from_directory(&workdir)?,
	};

	let stdout = BrokenPipeGuard::new(std::io::stdout());

	match cli.command.unwrap_or_else(|| Commands::Crawl(Default::default())) {
		Commands::Crawl(args) => commands::crawl::run(args, config, &workdir),
		Commands::Report(args) => {
			commands::report::run(args, &config, &workdir, stdout).map(|()| ExitCode::SUCCESS)
		}
		Commands::Status(args) => {
			commands::status::run(args, &config, &workdir, stdout).map(|()| ExitCode::SUCCESS)
		}
	}
}
