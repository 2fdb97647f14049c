//! Report command handler.

use std::{
	io::Write,
	path::{Path, PathBuf},
};

use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;

use super::util::{date_or_today, parse_date};
use crate::{cache::day_dir_name, config::CrawlConfig, report};

#[derive(Args, Debug, Default)]
pub struct ReportArgs {
	/// Cache date to report on (YYYYMMDD, default today)
	#[arg(long, value_parser = parse_date)]
	pub date: Option<NaiveDate>,

	/// Directory for the Markdown files, overriding `report.outputDir`
	#[arg(short, long)]
	pub output: Option<PathBuf>,
}

/// Run the report command.
pub fn run<W: Write>(args: ReportArgs, config: &CrawlConfig, workdir: &Path, writer: W) -> Result<()> {
	let (cache_base, _) = config.paths(workdir);
	let cache_dir = cache_base.join(day_dir_name(date_or_today(args.date)));
	let output_dir = args
		.output
		.unwrap_or_else(|| workdir.join(&config.report.output_dir));

	let summary = report::generate(
		&cache_dir,
		&output_dir,
		&config.report.expected_cluster_prefixes,
	)?;
	summary.write_to(writer)?;
	Ok(())
}
