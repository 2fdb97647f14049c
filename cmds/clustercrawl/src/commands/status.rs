//! Status command handler.

use std::{io::Write, path::Path};

use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;

use super::util::{date_or_today, parse_date};
use crate::{config::CrawlConfig, run, status};

#[derive(Args, Debug, Default)]
pub struct StatusArgs {
	/// Cache date to inspect (YYYYMMDD, default today)
	#[arg(long, value_parser = parse_date)]
	pub date: Option<NaiveDate>,
}

/// Run the status command.
pub fn run<W: Write>(args: StatusArgs, config: &CrawlConfig, workdir: &Path, writer: W) -> Result<()> {
	let (store, ledger) = run::open(config, workdir, date_or_today(args.date));
	status::write_status(&store, &ledger, writer)
}
