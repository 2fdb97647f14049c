//! Utilities for command handlers.

use std::io::{self, ErrorKind, Write};

use chrono::{Local, NaiveDate};

/// A writer wrapper that silently handles broken pipe errors.
///
/// When the underlying writer returns a broken pipe error (EPIPE), this wrapper
/// converts it to a successful write. This allows commands to exit cleanly when
/// output is piped to a process that closes early (e.g., `clustercrawl status | head -1`).
pub struct BrokenPipeGuard<W> {
	inner: W,
}

impl<W> BrokenPipeGuard<W> {
	pub fn new(inner: W) -> Self {
		Self { inner }
	}
}

impl<W: Write> Write for BrokenPipeGuard<W> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		match self.inner.write(buf) {
			Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(buf.len()),
			other => other,
		}
	}

	fn flush(&mut self) -> io::Result<()> {
		match self.inner.flush() {
			Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
			other => other,
		}
	}
}

/// Parse a `YYYYMMDD` cache date.
pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
	NaiveDate::parse_from_str(value, "%Y%m%d")
		.map_err(|e| format!("expected a date like 20240131: {e}"))
}

/// The given date, or today in local time.
pub fn date_or_today(date: Option<NaiveDate>) -> NaiveDate {
	date.unwrap_or_else(|| Local::now().date_naive())
}
