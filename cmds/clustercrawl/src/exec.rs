//! Invocation of the external control-plane and orchestration CLIs.
//!
//! The pipeline only talks to collaborators through [`CommandRunner`], so the
//! real [`ProcessRunner`] can be swapped for a scripted one in tests.

use std::{
	fmt,
	fs::File,
	future::Future,
	path::Path,
	process::{Output, Stdio},
	time::Duration,
};

use tokio::process::Command;
use tracing::debug;

use crate::error::CallError;

/// A fully rendered command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
	pub program: String,
	pub args: Vec<String>,
}

impl Invocation {
	pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			program: program.into(),
			args: args.into_iter().map(Into::into).collect(),
		}
	}
}

impl fmt::Display for Invocation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.program)?;
		for arg in &self.args {
			write!(f, " {arg}")?;
		}
		Ok(())
	}
}

/// Runs external commands on behalf of the pipeline.
///
/// Both operations fail with [`CallError`] when the command cannot be started,
/// exits non-zero, or exceeds the runner's timeout. Empty output is *not* an
/// error at this level; callers decide whether an empty result is acceptable.
pub trait CommandRunner {
	/// Run the command and return its standard output.
	fn capture(&self, invocation: &Invocation)
		-> impl Future<Output = Result<String, CallError>>;

	/// Run the command with its standard output streamed into `dest`.
	fn stream_to(
		&self,
		invocation: &Invocation,
		dest: &Path,
	) -> impl Future<Output = Result<(), CallError>>;
}

/// [`CommandRunner`] backed by real child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
	timeout: Option<Duration>,
}

impl ProcessRunner {
	/// Create a runner that kills calls running longer than `timeout`.
	/// `None` waits forever.
	pub fn new(timeout: Option<Duration>) -> Self {
		Self { timeout }
	}

	fn command(invocation: &Invocation) -> Command {
		let mut cmd = Command::new(&invocation.program);
		cmd.args(&invocation.args)
			.stdin(Stdio::null())
			.stderr(Stdio::piped())
			.kill_on_drop(true);
		cmd
	}

	async fn finish(&self, invocation: &Invocation, mut cmd: Command) -> Result<Output, CallError> {
		debug!(command = %invocation, "running");
		let child = cmd.spawn().map_err(|source| CallError::Spawn {
			command: invocation.to_string(),
			source,
		})?;

		// Dropping the wait future on timeout drops the child, which kills it.
		let waited = match self.timeout {
			Some(timeout) => tokio::time::timeout(timeout, child.wait_with_output())
				.await
				.map_err(|_| CallError::TimedOut {
					command: invocation.to_string(),
					timeout,
				})?,
			None => child.wait_with_output().await,
		};
		let output = waited.map_err(|source| CallError::Spawn {
			command: invocation.to_string(),
			source,
		})?;

		if !output.status.success() {
			return Err(CallError::NonZeroExit {
				command: invocation.to_string(),
				code: output.status.code(),
				stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
			});
		}
		Ok(output)
	}
}

impl CommandRunner for ProcessRunner {
	async fn capture(&self, invocation: &Invocation) -> Result<String, CallError> {
		let mut cmd = Self::command(invocation);
		cmd.stdout(Stdio::piped());
		let output = self.finish(invocation, cmd).await?;
		Ok(String::from_utf8_lossy(&output.stdout).into_owned())
	}

	async fn stream_to(&self, invocation: &Invocation, dest: &Path) -> Result<(), CallError> {
		let file = File::create(dest).map_err(|source| CallError::Sink {
			command: invocation.to_string(),
			path: dest.to_path_buf(),
			source,
		})?;
		let mut cmd = Self::command(invocation);
		cmd.stdout(Stdio::from(file));
		self.finish(invocation, cmd).await?;
		Ok(())
	}
}
