//! Common test utilities.

use std::{cell::RefCell, collections::HashMap, fs, path::Path};

use crate::{
	error::CallError,
	exec::{CommandRunner, Invocation},
};

#[derive(Debug, Clone)]
enum Response {
	Output(String),
	Failure(i32),
}

/// A scripted [`CommandRunner`] for testing.
///
/// Responses are keyed by the full command line. Every call is recorded, and
/// commands without a scripted response fail with exit code 127.
#[derive(Debug, Default)]
pub struct FakeRunner {
	responses: HashMap<String, Response>,
	calls: RefCell<Vec<String>>,
}

impl FakeRunner {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder-style method to script a successful call.
	pub fn with_output(mut self, command: &str, stdout: &str) -> Self {
		self.responses
			.insert(command.to_string(), Response::Output(stdout.to_string()));
		self
	}

	/// Builder-style method to script a failing call.
	pub fn with_failure(mut self, command: &str, code: i32) -> Self {
		self.responses
			.insert(command.to_string(), Response::Failure(code));
		self
	}

	/// Command lines seen so far, in order.
	pub fn calls(&self) -> Vec<String> {
		self.calls.borrow().clone()
	}

	fn respond(&self, invocation: &Invocation) -> Result<String, CallError> {
		let command = invocation.to_string();
		self.calls.borrow_mut().push(command.clone());
		match self.responses.get(&command) {
			Some(Response::Output(out)) => Ok(out.clone()),
			Some(Response::Failure(code)) => Err(CallError::NonZeroExit {
				command,
				code: Some(*code),
				stderr: "scripted failure".to_string(),
			}),
			None => Err(CallError::NonZeroExit {
				command,
				code: Some(127),
				stderr: "unexpected command".to_string(),
			}),
		}
	}
}

impl CommandRunner for FakeRunner {
	async fn capture(&self, invocation: &Invocation) -> Result<String, CallError> {
		self.respond(invocation)
	}

	async fn stream_to(&self, invocation: &Invocation, dest: &Path) -> Result<(), CallError> {
		let out = self.respond(invocation)?;
		fs::write(dest, out).map_err(|source| CallError::Sink {
			command: invocation.to_string(),
			path: dest.to_path_buf(),
			source,
		})
	}
}
