//! Execution of staged test suites by a kuttl-compatible harness.

use std::{
	io::{self, Write},
	path::PathBuf,
	process::{Command, Stdio},
	time::{Duration, Instant},
};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::{harness::HarnessConfig, render::exit_status};

const TEST_SUITE_API_VERSION: &str = "kuttl.dev/v1beta1";
const TEST_SUITE_KIND: &str = "TestSuite";

/// Errors that can occur while running a test suite.
#[derive(Debug, Error)]
pub enum RunError {
	#[error("test harness `{program}` was not found in PATH")]
	ProgramNotFound {
		program: String,
		#[source]
		source: which::Error,
	},

	#[error("failed to serialize test suite configuration")]
	SerializeSuite(#[source] serde_yaml::Error),

	#[error("failed to write test suite configuration")]
	WriteSuite(#[source] io::Error),

	#[error("failed to execute test harness `{program}`")]
	Spawn {
		program: String,
		#[source]
		source: io::Error,
	},

	#[error("test harness failed ({}):\n{stdout}{stderr}", exit_status(*code))]
	Failed {
		code: Option<i32>,
		stdout: String,
		stderr: String,
	},
}

/// Outcome of a passing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
	pub exit_code: i32,
	pub stdout: String,
	pub stderr: String,
	pub duration: Duration,
}

/// Executes apply and assert steps of a staged suite against a cluster.
pub trait TestRunner {
	fn run(&self, config: &HarnessConfig) -> Result<RunReport, RunError>;
}

/// kuttl `TestSuite` configuration document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSuite<'a> {
	api_version: &'static str,
	kind: &'static str,
	test_dirs: &'a [PathBuf],
	namespace: &'a str,
	skip_delete: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	timeout: Option<u64>,
}

impl<'a> TestSuite<'a> {
	pub fn new(config: &'a HarnessConfig, timeout: Option<u64>) -> Self {
		Self {
			api_version: TEST_SUITE_API_VERSION,
			kind: TEST_SUITE_KIND,
			test_dirs: &config.test_dirs,
			namespace: &config.namespace,
			skip_delete: config.skip_delete,
			timeout,
		}
	}

	pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
		serde_yaml::to_string(self)
	}
}

/// Runs `kubectl kuttl test --config <suite>` (or another command with the same CLI).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KuttlRunner {
	program: String,
	args: Vec<String>,
	timeout: Option<u64>,
}

impl Default for KuttlRunner {
	fn default() -> Self {
		Self::new("kubectl", ["kuttl", "test"])
	}
}

impl KuttlRunner {
	pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			program: program.into(),
			args: args.into_iter().map(Into::into).collect(),
			timeout: None,
		}
	}

	/// Returns `None` for an empty command.
	pub fn from_command(command: &[String]) -> Option<Self> {
		let (program, args) = command.split_first()?;
		Some(Self::new(program.clone(), args.iter().cloned()))
	}

	/// Per-step timeout in seconds, written to the suite configuration.
	#[must_use]
	pub fn with_timeout(mut self, seconds: u64) -> Self {
		self.timeout = Some(seconds);
		self
	}

	pub fn program(&self) -> &str {
		&self.program
	}

	pub fn timeout(&self) -> Option<u64> {
		self.timeout
	}
}

impl TestRunner for KuttlRunner {
	#[instrument(skip_all, fields(program = %self.program, namespace = %config.namespace))]
	fn run(&self, config: &HarnessConfig) -> Result<RunReport, RunError> {
		let executable = which::which(&self.program).map_err(|source| RunError::ProgramNotFound {
			program: self.program.clone(),
			source,
		})?;

		let suite = TestSuite::new(config, self.timeout)
			.to_yaml()
			.map_err(RunError::SerializeSuite)?;

		// Kept outside the staging directory, which holds test cases only.
		let mut suite_file = tempfile::Builder::new()
			.prefix("kuttl-test-")
			.suffix(".yaml")
			.tempfile()
			.map_err(RunError::WriteSuite)?;
		suite_file
			.write_all(suite.as_bytes())
			.and_then(|()| suite_file.flush())
			.map_err(RunError::WriteSuite)?;

		debug!(suite = %suite_file.path().display(), args = ?self.args, "running test harness");

		let start = Instant::now();
		let output = Command::new(&executable)
			.args(&self.args)
			.arg("--config")
			.arg(suite_file.path())
			.stdin(Stdio::null())
			.output()
			.map_err(|source| RunError::Spawn {
				program: self.program.clone(),
				source,
			})?;
		let duration = start.elapsed();

		let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
		let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
		debug!(?duration, %stdout, %stderr, "test harness finished");

		if !output.status.success() {
			return Err(RunError::Failed {
				code: output.status.code(),
				stdout,
				stderr,
			});
		}

		Ok(RunReport {
			exit_code: output.status.code().unwrap_or_default(),
			stdout,
			stderr,
			duration,
		})
	}
}
