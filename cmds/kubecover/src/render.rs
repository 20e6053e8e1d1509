//! Manifest rendering through an external kustomize engine.
//!
//! kubecover never merges overlays itself. A [`Renderer`] turns a directory
//! into an ordered [`ResourceList`]; the default one shells out to
//! `kustomize build` and parses its YAML stream.

use std::{
	io,
	path::{Path, PathBuf},
	process::{Command, Stdio},
};

use thiserror::Error;
use tracing::{debug, instrument};

use crate::manifest::ResourceList;

/// Errors that can occur while rendering manifests.
#[derive(Debug, Error)]
pub enum RenderError {
	#[error("path `{}` does not exist", .0.display())]
	PathNotFound(PathBuf),

	#[error("renderer `{program}` was not found in PATH")]
	ProgramNotFound {
		program: String,
		#[source]
		source: which::Error,
	},

	#[error("failed to execute renderer `{program}`")]
	Spawn {
		program: String,
		#[source]
		source: io::Error,
	},

	#[error("rendering `{}` failed ({}):\n{stderr}", path.display(), exit_status(*code))]
	Failed {
		path: PathBuf,
		code: Option<i32>,
		stderr: String,
	},

	#[error("renderer produced invalid YAML for `{}`", path.display())]
	Parse {
		path: PathBuf,
		#[source]
		source: serde_yaml::Error,
	},
}

pub(crate) fn exit_status(code: Option<i32>) -> String {
	match code {
		Some(code) => format!("exit code {code}"),
		None => "terminated by signal".to_string(),
	}
}

/// Turns a directory of manifest sources into rendered resources.
pub trait Renderer {
	fn render(&self, path: &Path) -> Result<ResourceList, RenderError>;
}

impl<F> Renderer for F
where
	F: Fn(&Path) -> Result<ResourceList, RenderError>,
{
	fn render(&self, path: &Path) -> Result<ResourceList, RenderError> {
		self(path)
	}
}

/// Renders by running an external command with the input path as its last argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRenderer {
	program: String,
	args: Vec<String>,
}

impl Default for CommandRenderer {
	/// `kustomize build <path>`
	fn default() -> Self {
		Self::new("kustomize", ["build"])
	}
}

impl CommandRenderer {
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

	/// `kubectl kustomize <path>`, for machines that only have kubectl installed.
	pub fn kubectl() -> Self {
		Self::new("kubectl", ["kustomize"])
	}

	/// Build a renderer from a full command line such as `["kustomize", "build"]`.
	///
	/// Returns `None` for an empty command.
	pub fn from_command(command: &[String]) -> Option<Self> {
		let (program, args) = command.split_first()?;
		Some(Self::new(program.clone(), args.iter().cloned()))
	}

	pub fn program(&self) -> &str {
		&self.program
	}

	pub fn args(&self) -> &[String] {
		&self.args
	}
}

impl Renderer for CommandRenderer {
	#[instrument(skip(self), fields(program = %self.program))]
	fn render(&self, path: &Path) -> Result<ResourceList, RenderError> {
		if !path.exists() {
			return Err(RenderError::PathNotFound(path.to_path_buf()));
		}

		let executable =
			which::which(&self.program).map_err(|source| RenderError::ProgramNotFound {
				program: self.program.clone(),
				source,
			})?;

		debug!(executable = %executable.display(), args = ?self.args, "running renderer");

		let output = Command::new(&executable)
			.args(&self.args)
			.arg(path)
			.stdin(Stdio::null())
			.output()
			.map_err(|source| RenderError::Spawn {
				program: self.program.clone(),
				source,
			})?;

		if !output.status.success() {
			return Err(RenderError::Failed {
				path: path.to_path_buf(),
				code: output.status.code(),
				stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
			});
		}

		let stdout = String::from_utf8_lossy(&output.stdout);
		let resources = ResourceList::from_yaml(&stdout).map_err(|source| RenderError::Parse {
			path: path.to_path_buf(),
			source,
		})?;

		debug!(resources = resources.len(), "rendered");
		Ok(resources)
	}
}
