//! Configuration file support for kubecover
//!
//! A `.kubecover.yaml` file can be placed anywhere above the test directories.
//! kubecover searches from the first test directory upward to the filesystem root.

use std::{
	fs,
	path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{harness::StageOptions, render::CommandRenderer, runner::KuttlRunner};

/// The name of the config file kubecover looks for
pub const CONFIG_FILE_NAME: &str = ".kubecover.yaml";

/// Root configuration structure for .kubecover.yaml
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubecoverConfig {
	/// How manifests are rendered
	#[serde(default)]
	pub renderer: RendererConfig,

	/// How staged suites are executed
	#[serde(default)]
	pub harness: HarnessRunnerConfig,

	/// Where staging directories are created instead of the system temp dir
	#[serde(default)]
	pub temp_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RendererConfig {
	/// Command line the input path is appended to, e.g. `[kubectl, kustomize]`.
	#[serde(default)]
	pub command: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarnessRunnerConfig {
	/// Command line `--config <suite>` is appended to, e.g. `[kubectl-kuttl, test]`.
	#[serde(default)]
	pub command: Option<Vec<String>>,

	/// kuttl step timeout in seconds
	#[serde(default)]
	pub timeout: Option<u64>,
}

impl KubecoverConfig {
	/// Load config by searching from the given directory upward
	pub fn load_from_directory(start_dir: &Path) -> Result<Option<Self>> {
		if let Some(config_path) = find_config_file(start_dir) {
			let config = Self::load_from_file(&config_path)?;
			Ok(Some(config))
		} else {
			Ok(None)
		}
	}

	/// Load config from a specific file path. An empty file is the default config.
	///
	/// A relative `tempRoot` is resolved against the directory holding the file.
	pub fn load_from_file(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path)
			.with_context(|| format!("failed to read config file: {}", path.display()))?;
		if content.trim().is_empty() {
			return Ok(Self::default());
		}
		let mut config: KubecoverConfig = serde_yaml::from_str(&content)
			.with_context(|| format!("failed to parse config file: {}", path.display()))?;
		if let Some(base) = path.parent() {
			// Joining an absolute path yields it unchanged.
			config.temp_root = config.temp_root.map(|root| base.join(root));
		}
		Ok(config)
	}

	pub fn renderer(&self) -> Result<CommandRenderer> {
		match &self.renderer.command {
			None => Ok(CommandRenderer::default()),
			Some(command) => CommandRenderer::from_command(command)
				.context("renderer.command must not be empty"),
		}
	}

	pub fn runner(&self) -> Result<KuttlRunner> {
		let runner = match &self.harness.command {
			None => KuttlRunner::default(),
			Some(command) => {
				KuttlRunner::from_command(command).context("harness.command must not be empty")?
			}
		};
		Ok(match self.harness.timeout {
			Some(timeout) => runner.with_timeout(timeout),
			None => runner,
		})
	}

	pub fn stage_options(&self) -> StageOptions {
		StageOptions {
			temp_root: self.temp_root.clone(),
			..StageOptions::default()
		}
	}
}

/// Search for a config file starting from `start_dir` and walking up to the filesystem root
pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
	let start = start_dir
		.canonicalize()
		.unwrap_or_else(|_| start_dir.to_path_buf());

	start
		.ancestors()
		.map(|dir| dir.join(CONFIG_FILE_NAME))
		.find(|candidate| candidate.is_file())
}
