//! Staging of rendered manifests as a kuttl test case.
//!
//! A [`KustomizedHarness`] renders one directory, decides whether the result
//! is a test step or an assertion, and writes it where kuttl expects it:
//!
//! ```text
//! <temp root>/test-harness-<name><random>/<name>/01-{step|assert}.yaml
//! ```
//!
//! The staging directory belongs to the harness until [`KustomizedHarness::cleanup`]
//! is called. Resources created in the cluster by a run are left in place so
//! that later phases of the same test can build on them.

use std::{
	collections::HashSet,
	ffi::OsStr,
	fs, io,
	path::{Component, Path, PathBuf},
};

use bon::Builder;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::{
	kind::{self, TestKind},
	render::{CommandRenderer, RenderError, Renderer},
	runner::{RunError, RunReport, TestRunner},
};

/// Prefix of every staging directory name.
const HARNESS_DIR_PREFIX: &str = "test-harness-";

/// Errors that can occur while staging a harness.
#[derive(Debug, Error)]
pub enum HarnessError {
	#[error("namespace must not be empty")]
	EmptyNamespace,

	#[error("cannot derive a test name from `{}`", .0.display())]
	InvalidPath(PathBuf),

	#[error(transparent)]
	Render(#[from] RenderError),

	#[error("failed to serialize rendered resources")]
	Serialize(#[source] serde_yaml::Error),

	#[error("{action} `{}`", path.display())]
	Io {
		action: &'static str,
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("`{0}` would be written to the test directory more than once")]
	AuxiliaryConflict(String),

	#[error("auxiliary file `{}` must be a relative path inside the rendered directory", .0.display())]
	AuxiliaryOutsideInput(PathBuf),
}

fn io_error<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> HarnessError + 'a {
	move |source| HarnessError::Io {
		action,
		path: path.to_path_buf(),
		source,
	}
}

/// What the test harness is pointed at. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
	/// Directories whose subdirectories are kuttl test cases.
	pub test_dirs: Vec<PathBuf>,
	/// Namespace the test runs in. kuttl does not create or delete it.
	pub namespace: String,
	/// Leave applied resources in the cluster after the run.
	pub skip_delete: bool,
}

impl HarnessConfig {
	/// Config for a single test directory; resources are kept for later phases.
	pub fn new(test_dir: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
		Self {
			test_dirs: vec![test_dir.into()],
			namespace: namespace.into(),
			skip_delete: true,
		}
	}
}

/// Optional knobs for [`KustomizedHarness::stage`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Builder)]
pub struct StageOptions {
	/// Directory the staging directory is created in. Defaults to the system temp dir.
	#[builder(into)]
	pub temp_root: Option<PathBuf>,

	/// Files that are not part of the kustomization but are needed by a test step
	/// (scripts run by a `TestStep`, for example). Paths are relative to the
	/// rendered directory and are copied next to the rendered file.
	#[builder(default)]
	pub auxiliary_files: Vec<PathBuf>,
}

/// A rendered, staged kuttl test case.
#[derive(Debug)]
pub struct KustomizedHarness {
	config: HarnessConfig,
	harness_dir: PathBuf,
	test_name: String,
	test_kind: TestKind,
}

impl KustomizedHarness {
	/// Render `path` with `kustomize build` and stage it for a run in `namespace`.
	pub fn new(path: impl AsRef<Path>, namespace: &str) -> Result<Self, HarnessError> {
		Self::stage(
			path.as_ref(),
			namespace,
			&CommandRenderer::default(),
			&StageOptions::default(),
		)
	}

	/// Render `path` with `renderer` and stage the result.
	///
	/// Nothing is left on disk when this fails: the staging directory is only
	/// handed over to the harness once the test file has been written.
	#[instrument(skip(path, renderer, options), fields(path = %path.display()))]
	pub fn stage(
		path: &Path,
		namespace: &str,
		renderer: &dyn Renderer,
		options: &StageOptions,
	) -> Result<Self, HarnessError> {
		if namespace.is_empty() {
			return Err(HarnessError::EmptyNamespace);
		}
		let test_name = test_name(path)?;

		let resources = renderer.render(path)?;
		let test_kind = kind::classify(&resources);
		info!(test_kind = %test_kind, resources = resources.len(), "classified rendered resources");

		let manifest = resources.to_yaml().map_err(HarnessError::Serialize)?;
		check_auxiliary_files(test_kind, &options.auxiliary_files)?;

		let prefix = format!("{HARNESS_DIR_PREFIX}{test_name}");
		let mut builder = tempfile::Builder::new();
		builder.prefix(&prefix);
		let temp_root = options.temp_root.clone().unwrap_or_else(std::env::temp_dir);
		let staging = builder
			.tempdir_in(&temp_root)
			.map_err(io_error("failed to create harness directory in", &temp_root))?;

		let test_dir = staging.path().join(&test_name);
		fs::create_dir(&test_dir).map_err(io_error("failed to create test directory", &test_dir))?;

		let test_file = test_dir.join(test_kind.file_name());
		fs::write(&test_file, manifest).map_err(io_error("failed to write", &test_file))?;

		for file in &options.auxiliary_files {
			let source = path.join(file);
			// Names were validated by check_auxiliary_files.
			let Some(name) = file.file_name() else {
				continue;
			};
			let dest = test_dir.join(name);
			fs::copy(&source, &dest).map_err(io_error("failed to copy auxiliary file", &source))?;
			debug!(file = %dest.display(), "copied auxiliary file");
		}

		let harness_dir = staging.keep();
		info!(harness_dir = %harness_dir.display(), "staged test harness");

		Ok(Self {
			config: HarnessConfig::new(harness_dir.clone(), namespace),
			harness_dir,
			test_name,
			test_kind,
		})
	}

	/// Hand the staged suite to a test runner.
	pub fn run(&self, runner: &dyn TestRunner) -> Result<RunReport, RunError> {
		info!(
			test = %self.test_name,
			test_kind = %self.test_kind,
			namespace = %self.config.namespace,
			"running test harness"
		);
		runner.run(&self.config)
	}

	/// Delete every file generated for this harness.
	///
	/// Safe to call more than once. Failures are logged, never returned.
	/// Resources created in the cluster are not touched.
	pub fn cleanup(&self) {
		info!(harness_dir = %self.harness_dir.display(), "cleaning up");
		match fs::remove_dir_all(&self.harness_dir) {
			Ok(()) => {}
			Err(err) if err.kind() == io::ErrorKind::NotFound => {}
			Err(err) => warn!(
				harness_dir = %self.harness_dir.display(),
				error = %err,
				"failed to remove test harness directory"
			),
		}
	}

	pub fn config(&self) -> &HarnessConfig {
		&self.config
	}

	pub fn harness_dir(&self) -> &Path {
		&self.harness_dir
	}

	/// The kuttl test case directory inside the harness directory.
	pub fn test_dir(&self) -> PathBuf {
		self.harness_dir.join(&self.test_name)
	}

	pub fn test_file(&self) -> PathBuf {
		self.test_dir().join(self.test_kind.file_name())
	}

	pub fn test_name(&self) -> &str {
		&self.test_name
	}

	pub fn test_kind(&self) -> TestKind {
		self.test_kind
	}
}

/// Base name of the rendered directory, used for both directory levels.
///
/// Paths like `.` have no base name of their own; the canonical path is tried then.
fn test_name(path: &Path) -> Result<String, HarnessError> {
	let name = match path.file_name() {
		Some(name) => Some(name.to_os_string()),
		None => path
			.canonicalize()
			.ok()
			.and_then(|canonical| canonical.file_name().map(OsStr::to_os_string)),
	};

	name.and_then(|name| name.into_string().ok())
		.ok_or_else(|| HarnessError::InvalidPath(path.to_path_buf()))
}

/// Every auxiliary file must stay inside the rendered directory and land under
/// a name not taken by the rendered file or another auxiliary file.
fn check_auxiliary_files(test_kind: TestKind, files: &[PathBuf]) -> Result<(), HarnessError> {
	let staged = test_kind.file_name();
	let mut taken = HashSet::from([OsStr::new(&staged)]);
	for file in files {
		if file
			.components()
			.any(|component| !matches!(component, Component::Normal(_) | Component::CurDir))
		{
			return Err(HarnessError::AuxiliaryOutsideInput(file.clone()));
		}
		let Some(name) = file.file_name() else {
			return Err(HarnessError::InvalidPath(file.clone()));
		};
		if !taken.insert(name) {
			return Err(HarnessError::AuxiliaryConflict(name.to_string_lossy().into_owned()));
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use std::fs;

	use assert_matches::assert_matches;
	use indoc::indoc;
	use tempfile::TempDir;

	use super::*;
	use crate::{
		manifest::ResourceList,
		test_utils::{FailingRenderer, RecordingRunner, StaticRenderer},
	};

	const CONFIGMAP: &str = indoc! {"
		apiVersion: v1
		kind: ConfigMap
		metadata:
		  name: game-demo0
		data:
		  lives: \"3\"
	"};

	const ASSERT_AND_CONFIGMAP: &str = indoc! {"
		apiVersion: kuttl.dev/v1beta1
		kind: TestAssert
		metadata:
		  name: configmap-exists
		timeout: 30
		---
		apiVersion: v1
		kind: ConfigMap
		metadata:
		  name: game-demo0
	"};

	fn stage_in(temp: &TempDir, name: &str, yaml: &str) -> Result<KustomizedHarness, HarnessError> {
		let options = StageOptions::builder().temp_root(temp.path()).build();
		KustomizedHarness::stage(
			Path::new("testdata").join(name).as_path(),
			"test11",
			&StaticRenderer::from_yaml(yaml),
			&options,
		)
	}

	fn dir_entries(dir: &Path) -> Vec<String> {
		let mut names: Vec<String> = fs::read_dir(dir)
			.unwrap()
			.map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
			.collect();
		names.sort();
		names
	}

	#[test]
	fn test_configmap_only_is_a_step() {
		let temp = TempDir::new().unwrap();
		let harness = stage_in(&temp, "separate-cm", CONFIGMAP).unwrap();

		assert_eq!(harness.test_kind(), TestKind::Step);
		assert_eq!(harness.test_name(), "separate-cm");
		assert_eq!(dir_entries(harness.harness_dir()), vec!["separate-cm"]);
		assert_eq!(dir_entries(&harness.test_dir()), vec!["01-step.yaml"]);

		let staged = fs::read_to_string(harness.test_file()).unwrap();
		let resources = ResourceList::from_yaml(&staged).unwrap();
		assert_eq!(resources.kinds(), vec!["ConfigMap"]);
		assert_eq!(resources.resources()[0].name(), Some("game-demo0"));
	}

	#[test]
	fn test_assert_anywhere_makes_an_assert() {
		let temp = TempDir::new().unwrap();
		let harness = stage_in(&temp, "configmap-exists", ASSERT_AND_CONFIGMAP).unwrap();

		assert_eq!(harness.test_kind(), TestKind::Assert);
		assert_eq!(dir_entries(&harness.test_dir()), vec!["01-assert.yaml"]);

		let staged = fs::read_to_string(harness.test_file()).unwrap();
		let resources = ResourceList::from_yaml(&staged).unwrap();
		assert_eq!(resources.kinds(), vec!["TestAssert", "ConfigMap"]);
	}

	#[test]
	fn test_staged_file_matches_rendered_yaml() {
		let temp = TempDir::new().unwrap();
		let renderer = StaticRenderer::from_yaml(ASSERT_AND_CONFIGMAP);
		let harness = KustomizedHarness::stage(
			Path::new("configmap-exists"),
			"test11",
			&renderer,
			&StageOptions::builder().temp_root(temp.path()).build(),
		)
		.unwrap();

		let staged = fs::read_to_string(harness.test_file()).unwrap();
		assert_eq!(staged, renderer.resources().to_yaml().unwrap());
	}

	#[test]
	fn test_harness_dir_layout_and_config() {
		let temp = TempDir::new().unwrap();
		let harness = stage_in(&temp, "separate-cm", CONFIGMAP).unwrap();

		let dir_name = harness
			.harness_dir()
			.file_name()
			.unwrap()
			.to_string_lossy()
			.into_owned();
		assert!(dir_name.starts_with("test-harness-separate-cm"), "{dir_name}");
		assert_eq!(harness.harness_dir().parent(), Some(temp.path()));

		assert_eq!(
			harness.config(),
			&HarnessConfig {
				test_dirs: vec![harness.harness_dir().to_path_buf()],
				namespace: "test11".to_string(),
				skip_delete: true,
			}
		);
	}

	#[test]
	fn test_harnesses_get_independent_dirs() {
		let temp = TempDir::new().unwrap();
		let first = stage_in(&temp, "separate-cm", CONFIGMAP).unwrap();
		let second = stage_in(&temp, "separate-cm", CONFIGMAP).unwrap();

		assert_ne!(first.harness_dir(), second.harness_dir());
		first.cleanup();
		assert!(second.test_file().exists());
	}

	#[test]
	fn test_render_error_is_propagated() {
		let temp = TempDir::new().unwrap();
		let options = StageOptions::builder().temp_root(temp.path()).build();

		let result = KustomizedHarness::stage(
			Path::new("missing-base"),
			"test11",
			&FailingRenderer,
			&options,
		);

		assert_matches!(result, Err(HarnessError::Render(RenderError::Failed { .. })));
		assert!(dir_entries(temp.path()).is_empty());
	}

	#[test]
	fn test_nonexistent_path_with_command_renderer() {
		let temp = TempDir::new().unwrap();
		let missing = temp.path().join("nope");

		let result = KustomizedHarness::new(&missing, "test11");
		assert_matches!(result, Err(HarnessError::Render(RenderError::PathNotFound(_))));
	}

	#[test]
	fn test_empty_namespace() {
		let temp = TempDir::new().unwrap();
		let options = StageOptions::builder().temp_root(temp.path()).build();

		let result = KustomizedHarness::stage(
			Path::new("separate-cm"),
			"",
			&StaticRenderer::from_yaml(CONFIGMAP),
			&options,
		);
		assert_matches!(result, Err(HarnessError::EmptyNamespace));
	}

	#[test]
	fn test_missing_temp_root() {
		let temp = TempDir::new().unwrap();
		let options = StageOptions::builder()
			.temp_root(temp.path().join("missing"))
			.build();

		let result = KustomizedHarness::stage(
			Path::new("separate-cm"),
			"test11",
			&StaticRenderer::from_yaml(CONFIGMAP),
			&options,
		);
		assert_matches!(result, Err(HarnessError::Io { .. }));
	}

	#[test]
	fn test_test_name() {
		assert_eq!(test_name(Path::new("testdata/separate-cm")).unwrap(), "separate-cm");
		assert_eq!(test_name(Path::new("testdata/separate-cm/")).unwrap(), "separate-cm");

		let cwd = std::env::current_dir().unwrap();
		let expected = cwd.file_name().unwrap().to_str().unwrap();
		assert_eq!(test_name(Path::new(".")).unwrap(), expected);

		assert_matches!(test_name(Path::new("/")), Err(HarnessError::InvalidPath(_)));
	}

	#[test]
	fn test_cleanup_is_idempotent() {
		let temp = TempDir::new().unwrap();
		let harness = stage_in(&temp, "separate-cm", CONFIGMAP).unwrap();
		assert!(harness.harness_dir().exists());

		harness.cleanup();
		assert!(!harness.harness_dir().exists());

		harness.cleanup();
		assert!(!harness.harness_dir().exists());
		assert!(dir_entries(temp.path()).is_empty());
	}

	#[test]
	fn test_run_hands_config_to_runner() {
		let temp = TempDir::new().unwrap();
		let harness = stage_in(&temp, "configmap-exists", ASSERT_AND_CONFIGMAP).unwrap();
		let runner = RecordingRunner::passing();

		harness.run(&runner).unwrap();
		harness.run(&runner).unwrap();

		assert_eq!(runner.calls(), vec![harness.config().clone(); 2]);
	}

	#[test]
	fn test_run_failure_is_returned() {
		let temp = TempDir::new().unwrap();
		let harness = stage_in(&temp, "separate-cm", CONFIGMAP).unwrap();

		let result = harness.run(&RecordingRunner::failing(1));
		assert_matches!(result, Err(RunError::Failed { code: Some(1), .. }));
	}

	#[test]
	fn test_auxiliary_files_are_copied() {
		let temp = TempDir::new().unwrap();
		let source = TempDir::new().unwrap();
		let input = source.path().join("kubectl-create");
		fs::create_dir_all(input.join("scripts")).unwrap();
		fs::write(input.join("scripts/create.sh"), "kubectl create cm x\n").unwrap();

		let options = StageOptions::builder()
			.temp_root(temp.path())
			.auxiliary_files(vec![PathBuf::from("scripts/create.sh")])
			.build();
		let harness = KustomizedHarness::stage(
			&input,
			"test11",
			&StaticRenderer::from_yaml("apiVersion: kuttl.dev/v1beta1\nkind: TestStep\n"),
			&options,
		)
		.unwrap();

		assert_eq!(
			dir_entries(&harness.test_dir()),
			vec!["01-step.yaml", "create.sh"]
		);
		assert_eq!(
			fs::read_to_string(harness.test_dir().join("create.sh")).unwrap(),
			"kubectl create cm x\n"
		);
	}

	#[test]
	fn test_missing_auxiliary_file_leaves_nothing_behind() {
		let temp = TempDir::new().unwrap();
		let source = TempDir::new().unwrap();
		let input = source.path().join("kubectl-create");
		fs::create_dir_all(&input).unwrap();

		let options = StageOptions::builder()
			.temp_root(temp.path())
			.auxiliary_files(vec![PathBuf::from("missing.sh")])
			.build();
		let result = KustomizedHarness::stage(
			&input,
			"test11",
			&StaticRenderer::from_yaml(CONFIGMAP),
			&options,
		);

		assert_matches!(result, Err(HarnessError::Io { .. }));
		assert!(dir_entries(temp.path()).is_empty());
	}

	#[test]
	fn test_auxiliary_file_conflict() {
		let temp = TempDir::new().unwrap();
		let options = StageOptions::builder()
			.temp_root(temp.path())
			.auxiliary_files(vec![PathBuf::from("extra/01-assert.yaml")])
			.build();

		let result = KustomizedHarness::stage(
			Path::new("configmap-exists"),
			"test11",
			&StaticRenderer::from_yaml(ASSERT_AND_CONFIGMAP),
			&options,
		);

		assert_matches!(result, Err(HarnessError::AuxiliaryConflict(name)) if name == "01-assert.yaml");
		assert!(dir_entries(temp.path()).is_empty());
	}

	#[test]
	fn test_auxiliary_files_with_same_name() {
		let temp = TempDir::new().unwrap();
		let source = TempDir::new().unwrap();
		let input = source.path().join("kubectl-create");
		for (dir, content) in [("a", "A\n"), ("b", "B\n")] {
			fs::create_dir_all(input.join(dir)).unwrap();
			fs::write(input.join(dir).join("run.sh"), content).unwrap();
		}

		let options = StageOptions::builder()
			.temp_root(temp.path())
			.auxiliary_files(vec![PathBuf::from("a/run.sh"), PathBuf::from("b/run.sh")])
			.build();
		let result = KustomizedHarness::stage(
			&input,
			"test11",
			&StaticRenderer::from_yaml(CONFIGMAP),
			&options,
		);

		assert_matches!(result, Err(HarnessError::AuxiliaryConflict(name)) if name == "run.sh");
		assert!(dir_entries(temp.path()).is_empty());
	}

	#[test]
	fn test_auxiliary_files_outside_input_are_rejected() {
		let temp = TempDir::new().unwrap();
		let source = TempDir::new().unwrap();
		let input = source.path().join("kubectl-create");
		fs::create_dir_all(&input).unwrap();
		fs::write(source.path().join("secret.txt"), "outside\n").unwrap();
		let absolute = source.path().join("secret.txt");

		for file in [PathBuf::from("../secret.txt"), absolute] {
			let options = StageOptions::builder()
				.temp_root(temp.path())
				.auxiliary_files(vec![file.clone()])
				.build();
			let result = KustomizedHarness::stage(
				&input,
				"test11",
				&StaticRenderer::from_yaml(CONFIGMAP),
				&options,
			);

			assert_matches!(result, Err(HarnessError::AuxiliaryOutsideInput(path)) if path == file);
		}
		assert!(dir_entries(temp.path()).is_empty());
	}
}
