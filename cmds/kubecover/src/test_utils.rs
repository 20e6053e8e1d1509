//! Common test utilities.

use std::{cell::RefCell, path::Path, time::Duration};

use crate::{
	harness::HarnessConfig,
	manifest::ResourceList,
	render::{RenderError, Renderer},
	runner::{RunError, RunReport, TestRunner},
};

/// A renderer that returns the same resources for every path.
pub struct StaticRenderer {
	resources: ResourceList,
}

impl StaticRenderer {
	pub fn new(resources: ResourceList) -> Self {
		Self { resources }
	}

	pub fn from_yaml(yaml: &str) -> Self {
		Self::new(ResourceList::from_yaml(yaml).expect("test YAML should parse"))
	}

	pub fn resources(&self) -> &ResourceList {
		&self.resources
	}
}

impl Renderer for StaticRenderer {
	fn render(&self, _path: &Path) -> Result<ResourceList, RenderError> {
		Ok(self.resources.clone())
	}
}

/// A renderer that fails the way kustomize does on a missing base.
pub struct FailingRenderer;

impl Renderer for FailingRenderer {
	fn render(&self, path: &Path) -> Result<ResourceList, RenderError> {
		Err(RenderError::Failed {
			path: path.to_path_buf(),
			code: Some(1),
			stderr: "Error: accumulating resources: '../base' must resolve to a file".to_string(),
		})
	}
}

/// A runner that records every config it is given and never touches a cluster.
pub struct RecordingRunner {
	calls: RefCell<Vec<HarnessConfig>>,
	exit_code: i32,
}

impl RecordingRunner {
	pub fn passing() -> Self {
		Self::with_exit_code(0)
	}

	pub fn failing(exit_code: i32) -> Self {
		assert_ne!(exit_code, 0, "a failing run needs a non-zero exit code");
		Self::with_exit_code(exit_code)
	}

	fn with_exit_code(exit_code: i32) -> Self {
		Self {
			calls: RefCell::new(Vec::new()),
			exit_code,
		}
	}

	pub fn calls(&self) -> Vec<HarnessConfig> {
		self.calls.borrow().clone()
	}
}

impl TestRunner for RecordingRunner {
	fn run(&self, config: &HarnessConfig) -> Result<RunReport, RunError> {
		self.calls.borrow_mut().push(config.clone());
		if self.exit_code != 0 {
			return Err(RunError::Failed {
				code: Some(self.exit_code),
				stdout: String::new(),
				stderr: "--- FAIL: kuttl".to_string(),
			});
		}
		Ok(RunReport {
			exit_code: 0,
			stdout: "--- PASS: kuttl".to_string(),
			stderr: String::new(),
			duration: Duration::from_millis(5),
		})
	}
}
