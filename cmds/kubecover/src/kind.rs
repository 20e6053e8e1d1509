//! Classification of a rendered resource set into a kuttl test step type.

use std::fmt;

use crate::manifest::Resource;

/// Resource kinds from kuttl.
pub const TEST_ASSERT_KIND: &str = "TestAssert";
pub const TEST_STEP_KIND: &str = "TestStep";

/// Ordering prefix of the single staged test file.
const STEP_INDEX: &str = "01";

/// Which kind of kuttl test file a rendered resource set becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TestKind {
	/// Resources are applied to the cluster.
	#[default]
	Step,
	/// Resources describe the state the cluster is expected to be in.
	Assert,
}

impl TestKind {
	pub fn as_str(self) -> &'static str {
		match self {
			TestKind::Step => TEST_STEP_KIND,
			TestKind::Assert => TEST_ASSERT_KIND,
		}
	}

	/// Name of the staged file, as kuttl expects it: `01-step.yaml` or `01-assert.yaml`.
	pub fn file_name(self) -> String {
		let suffix = match self {
			TestKind::Step => "step",
			TestKind::Assert => "assert",
		};
		format!("{STEP_INDEX}-{suffix}.yaml")
	}
}

impl fmt::Display for TestKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A set containing any `TestAssert` resource is an assertion; everything else is a step.
pub fn classify<'a>(resources: impl IntoIterator<Item = &'a Resource>) -> TestKind {
	if resources
		.into_iter()
		.any(|res| res.kind() == Some(TEST_ASSERT_KIND))
	{
		TestKind::Assert
	} else {
		TestKind::Step
	}
}
