//! Run command handler.
//!
//! Each path is one phase of a single test: phases run in order against the
//! same namespace, and resources from earlier phases stay in the cluster.

use std::{io::Write, path::PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use crate::{
	config::KubecoverConfig,
	harness::{KustomizedHarness, StageOptions},
	render::Renderer,
	runner::TestRunner,
};

#[derive(Args)]
pub struct RunArgs {
	/// Directories containing a kustomization, run in order
	#[arg(required = true)]
	pub paths: Vec<PathBuf>,

	/// Namespace shared by all phases
	#[arg(short, long)]
	pub namespace: String,

	/// Keep staging directories instead of removing them after each phase
	#[arg(long)]
	pub keep: bool,

	/// kuttl step timeout in seconds
	#[arg(long)]
	pub timeout: Option<u64>,
}

/// Run every phase, stopping at the first failure.
pub fn run<W: Write>(args: RunArgs, config: &KubecoverConfig, writer: W) -> Result<()> {
	let renderer = config.renderer()?;
	let mut runner = config.runner()?;
	if let Some(timeout) = args.timeout {
		runner = runner.with_timeout(timeout);
	}

	run_phases(&args, &renderer, &runner, &config.stage_options(), writer)
}

pub fn run_phases<W: Write>(
	args: &RunArgs,
	renderer: &dyn Renderer,
	runner: &dyn TestRunner,
	options: &StageOptions,
	mut writer: W,
) -> Result<()> {
	for path in &args.paths {
		let harness = KustomizedHarness::stage(path, &args.namespace, renderer, options)
			.with_context(|| format!("failed to stage {}", path.display()))?;

		let result = harness.run(runner);
		if args.keep {
			info!(harness_dir = %harness.harness_dir().display(), "keeping test harness");
		} else {
			harness.cleanup();
		}
		let report = result.with_context(|| format!("phase {} failed", path.display()))?;

		writeln!(
			writer,
			"ok {} ({}, {:.2}s)",
			path.display(),
			harness.test_kind(),
			report.duration.as_secs_f64()
		)?;
	}
	Ok(())
}
