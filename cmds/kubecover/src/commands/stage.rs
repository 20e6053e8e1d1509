//! Stage command handler.

use std::{io::Write, path::PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use crate::{config::KubecoverConfig, harness::KustomizedHarness};

#[derive(Args)]
pub struct StageArgs {
	/// Directory containing a kustomization
	pub path: PathBuf,

	/// Namespace the staged suite targets
	#[arg(short, long)]
	pub namespace: String,

	/// Extra files, relative to PATH, copied next to the rendered test file
	#[arg(long = "aux")]
	pub auxiliary_files: Vec<PathBuf>,
}

/// Stage a test case and print where it was written. The directory is kept.
pub fn run<W: Write>(args: StageArgs, config: &KubecoverConfig, mut writer: W) -> Result<()> {
	let renderer = config.renderer()?;
	let mut options = config.stage_options();
	options.auxiliary_files = args.auxiliary_files;

	let harness = KustomizedHarness::stage(&args.path, &args.namespace, &renderer, &options)
		.with_context(|| format!("failed to stage {}", args.path.display()))?;

	writeln!(writer, "{}", harness.test_file().display())?;
	Ok(())
}
