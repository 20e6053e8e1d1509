//! Render command handler.

use std::{io::Write, path::PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use crate::{config::KubecoverConfig, kind, render::Renderer};

#[derive(Args)]
pub struct RenderArgs {
	/// Directory containing a kustomization
	pub path: PathBuf,
}

/// Print the rendered manifests, exactly as they would be staged.
pub fn run<W: Write>(args: RenderArgs, config: &KubecoverConfig, mut writer: W) -> Result<()> {
	let renderer = config.renderer()?;
	let resources = renderer
		.render(&args.path)
		.with_context(|| format!("failed to render {}", args.path.display()))?;

	tracing::info!(test_kind = %kind::classify(&resources), "rendered");

	writer.write_all(resources.to_yaml()?.as_bytes())?;
	writer.flush()?;
	Ok(())
}
