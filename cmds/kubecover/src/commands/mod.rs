pub mod render;
pub mod run;
pub mod stage;

use std::path::Path;

use anyhow::Result;
use tracing::debug;

use crate::config::KubecoverConfig;

/// Load the config given with `--config`, or search upward from `start_dir`.
pub fn load_config(explicit: Option<&Path>, start_dir: &Path) -> Result<KubecoverConfig> {
	if let Some(path) = explicit {
		return KubecoverConfig::load_from_file(path);
	}

	match KubecoverConfig::load_from_directory(start_dir)? {
		Some(config) => Ok(config),
		None => {
			debug!(start_dir = %start_dir.display(), "no config file found, using defaults");
			Ok(KubecoverConfig::default())
		}
	}
}
