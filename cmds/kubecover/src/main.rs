use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use kubecover::{commands, telemetry};
use tracing::Level;

#[derive(Parser)]
#[command(name = "kubecover")]
#[command(about = "Run kustomized manifests as kuttl test steps", long_about = None)]
#[command(version)]
struct Cli {
	/// Log level (trace, debug, info, warn, error). Defaults to RUST_LOG, then info
	#[arg(long, global = true)]
	log_level: Option<Level>,

	/// Config file to use instead of searching for .kubecover.yaml
	#[arg(long, global = true)]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Print the rendered manifests of a test directory
	Render(commands::render::RenderArgs),

	/// Stage a test directory for kuttl and print the staged file
	Stage(commands::stage::StageArgs),

	/// Stage and run test directories as consecutive phases
	Run(commands::run::RunArgs),
}

impl Commands {
	/// Directory the config file search starts from.
	fn start_dir(&self) -> &Path {
		match self {
			Commands::Render(args) => &args.path,
			Commands::Stage(args) => &args.path,
			Commands::Run(args) => args.paths.first().map_or(Path::new("."), PathBuf::as_path),
		}
	}
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	telemetry::init(cli.log_level)?;

	let config = commands::load_config(cli.config.as_deref(), cli.command.start_dir())?;
	let stdout = std::io::stdout().lock();

	match cli.command {
		Commands::Render(args) => commands::render::run(args, &config, stdout),
		Commands::Stage(args) => commands::stage::run(args, &config, stdout),
		Commands::Run(args) => commands::run::run(args, &config, stdout),
	}
}
