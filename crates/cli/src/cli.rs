use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "sonde")]
#[command(about = "Runs static analysis through an external engine and tracks its findings")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
	/// Verbose logging
	#[arg(short, long, global = true)]
	pub verbose: bool,

	/// Subcommand to execute.
	#[command(subcommand)]
	pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
	/// Analyze files of a project directory
	Analyze(AnalyzeArgs),
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
	/// Project base directory
	pub base_dir: PathBuf,

	/// Files to analyze, relative to the base directory (all files if omitted)
	pub files: Vec<String>,

	/// Settings file (defaults to <BASE_DIR>/sonde.toml)
	#[arg(long, value_name = "PATH")]
	pub config: Option<PathBuf>,

	/// Engine executable
	#[arg(long, value_name = "CMD")]
	pub engine: PathBuf,

	/// Extra argument passed to the engine (repeatable)
	#[arg(long = "engine-arg", value_name = "ARG", allow_hyphen_values = true)]
	pub engine_args: Vec<String>,

	/// JSON file with server issue and taint records
	#[arg(long, value_name = "PATH")]
	pub server_snapshot: Option<PathBuf>,

	/// Run as a manual analysis (report annotations, inline enrichment)
	#[arg(long)]
	pub manual: bool,
}

impl AnalyzeArgs {
	/// Settings path: `--config`, then the project file, then the user file.
	///
	/// Falls back to the project path when none exists, which loads defaults.
	pub fn settings_path(&self) -> PathBuf {
		if let Some(path) = &self.config {
			return path.clone();
		}
		let project = self.base_dir.join("sonde.toml");
		if project.exists() {
			return project;
		}
		user_settings_path().filter(|path| path.exists()).unwrap_or(project)
	}
}

/// `<config dir>/sonde/sonde.toml`, if the platform has a config dir.
pub fn user_settings_path() -> Option<PathBuf> {
	dirs::config_dir().map(|dir| dir.join("sonde").join("sonde.toml"))
}

/// Scope id for a base directory: its final component.
pub fn scope_name(base_dir: &Path) -> String {
	base_dir
		.file_name()
		.map(|name| name.to_string_lossy().into_owned())
		.unwrap_or_else(|| "default".to_string())
}
