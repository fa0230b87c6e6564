//! Command-line arguments for the `course` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;

#[derive(Debug, Parser)]
#[command(
    name = "course",
    version,
    about = "Submit course generation tasks and follow them to completion.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (RON).
    #[arg(long, value_name = "PATH", default_value = "course.ron", global = true)]
    pub config: PathBuf,

    /// Backend base URL. Overrides the config file and `COURSE_BASE_URL`.
    #[arg(long, value_name = "URL", global = true)]
    pub base_url: Option<String>,

    /// API key. Overrides the config file and `COURSE_API_KEY`.
    #[arg(long, value_name = "KEY", global = true)]
    pub api_key: Option<String>,

    /// Logging level (off, error, warn, info, debug, trace).
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit a new course and follow it until it finishes.
    Submit(SubmitArgs),
    /// Follow a task that was submitted earlier.
    Watch(WatchArgs),
    /// List the files a task has produced so far.
    Files { task_id: String },
    /// Download one artifact of a task.
    Download {
        task_id: String,
        /// Path of the artifact as reported by `files`.
        path: String,
        /// Directory to save into. Defaults to the configured output directory.
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },
    /// List the catalogs known to the backend.
    Catalogs,
    /// List recent tasks.
    Tasks,
    /// Check that the backend is reachable.
    Health,
    /// Show or edit the config file.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Args)]
pub struct SubmitArgs {
    /// Name of the course to generate.
    pub course_name: String,

    #[arg(long, default_value = "gpt-4o-mini")]
    pub model: String,

    /// Experiment name; results are grouped under it.
    #[arg(long, default_value = "default")]
    pub exp_name: String,

    #[arg(long)]
    pub copilot: bool,

    /// Name of a catalog already on the backend.
    #[arg(long, value_name = "NAME", conflicts_with = "catalog_file")]
    pub catalog: Option<String>,

    /// Local JSON catalog sent inline with the request.
    #[arg(long, value_name = "PATH")]
    pub catalog_file: Option<PathBuf>,

    /// Print the task id and return without following the task.
    #[arg(long)]
    pub detach: bool,

    #[command(flatten)]
    pub follow: FollowArgs,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    pub task_id: String,

    #[command(flatten)]
    pub follow: FollowArgs,
}

#[derive(Debug, Clone, Args)]
pub struct FollowArgs {
    /// Download each artifact as soon as it appears.
    #[arg(long)]
    pub download: bool,

    /// Directory for downloads. Defaults to the configured output directory.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration.
    Show,
    /// Store the API key in the config file.
    SetKey { key: String },
    /// Store the backend base URL in the config file.
    SetBaseUrl { url: String },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
