mod cli;
mod commands;
mod config;
mod render;

use anyhow::Context;
use engine_logging::LogDestination;
use log::LevelFilter;

use crate::config::AppConfig;

fn main() -> anyhow::Result<()> {
    let args = cli::parse();

    let file_config = AppConfig::load(&args.config)?;
    let config = file_config
        .clone()
        .with_env(|name| std::env::var(name).ok())
        .with_overrides(args.base_url.clone(), args.api_key.clone());

    let level = args.log_level.map(LevelFilter::from).unwrap_or(LevelFilter::Warn);
    let destination = match (&config.log_file, level) {
        (_, LevelFilter::Off) => LogDestination::Off,
        (Some(path), _) => LogDestination::Both(path.clone()),
        (None, _) => LogDestination::Terminal,
    };
    engine_logging::initialize(destination, level);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    runtime.block_on(commands::run(args.command, commands::Context {
        config,
        file_config,
        config_path: args.config,
    }))
}
