use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context as _};
use chrono::Local;
use course_core::{ClientEvent, CourseRequest, FileEntry, TaskId, TaskStatus};
use course_engine::{
    download_artifact, ChannelEventSink, ClientSettings, CourseApi, OrchestratorHandle, ReqwestApi,
    Timings,
};
use engine_logging::{engine_info, engine_warn};
use tokio::sync::mpsc;

use crate::cli::{Command, ConfigCommand, FollowArgs, SubmitArgs};
use crate::config::{mask_key, AppConfig, API_KEY_ENV};
use crate::render::{file_line, format_size, format_with_commas, render_event};

/// Everything a command needs besides its own arguments.
pub struct Context {
    /// Effective configuration: file, then environment, then flags.
    pub config: AppConfig,
    /// The file alone; `config set-*` edits this so env values are never persisted.
    pub file_config: AppConfig,
    pub config_path: PathBuf,
}

pub async fn run(command: Command, ctx: Context) -> anyhow::Result<()> {
    match command {
        Command::Config(command) => configure(command, &ctx),
        Command::Submit(args) => submit(args, &ctx).await,
        Command::Watch(args) => {
            let api = connect(&ctx.config)?;
            let task_id = TaskId::new(args.task_id);
            follow(api, &ctx.config, Start::Attach(task_id), &args.follow).await
        }
        Command::Files { task_id } => list_files(&ctx.config, TaskId::new(task_id)).await,
        Command::Download {
            task_id,
            path,
            output_dir,
        } => {
            let api = connect(&ctx.config)?;
            let dir = output_dir.unwrap_or_else(|| ctx.config.output_dir.clone());
            let saved = download_artifact(&api, &TaskId::new(task_id), &path, &dir).await?;
            println!("Saved {}", saved.display());
            Ok(())
        }
        Command::Catalogs => {
            let catalogs = connect(&ctx.config)?.catalogs().await?;
            if catalogs.catalogs.is_empty() {
                println!("No catalogs");
            }
            for entry in catalogs.catalogs {
                let size = entry.size.map(format_size).unwrap_or_default();
                println!("{:<30} {:<40} {:>10}", entry.name, entry.filename, size);
            }
            Ok(())
        }
        Command::Tasks => {
            let list = connect(&ctx.config)?.tasks().await?;
            println!("{} task(s)", list.total);
            for task in list.tasks {
                println!(
                    "{:<38} {:<10} {:>3}% {:<30} {}",
                    task.task_id,
                    task.status,
                    task.progress,
                    task.course_name.unwrap_or_default(),
                    task.created_at.unwrap_or_default()
                );
            }
            Ok(())
        }
        Command::Health => {
            let api = connect(&ctx.config)?;
            let report = api
                .health()
                .await
                .with_context(|| format!("backend at {} is unreachable", api.base_url()))?;
            println!(
                "{} is {} (version {}, {})",
                api.base_url(),
                report.status,
                report.version,
                report.timestamp
            );
            Ok(())
        }
    }
}

fn connect(config: &AppConfig) -> anyhow::Result<Arc<ReqwestApi>> {
    let api = ReqwestApi::new(&config.client_settings())?;
    Ok(Arc::new(api))
}

fn configure(command: ConfigCommand, ctx: &Context) -> anyhow::Result<()> {
    match command {
        ConfigCommand::Show => {
            let config = &ctx.config;
            let key = config
                .api_key
                .as_deref()
                .map(mask_key)
                .unwrap_or_else(|| "(not set)".to_string());
            println!("config file: {}", ctx.config_path.display());
            println!("base url:    {}", config.base_url);
            println!("api key:     {key}");
            println!("output dir:  {}", config.output_dir.display());
            if let Some(log_file) = &config.log_file {
                println!("log file:    {}", log_file.display());
            }
            Ok(())
        }
        ConfigCommand::SetKey { key } => {
            let key = key.trim().to_string();
            if key.is_empty() {
                bail!("the API key must not be empty");
            }
            let config = AppConfig {
                api_key: Some(key),
                ..ctx.file_config.clone()
            };
            config.save(&ctx.config_path)?;
            println!("API key saved to {}", ctx.config_path.display());
            Ok(())
        }
        ConfigCommand::SetBaseUrl { url } => {
            let settings = ClientSettings {
                base_url: url.clone(),
                ..ClientSettings::default()
            };
            ReqwestApi::new(&settings).with_context(|| format!("{url} is not a usable base URL"))?;
            let config = AppConfig {
                base_url: url,
                ..ctx.file_config.clone()
            };
            config.save(&ctx.config_path)?;
            println!("Base URL saved to {}", ctx.config_path.display());
            Ok(())
        }
    }
}

async fn submit(args: SubmitArgs, ctx: &Context) -> anyhow::Result<()> {
    let api = connect(&ctx.config)?;
    if !api.has_api_key() {
        bail!(
            "no API key configured; run `course config set-key <KEY>` or set {API_KEY_ENV}"
        );
    }

    let catalog_data = match &args.catalog_file {
        Some(path) => Some(read_catalog(path)?),
        None => None,
    };
    let request = CourseRequest {
        model_name: args.model,
        exp_name: args.exp_name,
        copilot: args.copilot,
        catalog: args.catalog,
        catalog_data,
        ..CourseRequest::new(args.course_name)
    };

    if args.detach {
        let response = api.submit(&request).await?;
        println!("{}", response.task_id);
        return Ok(());
    }
    follow(api, &ctx.config, Start::Submit(request), &args.follow).await
}

fn read_catalog(path: &Path) -> anyhow::Result<serde_json::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("could not read catalog {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

async fn list_files(config: &AppConfig, task_id: TaskId) -> anyhow::Result<()> {
    let listing = connect(config)?.files(&task_id).await?;
    let status = listing
        .status
        .as_ref()
        .map(TaskStatus::to_string)
        .unwrap_or_else(|| "unknown".to_string());
    println!("Task {task_id} ({status})");
    for file in &listing.files {
        println!("{}", file_line(file));
    }
    let total: u64 = listing.files.iter().map(|file| file.size).sum();
    println!(
        "{} file(s), {} bytes",
        listing.files.len(),
        format_with_commas(total)
    );
    Ok(())
}

enum Start {
    Submit(CourseRequest),
    Attach(TaskId),
}

/// Drive one task to a terminal status, printing every event.
async fn follow(
    api: Arc<ReqwestApi>,
    config: &AppConfig,
    start: Start,
    opts: &FollowArgs,
) -> anyhow::Result<()> {
    let timings: Timings = config.timings.into();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle =
        OrchestratorHandle::spawn(api.clone(), timings, Arc::new(ChannelEventSink::new(tx)));
    let submitting = matches!(start, Start::Submit(_));
    match start {
        Start::Submit(request) => handle.submit(request),
        Start::Attach(task_id) => handle.attach(task_id),
    }

    let mut downloader = opts.download.then(|| Downloader {
        api: api.clone(),
        dir: opts
            .output_dir
            .clone()
            .unwrap_or_else(|| config.output_dir.clone()),
        saved: HashSet::new(),
    });

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);
    let mut task_id: Option<TaskId> = None;

    let outcome = loop {
        let event = tokio::select! {
            event = rx.recv() => event,
            _ = &mut interrupt => {
                println!("Interrupted; the task keeps running on the backend.");
                break Ok(());
            }
        };
        let Some(event) = event else {
            break Err(anyhow!("orchestrator stopped unexpectedly"));
        };
        for line in render_event(&event, Local::now()) {
            println!("{line}");
        }

        match event {
            ClientEvent::TaskStarted { task_id: started } => task_id = Some(started),
            ClientEvent::Error(message) if submitting && task_id.is_none() => {
                break Err(anyhow!("submission failed: {message}"));
            }
            ClientEvent::NewFilesReady(files) => {
                if let (Some(downloader), Some(task_id)) = (downloader.as_mut(), &task_id) {
                    downloader.fetch(task_id, &files).await;
                }
            }
            ClientEvent::Results(listing) => {
                if let (Some(downloader), Some(task_id)) = (downloader.as_mut(), &task_id) {
                    downloader.fetch(task_id, &listing.files).await;
                }
            }
            ClientEvent::TaskFinished { task_id, status } => {
                break match status {
                    TaskStatus::Failed => Err(anyhow!("task {task_id} failed")),
                    _ => Ok(()),
                };
            }
            _ => {}
        }
    };

    handle.shutdown().await;
    outcome
}

struct Downloader {
    api: Arc<ReqwestApi>,
    dir: PathBuf,
    saved: HashSet<String>,
}

impl Downloader {
    /// Save every file not saved yet. Failures are reported and retried on
    /// the next listing that names the file.
    async fn fetch(&mut self, task_id: &TaskId, files: &[FileEntry]) {
        for file in files {
            if self.saved.contains(&file.path) {
                continue;
            }
            match download_artifact(&self.api, task_id, &file.path, &self.dir).await {
                Ok(path) => {
                    engine_info!("Saved {} to {:?}", file.path, path);
                    println!("    saved {}", path.display());
                    self.saved.insert(file.path.clone());
                }
                Err(err) => {
                    engine_warn!("Download of {} failed: {}", file.path, err);
                    println!("    could not download {}: {err}", file.path);
                }
            }
        }
    }
}
