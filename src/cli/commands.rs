use crate::{
    cli::{Args, TasksArgs, WatchArgs},
    core::{
        config::ConfigLoader,
        environment::BuildEnvironment,
        pipeline::PipelineOptions,
        preview::{PreviewServer, Reloader},
        tasks::{register_builtins, BuildSummary, TaskGraph},
        types::BuildStatus,
        watch::{FsWatcher, WatchBinding, WatchTarget, WatchTrigger},
        AppError,
    },
    Result,
};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Resolve the project root and configuration into a build environment.
fn load_environment(args: &Args) -> Result<BuildEnvironment> {
    let root = args
        .project_root()
        .context("failed to determine project root")?;
    let config = match &args.config {
        Some(path) => ConfigLoader::load_explicit(path)?,
        None => ConfigLoader::load_from_workspace(&root)?,
    };
    Ok(BuildEnvironment::new(root, config)?)
}

/// Built-in tasks plus composites declared in configuration.
pub fn load_task_graph(env: &BuildEnvironment) -> std::result::Result<TaskGraph, AppError> {
    register_builtins(TaskGraph::builder(), env)?
        .register_declared(&env.config().tasks)?
        .build()
}

pub async fn run_task(args: &Args, task: &str) -> Result<()> {
    let env = load_environment(args)?;
    let graph = load_task_graph(&env)?;
    let summary = graph
        .run(task, env.root(), &env.pipeline_options())
        .await?;
    print_summary(&summary);
    ensure_success(&summary)
}

pub async fn tasks(args: &Args, tasks_args: &TasksArgs) -> Result<()> {
    let env = load_environment(args)?;
    let graph = load_task_graph(&env)?;
    if tasks_args.dot {
        println!("{}", graph.to_dot());
        return Ok(());
    }

    for info in graph.list() {
        let detail = match (&info.description, info.depends_on.is_empty()) {
            (Some(description), _) => description.clone(),
            (None, false) => info.depends_on.join(", "),
            (None, true) => String::new(),
        };
        println!("{:<14} {:<9} {}", info.name, info.kind, detail);
    }
    Ok(())
}

pub async fn watch(args: &Args, watch_args: &WatchArgs) -> Result<()> {
    let env = load_environment(args)?;
    let graph = Arc::new(load_task_graph(&env)?);
    let watch_config = env.config().watch.clone();
    if !graph.contains(&watch_config.task) {
        return Err(anyhow!(
            "watch.task '{}' is not a registered task",
            watch_config.task
        ));
    }

    let root = env
        .root()
        .canonicalize()
        .unwrap_or_else(|_| env.root().to_path_buf());
    let options = env.pipeline_options();

    let initial = graph.run(&watch_config.task, &root, &options).await?;
    print_summary(&initial);
    if !initial.is_success() {
        tracing::warn!(task = %watch_config.task, "initial build did not succeed, watching anyway");
    }

    let preview = if watch_args.no_preview {
        None
    } else {
        let preview_config = &env.config().preview;
        let port = watch_args.port.unwrap_or(preview_config.port);
        let handle = PreviewServer::new(root.join(&preview_config.base_dir), port)
            .with_reload_delay(preview_config.reload_delay)
            .start()
            .await?;
        println!("Preview server: {}", handle.url());
        Some(handle)
    };

    let target = Arc::new(RebuildTarget {
        graph: Arc::clone(&graph),
        root: root.clone(),
        options,
        reloader: preview.as_ref().map(|handle| handle.reloader()),
    });
    let binding = WatchBinding::new(&watch_config.patterns, watch_config.task.clone())?;
    let (sender, receiver) = mpsc::channel(256);
    let watcher = FsWatcher::start(&root, sender)?;
    let trigger = WatchTrigger::new(root.clone(), binding, watch_config.debounce);
    let mut trigger_task = tokio::spawn(trigger.run(receiver, target));

    println!(
        "Watching {} (Ctrl-C to stop)",
        watch_config.patterns.join(", ")
    );
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            tracing::info!("stopping watch");
            drop(watcher);
            let runs = (&mut trigger_task).await.context("watch trigger task failed")?;
            tracing::info!(runs, "watch stopped");
        }
        finished = &mut trigger_task => {
            let runs = finished.context("watch trigger task failed")?;
            tracing::warn!(runs, "file watcher closed");
        }
    }

    if let Some(handle) = preview {
        handle.shutdown().await?;
    }
    Ok(())
}

/// Re-runs the watch task and reloads the preview after successful runs.
struct RebuildTarget {
    graph: Arc<TaskGraph>,
    root: PathBuf,
    options: PipelineOptions,
    reloader: Option<Reloader>,
}

#[async_trait]
impl WatchTarget for RebuildTarget {
    async fn run(&self, task: &str) -> BuildStatus {
        match self.graph.run(task, &self.root, &self.options).await {
            Ok(summary) => {
                print_summary(&summary);
                summary.status()
            }
            Err(err) => {
                tracing::error!(task = %task, code = %err.code, "{}", err.message);
                BuildStatus::Fatal
            }
        }
    }

    async fn finished(&self, _task: &str, status: BuildStatus) {
        if let (Some(reloader), true) = (&self.reloader, status.is_success()) {
            reloader.reload().await;
        }
    }
}

fn print_summary(summary: &BuildSummary) {
    for report in &summary.reports {
        println!(
            "{:<14} {} written, {} skipped, {} failed ({} ms)",
            report.pipeline,
            report.written(),
            report.skipped.len(),
            report.failures.len(),
            report.elapsed.as_millis()
        );
        for failure in &report.failures {
            eprintln!("  {}: {}", failure.source.display(), failure.error);
        }
    }
    for fatal in &summary.fatal {
        eprintln!("{:<14} fatal: {}", fatal.pipeline, fatal.error);
    }
    println!(
        "{} {} in {} ms",
        summary.task,
        summary.status(),
        summary.elapsed.as_millis()
    );
}

fn ensure_success(summary: &BuildSummary) -> Result<()> {
    if summary.is_success() {
        return Ok(());
    }
    Err(anyhow!(
        "task '{}' finished with {}: {} failure(s)",
        summary.task,
        summary.status(),
        summary.failure_count()
    ))
}
