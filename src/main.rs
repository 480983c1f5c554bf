use std::{fs, path::Path, sync::Arc};

use anyhow::{Context, Result};
use chrono::Local;
use toast_dedup::{
    Config, Notifier,
    cleanup::TokioScheduler,
    clock::SystemClock,
    renderer::TracingRenderer,
    storage::FileStorage,
    tasks::{Task, TaskEvent, TaskStats, check_due_tasks},
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn load_tasks(path: &Path) -> Result<Vec<Task>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read tasks from {}", path.display()))?;
    serde_json::from_str(&raw).context("tasks file is not a JSON array of tasks")
}

fn report_tasks(notifier: &Notifier, tasks: &[Task]) -> Result<()> {
    let now = Local::now();
    let stats = TaskStats::compute(tasks, now.naive_local());
    info!(
        "Tasks: {} total, {} completed, {} pending, {} upcoming",
        stats.total_tasks, stats.completed_tasks, stats.pending_tasks, stats.upcoming_tasks
    );

    let report = check_due_tasks(notifier, tasks, now.date_naive())?;
    info!(
        "Due today: {} alert(s) shown, {} suppressed as recent duplicates",
        report.shown, report.suppressed
    );

    TaskEvent::Loaded.notify(notifier)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Config::new() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let notifier = Notifier::builder(config.settings.clone())
        .storage(FileStorage::new(&config.dir))
        .renderer(Arc::new(TracingRenderer))
        .scheduler(Arc::new(TokioScheduler::new()))
        .clock(Arc::new(SystemClock))
        .build();

    if let Err(e) = notifier.init() {
        warn!("Toast cache running without periodic sweep: {}", e);
    }
    info!(
        "Toast cache ready with {} record(s) from {}",
        notifier.len(),
        config.dir.display()
    );

    if let Some(path) = &config.tasks {
        match load_tasks(path) {
            Ok(tasks) => report_tasks(&notifier, &tasks)?,
            Err(e) => {
                error!("{:#}", e);
                TaskEvent::LoadFailed.notify(&notifier)?;
            }
        }
    }

    if config.watch {
        info!("Watching; press Ctrl-C to exit");
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?;
    }

    notifier.teardown();
    Ok(())
}
