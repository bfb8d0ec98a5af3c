//! jobhub backend
//!
//! Entry point: loads configuration, registers the shipped jobs, builds the
//! job queue and runs the selected command.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::Parser;
use jobhub_job_queue::{JobArgs, JobKwargs};
use jobhub_jobs::LogMailSender;
use jobhub_queues::{task_source, Consumer, MEMORY_BACKEND};

use jobhub_backend::tracing_setup::install_tracing;
use jobhub_backend::{create_app, default_collector, AppState};

mod cli;

use cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let config = jobhub_config::load_config(args.config_path.as_ref())
        .with_context(|| format!("loading config from {:?}", args.config_path))?;
    install_tracing(&config.logging);
    jobhub_config::validate_config(&config)?;

    tracing::debug!(config_path = ?args.config_path, backend = %config.job_queue.class, "configuration loaded");

    let collector = default_collector(Arc::new(LogMailSender))?;
    let state = create_app(config, collector);

    match args.command {
        Command::Jobs => list_jobs(&state),
        Command::Enqueue {
            name,
            args,
            kwargs,
            sync,
        } => enqueue(&state, &name, &args, &kwargs, sync),
        Command::Worker { poll_ms } => run_worker(state, Duration::from_millis(poll_ms)).await,
    }
}

fn list_jobs(state: &AppState) -> anyhow::Result<()> {
    let context = state.queue_context();
    for name in context.collector().names() {
        println!("{name}");
    }
    match state.get_job_queue() {
        Ok(queue) => println!("queue: {} ({} jobs)", queue.backend(), queue.jobs().len()),
        Err(e) => println!("queue: none ({e})"),
    }
    Ok(())
}

fn enqueue(state: &AppState, name: &str, args: &str, kwargs: &str, sync: bool) -> anyhow::Result<()> {
    let args: JobArgs = serde_json::from_str(args).context("--args must be a JSON array")?;
    let kwargs: JobKwargs = serde_json::from_str(kwargs).context("--kwargs must be a JSON object")?;

    if sync {
        let result = state.wrap_job(name, true)?.call(args, kwargs)?;
        println!("{}", result.unwrap_or_default());
        return Ok(());
    }

    state.enqueue(name, args, kwargs)?;
    tracing::info!(job = name, "job submitted");
    Ok(())
}

async fn run_worker(state: AppState, poll_interval: Duration) -> anyhow::Result<()> {
    let queue = state.get_job_queue()?;
    if queue.backend() == MEMORY_BACKEND {
        tracing::warn!("memory backend only sees jobs enqueued by this process");
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    let mut worker = tokio::task::spawn_blocking(move || -> anyhow::Result<usize> {
        let source = task_source(queue.as_ref())
            .ok_or_else(|| anyhow!("backend {} cannot be consumed", queue.backend()))?;
        Ok(Consumer::new(source)
            .poll_interval(poll_interval)
            .with_shutdown(flag)
            .run())
    });

    tokio::select! {
        res = &mut worker => {
            res??;
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("waiting for ctrl-c")?;
            tracing::info!("shutdown requested, finishing current task");
            shutdown.store(true, Ordering::Release);
        }
    }

    let processed = worker.await??;
    tracing::info!(processed, "worker exited");
    Ok(())
}
