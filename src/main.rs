use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use embodied_eval::cli::{build_run_config, Cli};
use embodied_eval::coordinator::run_coordinator;
use embodied_eval::selector::select_scenarios;
use embodied_eval::store::{self, RunPaths};
use embodied_eval::stub::{StubAgentFactory, StubSimulatorFactory};
use embodied_eval::worker::run_worker_job;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.is_worker_invocation() {
        return run_worker(&cli).await;
    }

    run_top_level(&cli).await
}

/// Worker-mode re-invocation (§4.6): logs to stderr only, since stdout is
/// reserved for nothing but this process writes its outcome to a file anyway.
async fn run_worker(cli: &Cli) -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let job_path = cli
        .worker_job
        .as_ref()
        .context("worker invocation missing --worker-job")?;
    let result_path = cli
        .worker_result
        .as_ref()
        .context("worker invocation missing --worker-result")?;

    let simulator_factory = StubSimulatorFactory;
    let agent_factory = StubAgentFactory;

    run_worker_job(job_path, result_path, &simulator_factory, &agent_factory)
        .await
        .context("worker job failed")?;
    Ok(())
}

/// Normal CLI entry point: resolve config, select scenarios, stand up the
/// run directory and its log sink, then hand off to the coordinator.
async fn run_top_level(cli: &Cli) -> Result<()> {
    let config = build_run_config(cli).context("failed to resolve run configuration")?;

    let scenario_ids = select_scenarios(&config.dataset_root, &config.spec)
        .context("failed to select scenarios")?;

    let started_at = Utc::now();
    let run_name = match &cli.resume {
        Some(existing) => existing.clone(),
        None => store::format_run_name(
            started_at,
            config.spec.agent_mode,
            config.spec.task_regime,
            &config.spec.custom_suffix,
        ),
    };
    let run_paths = RunPaths::new(&config.output_root, &run_name);
    tokio::fs::create_dir_all(&run_paths.run_dir)
        .await
        .with_context(|| format!("failed to create run directory {:?}", run_paths.run_dir))?;

    // evaluation_log.log is a first-class on-disk artifact separate from
    // whatever terminal is attached to this process (§4.1).
    let file_appender = tracing_appender::rolling::never(&run_paths.run_dir, "evaluation_log.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer().with_ansi(false).with_writer(non_blocking);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .with(file_layer)
        .init();

    info!(run_name, scenario_count = scenario_ids.len(), "starting run");

    let selection_descriptor = config.spec.scenario_selection.descriptor();
    let summary = run_coordinator(
        &config.dataset_root,
        config.clone(),
        scenario_ids,
        selection_descriptor,
        run_name,
        run_paths,
        started_at,
    )
    .await
    .context("run coordinator failed")?;

    if !summary.failed_scenarios.is_empty() {
        tracing::warn!(
            failed = summary.failed_scenarios.len(),
            "run completed with failed scenarios"
        );
    }

    // §6: exit 0 on any run that reached completion, including interrupted
    // runs; only a configuration error before any scenario starts is fatal.
    Ok(())
}
