use std::process::ExitCode;

use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

use mca::cli::{AnalyzeArgs, Cli, Commands};
use mca::config::{create_default_config, load_agents, load_config};
use mca::error::RunError;
use mca::format::{format_json, format_results};
use mca::orchestration::{AgentTaskRunner, Orchestrator, ProcessSupervisor, SupervisorSettings};
use mca::submit::build_submitter;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr; stdout carries only results.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze(args) => analyze(args).await,
        Commands::Init { output, force } => {
            match create_default_config(output.as_deref(), force) {
                Ok(path) => {
                    println!("Wrote default agent roster to {}", path.display());
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    Ok(ExitCode::from(1))
                }
            }
        }
        Commands::Version => {
            println!("mca {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn analyze(args: AnalyzeArgs) -> anyhow::Result<ExitCode> {
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return Ok(ExitCode::from(1));
        }
    };
    tracing::info!(
        cwd = %config.cwd.display(),
        agents_file = %config.agents_file.display(),
        proxy = %config.proxy_command.join(" "),
        "Config loaded"
    );

    let agents = match load_agents(&config.agents_file) {
        Ok(agents) => agents,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(ExitCode::from(1));
        }
    };

    let cancel = CancellationToken::new();
    spawn_interrupt_listener(cancel.clone())?;

    let supervisor = ProcessSupervisor::new(SupervisorSettings::from_config(&config));
    let runner = AgentTaskRunner::new(build_submitter(&config.client, &config.cwd));
    let orchestrator = Orchestrator::new(supervisor, runner);

    let report = match orchestrator
        .execute(
            &agents,
            &args.prompt,
            config.readiness_timeout,
            config.task_timeout,
            &cancel,
        )
        .await
    {
        Ok(report) => report,
        Err(e @ RunError::NoEnabledAgents) => {
            eprintln!("error: {e}");
            return Ok(ExitCode::from(1));
        }
    };

    if args.json {
        println!("{}", format_json(&report)?);
    } else {
        print!("{}", format_results(&report, !args.no_summary));
    }

    Ok(ExitCode::from(report.status.exit_code()))
}

/// Cancel the run on the first SIGINT or SIGTERM.
fn spawn_interrupt_listener(cancel: CancellationToken) -> anyhow::Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::warn!("Interrupt received, shutting down"),
            _ = terminate.recv() => tracing::warn!("SIGTERM received, shutting down"),
        }
        cancel.cancel();
    });
    Ok(())
}
