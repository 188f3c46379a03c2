use anyhow::bail;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fdgraph::pipeline::{self, PipelineReport};
use fdgraph::{CancelFlag, ComputeBackend, CpuBackend, RunStatus, Simulation};

mod cli;

use cli::{BackendKind, Cli};

fn execute(cli: &Cli, cancel: &CancelFlag) -> anyhow::Result<PipelineReport> {
    let config = cli.simulation_config();
    match cli.backend {
        BackendKind::Cpu => {
            let backend = match cli.threads {
                Some(threads) => CpuBackend::with_threads(threads)?,
                None => CpuBackend::new(),
            };
            run_with(cli, &mut Simulation::with_backend(config, backend), cancel)
        }
        #[cfg(feature = "gpu")]
        BackendKind::Gpu => {
            let backend = fdgraph::gpu::GpuBackend::new()?;
            run_with(cli, &mut Simulation::with_backend(config, backend), cancel)
        }
        #[cfg(not(feature = "gpu"))]
        BackendKind::Gpu => bail!("the gpu backend requires building with `--features gpu`"),
    }
}

fn run_with<B: ComputeBackend>(
    cli: &Cli,
    simulation: &mut Simulation<B>,
    cancel: &CancelFlag,
) -> anyhow::Result<PipelineReport> {
    match cli.random_graph() {
        Some((nodes, edges)) => {
            pipeline::layout_random(&cli.db_path, nodes, edges, cli.seed, simulation, cancel)
        }
        None => pipeline::layout_store(&cli.db_path, simulation, cancel),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,fdgraph=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cancel = CancelFlag::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, stopping after the current iteration");
            interrupt.cancel();
        }
    });

    let (cli, report) = tokio::task::spawn_blocking(move || {
        let report = execute(&cli, &cancel);
        (cli, report)
    })
    .await?;
    let report = report?;

    println!("{}", cli::summary(&report, &cli.db_path));
    if let RunStatus::Rejected(err) = &report.outcome.status {
        bail!("simulation refused: {err}");
    }
    info!("done");
    Ok(())
}
