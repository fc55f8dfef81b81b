use anyhow::Context;
use clap::{Parser, Subcommand};
use distsort::app::{handle_fatal_error, init_logging, AppConfig};
use distsort::client::SubmitClient;
use distsort::config::{load_config, ClientConfig, CoordinatorConfig, WorkerConfig};
use distsort::coordinator::CoordinatorServer;
use distsort::model::Endpoint;
use distsort::worker::WorkerServer;
use std::path::PathBuf;
use tracing::{info, warn};

/// Distributed external sort over a pool of worker processes
#[derive(Parser)]
#[command(name = "distsort")]
#[command(about = "Sort integer-keyed line files across a pool of workers", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the coordinator
    Coordinator {
        /// Path to a TOML configuration file
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,

        /// Address to listen on (overrides the config file)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Run a worker and register it with the coordinator
    Worker {
        /// Path to a TOML configuration file
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,

        /// Coordinator address as host:port
        #[arg(long)]
        coordinator: Option<String>,

        /// Address to listen on; port 0 picks a free port
        #[arg(long)]
        bind: Option<String>,

        /// Host to advertise to the coordinator
        #[arg(long)]
        advertise_host: Option<String>,

        /// Chance in [0, 1] that a local sort is forced to fail
        #[arg(long)]
        failure_probability: Option<f64>,

        /// Load above which sorts are offered to peers
        #[arg(long)]
        load_threshold: Option<f64>,
    },
    /// Sort a file on the cluster
    Submit {
        /// File with one integer key per line
        input: PathBuf,

        /// Where to write the sorted lines
        output: PathBuf,

        /// Path to a TOML configuration file
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,

        /// Coordinator address as host:port
        #[arg(long)]
        coordinator: Option<String>,
    },
    /// Print the stats of a coordinator or worker
    Stats {
        /// Process to query as host:port (defaults to the coordinator)
        target: Option<String>,

        /// Path to a TOML configuration file
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,

        /// Coordinator address as host:port
        #[arg(long)]
        coordinator: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let app_config = AppConfig::new(cli.verbose);
    init_logging(&app_config);

    let result = match cli.command {
        Commands::Coordinator { config, bind } => run_coordinator(config, bind).await,
        Commands::Worker {
            config,
            coordinator,
            bind,
            advertise_host,
            failure_probability,
            load_threshold,
        } => {
            let overrides = WorkerOverrides {
                coordinator,
                bind,
                advertise_host,
                failure_probability,
                load_threshold,
            };
            run_worker(config, overrides).await
        }
        Commands::Submit {
            input,
            output,
            config,
            coordinator,
        } => run_submit(input, output, config, coordinator).await,
        Commands::Stats {
            target,
            config,
            coordinator,
        } => run_stats(target, config, coordinator).await,
    };

    if let Err(e) = result {
        handle_fatal_error(e, app_config.verbose);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Unable to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn run_coordinator(config: Option<PathBuf>, bind: Option<String>) -> anyhow::Result<()> {
    let mut config: CoordinatorConfig = load_config(config.as_deref()).await?;
    if let Some(bind) = bind {
        config.bind = bind;
    }

    let server = CoordinatorServer::bind(config).await?;
    info!("Coordinator ready at {}", server.endpoint());
    server.run(shutdown_signal()).await?;
    Ok(())
}

struct WorkerOverrides {
    coordinator: Option<String>,
    bind: Option<String>,
    advertise_host: Option<String>,
    failure_probability: Option<f64>,
    load_threshold: Option<f64>,
}

async fn run_worker(config: Option<PathBuf>, overrides: WorkerOverrides) -> anyhow::Result<()> {
    let mut config: WorkerConfig = load_config(config.as_deref()).await?;
    config.merge_env_vars();

    if let Some(coordinator) = overrides.coordinator {
        config.coordinator = coordinator;
    }
    if let Some(bind) = overrides.bind {
        config.bind = bind;
    }
    if let Some(host) = overrides.advertise_host {
        config.advertise_host = Some(host);
    }
    if let Some(p) = overrides.failure_probability {
        config.failure_probability = p;
    }
    if let Some(threshold) = overrides.load_threshold {
        config.load_threshold = threshold;
    }

    let server = WorkerServer::bind(&config).await?;
    info!(
        "Worker {} (failure probability {}, load threshold {})",
        server.endpoint(),
        config.failure_probability,
        config.load_threshold
    );
    server.run(shutdown_signal()).await?;
    Ok(())
}

async fn client_from(
    config: Option<PathBuf>,
    coordinator: Option<String>,
) -> anyhow::Result<SubmitClient> {
    let mut config: ClientConfig = load_config(config.as_deref()).await?;
    config.merge_env_vars();
    if let Some(coordinator) = coordinator {
        config.coordinator = coordinator;
    }
    Ok(SubmitClient::new(&config)?)
}

async fn run_submit(
    input: PathBuf,
    output: PathBuf,
    config: Option<PathBuf>,
    coordinator: Option<String>,
) -> anyhow::Result<()> {
    let client = client_from(config, coordinator).await?;
    let sorted = client
        .sort_file(&input, &output)
        .await
        .with_context(|| format!("Sorting {} failed", input.display()))?;

    println!(
        "Sorted {} records into {}",
        sorted.len(),
        output.display()
    );
    Ok(())
}

async fn run_stats(
    target: Option<String>,
    config: Option<PathBuf>,
    coordinator: Option<String>,
) -> anyhow::Result<()> {
    let client = client_from(config, coordinator).await?;
    let target = match target {
        Some(target) => target.parse::<Endpoint>()?,
        None => client.coordinator().clone(),
    };

    let stats = client.fetch_stats(&target).await?;
    print!("{stats}");
    Ok(())
}
