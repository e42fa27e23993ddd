//! leadscout - awning lead discovery
//!
//! Enumerates businesses around the configured regions, inspects each
//! storefront through street-level imagery and a local vision model, and
//! records positives as leads under the root folder.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use leadscout::services::LeadStore;
use leadscout::{build_info, CliOverrides, PipelineContext, PipelineOrchestrator, ScoutConfig};
use leadscout_common::config::{
    default_config_path, load_toml_config, write_toml_config, LoggingConfig, RootFolderResolver, TomlConfig,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for leadscout
#[derive(Parser, Debug)]
#[command(name = "leadscout")]
#[command(about = "Find storefronts with fabric awnings and keep them as sales leads")]
#[command(version)]
struct Args {
    /// TOML configuration file (default: ~/.config/leadscout/leadscout.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data folder holding leads, the processed ledger and images
    #[arg(short, long, global = true)]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover, classify and record leads (default)
    Run(RunArgs),
    /// Write a configuration file with default values
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print stored leads grouped by region
    Leads,
}

#[derive(ClapArgs, Debug, Default)]
struct RunArgs {
    /// Vision server endpoint, e.g. http://localhost:2020/v1
    #[arg(long)]
    vision_endpoint: Option<String>,

    /// Candidates processed concurrently
    #[arg(short, long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(default_config_path);
    let toml_config = match &config_path {
        Some(path) => load_toml_config(path),
        None => TomlConfig::default(),
    };

    init_tracing(&toml_config.logging)?;
    info!("Starting leadscout {}", build_info());
    if let Some(path) = &config_path {
        info!("Config file: {}", path.display());
    }

    match args.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Run(run_args) => {
            let overrides = CliOverrides {
                root_folder: args.root_folder,
                vision_endpoint: run_args.vision_endpoint,
                workers: run_args.workers,
            };
            let exit_code = run(&overrides, &toml_config).await?;
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
            Ok(())
        }
        Command::InitConfig { force } => {
            let path = config_path.context("No configuration directory on this platform; pass --config")?;
            init_config(&path, force)
        }
        Command::Leads => {
            let root = RootFolderResolver::new(args.root_folder, &toml_config).resolve();
            print_leads(&root, toml_config.seed_leads.as_deref()).await
        }
    }
}

/// `RUST_LOG` wins; otherwise the TOML level. Optional file sink from `logging.file`.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    let file_layer = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

async fn run(overrides: &CliOverrides, toml_config: &TomlConfig) -> Result<i32> {
    let config = ScoutConfig::resolve(overrides, toml_config).context("Configuration incomplete")?;

    info!("Root folder: {}", config.root_folder.display());
    info!("Vision endpoint: {}", config.vision_endpoint);
    info!(
        "Searching {} regions x {} categories",
        config.settings.regions.len(),
        config.settings.categories.len()
    );

    let store = LeadStore::open(&config.root_folder, config.seed_leads.as_deref())
        .await
        .context("Failed to open lead store")?;
    let context = PipelineContext::from_config(&config).context("Failed to initialize service clients")?;

    let cancel = CancellationToken::new();
    tokio::spawn(watch_shutdown(cancel.clone()));

    let orchestrator = PipelineOrchestrator::new(Arc::new(context), Arc::new(store), cancel);
    let summary = orchestrator.run().await?;

    if summary.breaker_tripped {
        warn!("Vision analysis was stopped early; check that the vision server is running");
    }
    if summary.shutdown_requested {
        info!("Run interrupted; unprocessed candidates will be picked up next run");
    }
    println!("{}", summary.display_string());

    Ok(summary.exit_code())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists; use --force to overwrite", path.display());
    }
    write_toml_config(&TomlConfig::default(), path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

async fn print_leads(root: &Path, seed: Option<&Path>) -> Result<()> {
    let store = LeadStore::open(root, seed).await.context("Failed to open lead store")?;
    let groups = store.grouped_by_region().await?;

    if groups.is_empty() {
        println!("No leads yet in {}", store.leads_path().display());
        return Ok(());
    }

    for (region, leads) in groups {
        println!("{} ({})", region, leads.len());
        for (index, lead) in leads.iter().enumerate() {
            let flag = if lead.follow_up { " [follow up]" } else { "" };
            println!(
                "  {:>3}. {} | {} | {} | {}{}",
                index, lead.name, lead.address, lead.phone, lead.status, flag
            );
        }
    }
    Ok(())
}

/// Cancel the run on Ctrl+C or SIGTERM
async fn watch_shutdown(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C; finishing in-flight candidates");
        },
        _ = terminate => {
            info!("Received terminate signal; finishing in-flight candidates");
        },
    }
    cancel.cancel();
}
