//! Machine Monitor CLI
//!
//! Vibration and temperature batching agent for machine condition monitoring.

use clap::{Parser, Subcommand};
use machine_monitor::{
    agent::{consumer_from_config, controller_from_config, read_readings, replay},
    config::Config,
    core::{MachineId, PersistenceSink},
    sink::{JsonlStore, MemoryStore},
    IngestCounters, VERSION,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "machine-monitor")]
#[command(version = VERSION)]
#[command(about = "Vibration and temperature batching agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP ingest server
    Serve {
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Samples per channel in each batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Sampling rate of the sensor streams, in Hz
        #[arg(long)]
        sampling_rate: Option<u32>,

        /// Disable hourly vibration averages
        #[arg(long)]
        no_stats: bool,
    },

    /// Feed a JSON-lines file of readings through the pipeline
    Replay {
        /// File with one reading per line
        file: PathBuf,

        /// Samples per channel in each batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Sampling rate of the sensor streams, in Hz
        #[arg(long)]
        sampling_rate: Option<u32>,

        /// Keep hourly averages in memory instead of writing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Show configuration
    Config,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve {
            port,
            batch_size,
            sampling_rate,
            no_stats,
        } => cmd_serve(port, batch_size, sampling_rate, no_stats).await,
        Commands::Replay {
            file,
            batch_size,
            sampling_rate,
            dry_run,
        } => cmd_replay(file, batch_size, sampling_rate, dry_run).await,
        Commands::Config => cmd_config(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

/// Load configuration and apply command-line overrides.
fn load_config(batch_size: Option<usize>, sampling_rate: Option<u32>) -> anyhow::Result<Config> {
    let mut config = Config::load()?;
    if let Some(batch_size) = batch_size {
        config.batch_size = batch_size;
    }
    if let Some(sampling_rate) = sampling_rate {
        config.sampling_rate = sampling_rate;
    }
    config.batch_size()?;
    Ok(config)
}

#[cfg(feature = "server")]
async fn cmd_serve(
    port: Option<u16>,
    batch_size: Option<usize>,
    sampling_rate: Option<u32>,
    no_stats: bool,
) -> anyhow::Result<()> {
    use machine_monitor::server::{run, ServerConfig};

    let mut config = load_config(batch_size, sampling_rate)?;
    if no_stats {
        config.hourly_statistics = false;
    }
    if let Err(e) = config.ensure_directories() {
        tracing::warn!("Could not create directories: {}", e);
    }

    println!("Machine Monitor v{VERSION}");
    println!("  Batch size: {}", config.batch_size);
    println!("  Sampling rate: {} Hz", config.sampling_rate);
    println!(
        "  Hourly statistics: {}",
        if config.hourly_statistics {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!();
    println!("Press Ctrl+C to stop");

    let server_config = ServerConfig::new(port.unwrap_or(config.server_port), config);
    let (addr, shutdown_tx) = run(server_config).await?;
    println!("Listening on http://{addr}");

    tokio::signal::ctrl_c().await?;
    println!();
    println!("Stopping server...");
    let _ = shutdown_tx.send(());

    Ok(())
}

#[cfg(not(feature = "server"))]
async fn cmd_serve(
    _port: Option<u16>,
    _batch_size: Option<usize>,
    _sampling_rate: Option<u32>,
    _no_stats: bool,
) -> anyhow::Result<()> {
    anyhow::bail!("serve requires the server feature (rebuild with --features server)")
}

async fn cmd_replay(
    file: PathBuf,
    batch_size: Option<usize>,
    sampling_rate: Option<u32>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let config = load_config(batch_size, sampling_rate)?;

    let sink: Option<Arc<dyn PersistenceSink>> = if dry_run {
        Some(Arc::new(MemoryStore::new()))
    } else if config.hourly_statistics {
        let store = JsonlStore::in_dir(&config.data_path);
        println!("Hourly averages: {:?}", store.path());
        Some(Arc::new(store))
    } else {
        None
    };

    let consumer = consumer_from_config(&config)?;
    let mut controller = controller_from_config(&config, consumer, sink)?;
    let counters = IngestCounters::new();

    let readings = read_readings(&file)?;
    println!("Replaying {} readings from {:?}", readings.len(), file);

    let outcome = replay(&mut controller, &readings, &counters).await;

    println!();
    for machine in MachineId::ALL {
        let (left, right, temp) = controller.buffered(machine);
        println!("{machine}: {left} left, {right} right, {temp} temp samples still buffered");
    }
    println!();
    println!("{}", counters.summary());

    outcome?;
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = Config::load()?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
