use clap::Parser;
use log::{error, info, warn};
use server::config::ServerConfig;
use server::coordinator::Coordinator;
use server::network::{self, ShardRouter};
use std::path::{Path, PathBuf};
use std::process;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Path to the run configuration file
    config_file: PathBuf,
    /// UDP port to listen on
    #[clap(value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,
    /// Optional file to redirect log output into
    log_file: Option<PathBuf>,
}

/// Main-method of the application.
/// Parses command-line arguments, spawns the shard workers and the network
/// transport, then runs the operator console until the run is stopped.
#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(cause) = init_logging(args.log_file.as_deref()) {
        eprintln!("[ERROR] failed to open log file: {}", cause);
        process::exit(1);
    }

    // A panic escaping any worker's tick is fatal to the whole process;
    // partial degradation would corrupt the measurement.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        process::exit(1);
    }));

    if let Err(cause) = run(args).await {
        error!("{}", cause);
        process::exit(1);
    }
}

fn init_logging(log_file: Option<&Path>) -> std::io::Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(path) = log_file {
        builder.target(env_logger::Target::Pipe(Box::new(std::fs::File::create(
            path,
        )?)));
    }
    builder.init();
    Ok(())
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::load(&args.config_file)?;
    info!(
        "Starting benchmark server on port {} with {} shards ({})",
        args.port, config.num_threads, config.algorithm_name
    );

    let (coordinator, senders) = Coordinator::launch(&config)?;
    let router = ShardRouter::new(senders, config.max_players);
    let socket = network::bind(args.port).await?;
    tokio::spawn(network::run(socket, router));

    // Operator console: the run ends on "exit", "quit" or "q" (or when
    // stdin closes, for scripted runs).
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "exit" | "quit" | "q" => break,
            "" => {}
            other => warn!("unknown console command '{}'", other),
        }
    }

    info!("Stop requested, halting shard workers at the tick boundary");
    coordinator.request_stop();
    let reports = tokio::task::spawn_blocking(move || coordinator.finish()).await??;

    let dir = server::metrics::export_run(&config, &reports)?;
    info!("Metrics written to {}", dir.display());
    Ok(())
}
