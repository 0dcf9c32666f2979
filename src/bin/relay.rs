use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use metrics_relay::{
    actors::scheduler::{Pipeline, SchedulerHandle},
    backend::prometheus::PrometheusClient,
    config::{ForwardMode, read_config_file},
    util::{get_backend_token, get_config_path},
};
use tracing::{debug, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(about = "Collects metrics from Prometheus and forwards them to an analysis service")]
struct Args {
    /// Config file (JSON, or TOML with a `.toml` extension); defaults to $RELAY_CONFIG or config.json
    #[arg(short)]
    file: Option<String>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Log level for the relay
    #[arg(long, default_value = "debug")]
    log_level: LevelFilter,
}

fn init(level: LevelFilter) {
    let filter = filter::Targets::new().with_target("metrics_relay", level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init(args.log_level);
    trace!("started with args: {args:?}");

    let path = args.file.clone().unwrap_or_else(get_config_path);
    let mut config = read_config_file(&path)?;
    if let Some(token) = get_backend_token() {
        debug!("using backend token from environment");
        config.backend.token = Some(token);
    }
    let config = config.resolve().context("invalid configuration")?;

    match config.mode {
        ForwardMode::Snapshot => info!("forwarding single snapshots"),
        ForwardMode::Window(size) => info!("forwarding windows of {size} snapshots"),
    }

    let client = PrometheusClient::new(&config.backend)?;
    let pipeline = Pipeline::from_config(&config, Arc::new(client))?;

    if args.check {
        info!("configuration {path} is valid");
        return Ok(());
    }

    let scheduler = SchedulerHandle::spawn(pipeline, config.interval);
    info!(
        "collecting {} metric(s) for {} entities every {:?}",
        config.queries.len(),
        config.entities.len(),
        config.interval
    );

    if args.once {
        let report = scheduler.run_cycle_now().await?;
        info!("{}", serde_json::to_string(&report)?);
    } else {
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for shutdown signal")?;
        info!("shutting down");
    }

    scheduler.shutdown().await?;

    Ok(())
}
