use clap::Parser;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use patrold::cli::Cli;
use patrold::config::Config;
use patrold::delivery::{AnyDelivery, DiscordDelivery, DryRunDelivery};
use patrold::error::Error;
use patrold::orchestrator::Orchestrator;
use patrold::wiki::{MediaWikiClient, resolve_credentials};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn exit_with(e: Error) -> ! {
    eprintln!("error: {e}");
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging();

    info!("patrold starting");

    let config = Config::load(&cli).unwrap_or_else(|e| exit_with(e));
    info!(jobs = config.jobs.len(), continuous = config.continuous, "config loaded");

    let credentials = resolve_credentials(&config.wiki.username_env, &config.wiki.password_env)
        .unwrap_or_else(|e| exit_with(e));
    let client = MediaWikiClient::connect(&config.wiki, credentials.as_ref())
        .unwrap_or_else(|e| exit_with(e));

    let delivery = if config.dry_run {
        AnyDelivery::DryRun(DryRunDelivery::new())
    } else {
        AnyDelivery::Discord(DiscordDelivery::new(&config.discord).unwrap_or_else(|e| exit_with(e)))
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping after the current job");
            let _ = shutdown_tx.send(true);
        }
    });

    let orchestrator = Orchestrator::new(client, delivery, config);
    let summary = orchestrator
        .run_loop(Some(shutdown_rx))
        .await
        .unwrap_or_else(|e| exit_with(e));
    for outcome in &summary.outcomes {
        if let Err(e) = &outcome.result {
            eprintln!("error: job {}: {e}", outcome.label);
        }
    }
    if summary.interrupted {
        eprintln!("error: {}", Error::Interrupted);
    }
    std::process::exit(summary.exit_code());
}
