use anyhow::Result;
use clap::Parser;

use netwatch_daemon::cli::DaemonCli;
use netwatch_daemon::logging;
use netwatch_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let config = cli.resolve_config().await?;

    if cli.validate {
        println!("configuration is valid");
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "netwatch-daemon starting");

    let orchestrator = Orchestrator::build_from_config(config).await?;
    orchestrator.run().await?;

    tracing::info!("netwatch-daemon shut down");
    Ok(())
}
