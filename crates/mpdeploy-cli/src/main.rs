//! mpdeploy - publish a Dart package archive and update its package index

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use mpdeploy_cli::Cli;
use mpdeploy_core::PackageDeployer;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; CI logs want every step by default
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let (config, release) = cli.into_config()?;
    tracing::debug!("{config:?}");

    let deployer =
        PackageDeployer::connect(config, release).context("Failed to initialize deployer")?;
    deployer
        .deploy()
        .await
        .with_context(|| format!("Failed to publish {}", deployer.release()))?;

    Ok(())
}
