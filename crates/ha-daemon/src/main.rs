//! azure-had - Azure cluster HA failover daemon

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use azure_ha_daemon::{Daemon, Server, Settings};
use azure_ha_failover::StatusFile;

#[derive(Parser)]
#[command(name = "azure-had")]
#[command(about = "Azure cluster HA failover daemon")]
#[command(version)]
#[command(long_about = "
Azure cluster HA failover daemon

Reconciles cloud-side network objects (VIP ipConfigurations, load-balancer
inbound NAT rules, the cluster public IP and route-table next-hops) toward
the local member whenever it holds the active role. Driven by the cluster
control socket: RECONF reloads the configuration, CHANGED re-polls
membership, STOP exits.
")]
struct Cli {
    /// Product installation directory; defaults to $FWDIR
    #[arg(long)]
    fwdir: Option<PathBuf>,

    /// Diagnostics side-file receiving per-interface VIP counts
    #[arg(long, default_value = "/etc/cloud-version")]
    cloud_version_path: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let fwdir = cli
        .fwdir
        .or_else(|| std::env::var_os("FWDIR").map(PathBuf::from))
        .context("--fwdir or $FWDIR is required")?;
    let settings = Settings {
        fwdir,
        cloud_version_path: cli.cloud_version_path,
    };

    azure_ha_daemon::logging::init(&settings.log_file())?;
    info!("started");

    let status = Arc::new(StatusFile::new(settings.status_file()));
    let mut daemon = Daemon::new(settings.clone(), status);

    // the first configuration epoch is required; retry until it loads
    while let Err(err) = daemon.reload().await {
        info!("initial configuration failed: {:#}", err);
        tokio::time::sleep(Duration::from_secs(5)).await;
    }

    let server = Server::bind(&settings)?;
    server.run(&mut daemon).await
}
