//! Contains the paywatch CLI.

use crate::flags::WatcherArgs;
use anyhow::Result;
use clap::Parser;
use paywatch_cli::{LogArgs, LogConfig, MetricsArgs, cli_styles};
use paywatch_service::Service;
use tracing::{error, info};

/// Watches EVM chains for invoice payments.
#[derive(Parser, Debug)]
#[command(name = "paywatch", version, about = "Watches EVM chains for invoice payments", styles = cli_styles())]
pub struct Cli {
    /// Global args
    #[command(flatten)]
    pub global: LogArgs,

    /// Prometheus metrics args
    #[command(flatten)]
    pub metrics: MetricsArgs,

    /// Watcher args
    #[command(flatten)]
    pub watcher: WatcherArgs,
}

impl Cli {
    /// Runs the CLI.
    pub fn run(self) -> Result<()> {
        self.metrics.init_metrics()?;
        self.init_logs(&self.global)?;

        Self::run_until_ctrl_c(async move {
            let config = self.watcher.init_config(self.metrics.enabled).await?;
            let mut service = Service::new(config)?;

            tokio::select! {
                res = service.run() => {
                    if let Err(err) = res {
                        error!(target: "paywatch", %err, "Error running paywatch service");
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!(target: "paywatch", "Ctrl+C received, initiating service shutdown...");
                }
            }

            service.shutdown().await?;
            info!(target: "paywatch", "Paywatch service shut down gracefully.");
            Ok(())
        })
    }

    /// Run until ctrl-c is pressed.
    pub fn run_until_ctrl_c<F>(fut: F) -> Result<()>
    where
        F: std::future::Future<Output = Result<()>>,
    {
        let rt = Self::tokio_runtime().map_err(|e| anyhow::anyhow!(e))?;
        rt.block_on(fut)
    }

    /// Creates a new default tokio multi-thread [`Runtime`](tokio::runtime::Runtime) with all
    /// features enabled
    pub fn tokio_runtime() -> Result<tokio::runtime::Runtime, std::io::Error> {
        tokio::runtime::Builder::new_multi_thread().enable_all().build()
    }

    /// Initializes the tracing subscriber.
    pub fn init_logs(&self, args: &LogArgs) -> Result<()> {
        let filter = tracing_subscriber::EnvFilter::from_default_env();
        LogConfig::new(args.clone()).init_tracing_subscriber(Some(filter))?;
        Ok(())
    }
}
