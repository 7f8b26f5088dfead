//! Prometheus metrics flags and exporter.

use clap::Args;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    thread,
    time::Duration,
};
use tracing::info;

/// How often process metrics are sampled.
const PROCESS_METRICS_INTERVAL: Duration = Duration::from_secs(15);

/// Flags of the Prometheus metrics endpoint.
#[derive(Args, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsArgs {
    /// Serve Prometheus metrics.
    #[arg(long = "metrics.enabled", global = true, env = "PAYWATCH_METRICS_ENABLED")]
    pub enabled: bool,

    /// Address the metrics endpoint listens on.
    #[arg(
        long = "metrics.addr",
        global = true,
        default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        env = "PAYWATCH_METRICS_ADDR"
    )]
    pub addr: IpAddr,

    /// Port the metrics endpoint listens on.
    #[arg(long = "metrics.port", global = true, default_value_t = 9090, env = "PAYWATCH_METRICS_PORT")]
    pub port: u16,
}

impl Default for MetricsArgs {
    fn default() -> Self {
        Self { enabled: false, addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED), port: 9090 }
    }
}

impl MetricsArgs {
    /// Installs the Prometheus recorder and endpoint when metrics are enabled.
    pub fn init_metrics(&self) -> Result<(), BuildError> {
        if self.enabled {
            init_prometheus_server(self.addr, self.port)?;
        }
        Ok(())
    }
}

/// Installs the global Prometheus recorder with an HTTP listener on `addr:port` and starts
/// sampling process metrics.
pub fn init_prometheus_server(addr: IpAddr, port: u16) -> Result<(), BuildError> {
    let listen_addr = SocketAddr::new(addr, port);
    PrometheusBuilder::new().with_http_listener(listen_addr).install()?;

    let collector = metrics_process::Collector::default();
    collector.describe();
    thread::spawn(move || {
        loop {
            collector.collect();
            thread::sleep(PROCESS_METRICS_INTERVAL);
        }
    });

    info!(target: "paywatch::metrics", %listen_addr, "Serving Prometheus metrics");
    Ok(())
}
