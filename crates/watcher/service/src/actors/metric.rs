use async_trait::async_trait;
use paywatch_metrics::MetricsReporter;
use std::{io, sync::Arc, time::Duration};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::ServiceActor;

/// Periodically samples the gauges of its reporters.
#[derive(Debug, derive_more::Constructor)]
pub struct MetricWorker<R> {
    interval: Duration,
    reporters: Vec<Arc<R>>,
    cancel_token: CancellationToken,
}

#[async_trait]
impl<R> ServiceActor for MetricWorker<R>
where
    R: MetricsReporter + Send + Sync + 'static,
{
    type InboundEvent = ();
    type Error = io::Error;

    async fn start(mut self) -> Result<(), Self::Error> {
        info!(
            target: "paywatch::metric_worker",
            interval = ?self.interval,
            "Starting MetricWorker"
        );

        loop {
            if self.cancel_token.is_cancelled() {
                info!(target: "paywatch::metric_worker", "MetricWorker is stopping due to cancellation");
                break;
            }

            for reporter in &self.reporters {
                reporter.report_metrics();
            }

            tokio::select! {
                _ = self.cancel_token.cancelled() => {}
                _ = sleep(self.interval) => {}
            }
        }
        Ok(())
    }
}
