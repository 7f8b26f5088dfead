/// A component exposing gauges that must be sampled periodically rather than updated inline.
pub trait MetricsReporter {
    /// Samples the component's current state into the metrics recorder.
    fn report_metrics(&self);
}
