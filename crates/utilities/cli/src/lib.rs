//! Shared CLI utilities for paywatch binaries: logging and metrics flags, and the
//! [`tracing_subscriber`] and Prometheus setup behind them.

mod log;
pub use log::{FileLogConfig, LogArgs, LogConfig, LogRotation, StdoutLogConfig};

mod tracing;
pub use self::tracing::{LogFormat, init_test_tracing};

mod metrics;
pub use self::metrics::{MetricsArgs, init_prometheus_server};

mod styles;
pub use styles::cli_styles;
