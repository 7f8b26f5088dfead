//! Logging flags and the configuration derived from them.

use crate::LogFormat;
use clap::{ArgAction, Args};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

/// Global logging flags.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct LogArgs {
    /// Verbosity level, repeat to raise it: `-v` error, `-vvv` info, `-vvvvv` trace.
    ///
    /// Defaults to info.
    #[arg(short = 'v', long = "verbosity", action = ArgAction::Count, global = true)]
    pub level: u8,

    /// Suppress stdout logs.
    #[arg(long = "logs.stdout.quiet", short = 'q', global = true, env = "PAYWATCH_LOGS_QUIET")]
    pub stdout_quiet: bool,

    /// Format of the stdout logs.
    #[arg(
        long = "logs.stdout.format",
        default_value = "full",
        global = true,
        env = "PAYWATCH_LOGS_STDOUT_FORMAT"
    )]
    pub stdout_format: LogFormat,

    /// Directory the log files are written to. No log files are written when unset.
    #[arg(long = "logs.file.directory", global = true, env = "PAYWATCH_LOGS_FILE_DIRECTORY")]
    pub file_directory: Option<PathBuf>,

    /// Format of the log files.
    #[arg(
        long = "logs.file.format",
        default_value = "full",
        global = true,
        env = "PAYWATCH_LOGS_FILE_FORMAT"
    )]
    pub file_format: LogFormat,

    /// Rotation of the log files.
    #[arg(
        long = "logs.file.rotation",
        default_value = "never",
        global = true,
        env = "PAYWATCH_LOGS_FILE_ROTATION"
    )]
    pub file_rotation: LogRotation,
}

impl Default for LogArgs {
    fn default() -> Self {
        Self {
            level: 0,
            stdout_quiet: false,
            stdout_format: LogFormat::Full,
            file_directory: None,
            file_format: LogFormat::Full,
            file_rotation: LogRotation::Never,
        }
    }
}

/// How often a new log file is started.
#[derive(
    Default, Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[clap(rename_all = "lowercase")]
pub enum LogRotation {
    /// Every minute.
    Minutely,
    /// Every hour.
    Hourly,
    /// Every day.
    Daily,
    /// Never.
    #[default]
    Never,
}

/// Stdout log output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StdoutLogConfig {
    /// Format of the lines.
    pub format: LogFormat,
}

/// Log file output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLogConfig {
    /// Directory of the log files.
    pub directory_path: PathBuf,
    /// Format of the lines.
    pub format: LogFormat,
    /// Rotation of the files.
    pub rotation: LogRotation,
}

/// Resolved logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Level applied on top of the environment filter.
    pub global_level: LevelFilter,
    /// Stdout output, `None` when quiet.
    pub stdout_logs: Option<StdoutLogConfig>,
    /// File output, `None` without log directory.
    pub file_logs: Option<FileLogConfig>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            global_level: LevelFilter::INFO,
            stdout_logs: Some(StdoutLogConfig::default()),
            file_logs: None,
        }
    }
}

impl LogConfig {
    /// Resolves the configuration of `args`.
    pub fn new(args: LogArgs) -> Self {
        let global_level = match args.level {
            0 | 3 => LevelFilter::INFO,
            1 => LevelFilter::ERROR,
            2 => LevelFilter::WARN,
            4 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        };
        let stdout_logs =
            (!args.stdout_quiet).then_some(StdoutLogConfig { format: args.stdout_format });
        let file_logs = args.file_directory.map(|directory_path| FileLogConfig {
            directory_path,
            format: args.file_format,
            rotation: args.file_rotation,
        });

        Self { global_level, stdout_logs, file_logs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use rstest::rstest;

    #[derive(Parser, Debug)]
    struct MockCommand {
        #[command(flatten)]
        logs: LogArgs,
    }

    #[rstest]
    #[case::default(&[], LevelFilter::INFO)]
    #[case::error(&["-v"], LevelFilter::ERROR)]
    #[case::warn(&["-vv"], LevelFilter::WARN)]
    #[case::info(&["-vvv"], LevelFilter::INFO)]
    #[case::debug(&["-vvvv"], LevelFilter::DEBUG)]
    #[case::trace(&["-vvvvv"], LevelFilter::TRACE)]
    fn test_verbosity_levels(#[case] flags: &[&str], #[case] expected: LevelFilter) {
        let args = MockCommand::parse_from(std::iter::once("test").chain(flags.iter().copied()));
        assert_eq!(LogConfig::new(args.logs).global_level, expected);
    }

    #[test]
    fn test_quiet_and_file_logs() {
        let args = MockCommand::parse_from([
            "test",
            "-q",
            "--logs.file.directory",
            "/var/log/paywatch",
            "--logs.file.format",
            "json",
            "--logs.file.rotation",
            "daily",
        ]);
        let config = LogConfig::new(args.logs);

        assert_eq!(config.stdout_logs, None);
        assert_eq!(
            config.file_logs,
            Some(FileLogConfig {
                directory_path: PathBuf::from("/var/log/paywatch"),
                format: LogFormat::Json,
                rotation: LogRotation::Daily,
            })
        );
    }

    #[test]
    fn test_default_matches_no_flags() {
        assert_eq!(MockCommand::parse_from(["test"]).logs, LogArgs::default());
        assert_eq!(LogConfig::new(LogArgs::default()), LogConfig::default());
    }
}
