//! Command-line interface handling for the Strife server.
//!
//! This module provides command-line argument parsing using the `clap` crate.
//! Every option overrides the matching configuration file setting.

use clap::{Arg, Command};
use std::path::PathBuf;

/// Command line arguments parsed from user input.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for the session capacity
    pub max_sessions: Option<usize>,
    /// Optional override for the idle timeout in seconds
    pub idle_timeout_secs: Option<u64>,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
}

impl CliArgs {
    /// Parses command line arguments using clap.
    ///
    /// Exits the process with a usage message when an argument is malformed.
    pub fn parse() -> Self {
        let matches = Command::new("Strife Server")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Session host for Strife and Strike tabletop battles")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .default_value("config.toml"),
            )
            .arg(
                Arg::new("max-sessions")
                    .short('m')
                    .long("max-sessions")
                    .value_name("COUNT")
                    .help("Maximum number of concurrently live sessions")
                    .value_parser(clap::value_parser!(usize)),
            )
            .arg(
                Arg::new("idle-timeout")
                    .long("idle-timeout")
                    .value_name("SECONDS")
                    .help("Reclaim sessions older than this many seconds")
                    .value_parser(clap::value_parser!(u64)),
            )
            .arg(
                Arg::new("log-level")
                    .short('l')
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Log level (trace, debug, info, warn, error)"),
            )
            .arg(
                Arg::new("json-logs")
                    .long("json-logs")
                    .help("Output logs in JSON format")
                    .action(clap::ArgAction::SetTrue),
            )
            .get_matches();

        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config.toml")),
            max_sessions: matches.get_one::<usize>("max-sessions").copied(),
            idle_timeout_secs: matches.get_one::<u64>("idle-timeout").copied(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
        }
    }
}
