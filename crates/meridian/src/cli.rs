//! Command-line interface handling for the Meridian world server.
//!
//! This module provides command-line argument parsing using the `clap` crate,
//! covering the handful of settings worth overriding without editing the
//! configuration file.

use clap::{Arg, Command};
use std::path::PathBuf;

/// Command line arguments parsed from user input.
///
/// These override the corresponding values from the TOML configuration file.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for the seed-data directory
    pub data_dir: Option<PathBuf>,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
}

impl CliArgs {
    /// Parses command line arguments using clap.
    ///
    /// All arguments have defaults, so parsing never fails on missing input.
    pub fn parse() -> Self {
        let matches = Command::new("Meridian World Server")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Authoritative world-state server node for the Meridian multiplayer world")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .default_value("config.toml"),
            )
            .arg(
                Arg::new("data")
                    .short('d')
                    .long("data")
                    .value_name("DIR")
                    .help("Seed-data directory path"),
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
            config_path: PathBuf::from(
                matches
                    .get_one::<String>("config")
                    .expect("Default config path should always be set"),
            ),
            data_dir: matches.get_one::<String>("data").map(PathBuf::from),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
        }
    }
}
