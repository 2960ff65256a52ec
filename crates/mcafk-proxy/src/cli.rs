//! CLI implementation for the mcafk binary.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use mcafk_core::config::Config;
use mcafk_core::constants::DEFAULT_ADAPTER_ADDR;
use mcafk_core::Result;

/// Log output format for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CliLogFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// Structured JSON output.
    Json,
}

impl From<CliLogFormat> for mcafk_core::LogFormat {
    fn from(fmt: CliLogFormat) -> Self {
        match fmt {
            CliLogFormat::Text => mcafk_core::LogFormat::Text,
            CliLogFormat::Json => mcafk_core::LogFormat::Json,
        }
    }
}

/// mcafk - anti-idle Minecraft proxy.
#[derive(Debug, Parser)]
#[command(name = "mcafk", version, about = "mcafk - anti-idle Minecraft proxy")]
pub struct Cli {
    /// Configuration file (JSON); defaults apply when omitted
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address the protocol adapter connects to
    #[arg(short = 'l', long = "listen", default_value = DEFAULT_ADAPTER_ADDR)]
    pub listen: SocketAddr,

    /// Increase verbosity (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Log to file instead of stderr
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Log output format
    #[arg(long = "log-format", default_value = "text")]
    pub log_format: CliLogFormat,
}

impl Cli {
    /// Load the configuration file, or the defaults when none was given.
    pub fn load_config(&self) -> Result<Config> {
        match &self.config {
            Some(path) => Config::load(path),
            None => Ok(Config::default()),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
