//! Command-line arguments

use clap::Parser;
use std::path::PathBuf;

use vest_relay::AppConfig;

/// Vest Relay - Forward vision detections to the vest's motor controller
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Address to bind (overrides server.host)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides server.port)
    #[arg(short, long, env = "RELAY_PORT")]
    pub port: Option<u16>,

    /// Disable the auto-reset watchdog
    #[arg(long)]
    pub no_auto_reset: bool,
}

impl Args {
    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.no_auto_reset {
            config.watchdog.enabled = false;
        }
    }
}
