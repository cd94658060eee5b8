//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::HarnessConfig;

/// Recording proxy gateway and contract replay harness
#[derive(Parser, Debug)]
#[command(name = "contract-proxy")]
#[command(version = "0.1.0")]
#[command(about = "Replay an API test catalog through a local recording proxy")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Wait for connectivity, start the gateway and replay the catalog through it
    Run(RunArgs),

    /// Run only the gateway until interrupted
    Serve(ServeArgs),

    /// List the test catalog
    List(ListArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Gateway and transport flags shared by `run` and `serve`
#[derive(ClapArgs, Debug, Default)]
pub struct ProxyArgs {
    /// Upstream API base URL
    #[arg(short, long)]
    pub upstream: Option<String>,

    /// Local port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Listen on the local port directly instead of the externally supplied port
    #[arg(long)]
    pub bypass: bool,

    /// Dump every request and response to stderr
    #[arg(short, long)]
    pub debug: bool,

    /// Include request bodies in dumps
    #[arg(long)]
    pub dump_bodies: bool,

    /// Append dumps to this file instead of stderr
    #[arg(long)]
    pub dump_file: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl ProxyArgs {
    /// Flags override every other configuration layer
    pub fn apply(&self, config: &mut HarnessConfig) {
        if let Some(upstream) = &self.upstream {
            config.upstream_url = upstream.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.bypass {
            config.bypass_external_controller = true;
        }
        if self.debug {
            config.debug = true;
        }
        if self.dump_bodies {
            config.dump_bodies = true;
        }
        if let Some(dump_file) = &self.dump_file {
            config.dump_file = Some(dump_file.clone());
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
    }
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub proxy: ProxyArgs,

    /// Delay between catalog entries in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Stop at the first failing entry
    #[arg(long)]
    pub fail_fast: bool,

    /// Only run entries whose name contains this text
    #[arg(long)]
    pub only: Option<String>,

    /// Load the catalog from a YAML or JSON file
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Output format (table, json, json-pretty, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Save the report to file
    #[arg(short, long)]
    pub output: Option<String>,

    /// Do not wait for internet connectivity
    #[arg(long)]
    pub skip_connectivity: bool,

    /// Give up waiting for connectivity after this many seconds
    #[arg(long)]
    pub connectivity_timeout: Option<u64>,
}

impl RunArgs {
    pub fn apply(&self, config: &mut HarnessConfig) {
        self.proxy.apply(config);
        if let Some(delay_ms) = self.delay_ms {
            config.delay_ms = delay_ms;
        }
        if self.fail_fast {
            config.fail_fast = true;
        }
        if self.skip_connectivity {
            config.connectivity.skip = true;
        }
        if let Some(timeout) = self.connectivity_timeout {
            config.connectivity.timeout_secs = Some(timeout);
        }
    }
}

/// Arguments for serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub proxy: ProxyArgs,
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Load the catalog from a YAML or JSON file
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Only list entries whose name contains this text
    #[arg(long)]
    pub only: Option<String>,

    /// Output format (table, json, json-pretty, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show {
        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },

    /// Write a configuration file with the defaults
    Init {
        /// Output file path
        #[arg(short, long, default_value = "./contract-proxy.yaml")]
        output: String,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// List the supported environment variables
    Env,
}
