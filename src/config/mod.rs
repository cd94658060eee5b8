//! Configuration module
//!
//! Handles loading, layering and validating configuration. The serialisable
//! [`HarnessConfig`] is merged from defaults, a config file, environment
//! variables and CLI flags, then validated once into the read-only
//! [`ProxyConfig`] and [`RunnerConfig`] handed to the gateway and runner.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig};
pub use file::{find_config_file, load_config, save_config};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::http::{DumpSink, HeaderSet, TransportPolicy};

/// Default upstream API
pub const DEFAULT_UPSTREAM: &str = "https://addons-ecs.forgesvc.net/api/v2/";

/// Port the runner targets, and the gateway's own port in bypass mode
pub const DEFAULT_PORT: u16 = 8888;

/// Variable an external recording tool uses to hand the gateway its port
pub const DEFAULT_EXTERNAL_PORT_VAR: &str = "OPTIC_API_PORT";

/// Configuration errors, all fatal at startup
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid upstream URL '{url}': {reason}")]
    InvalidUpstream { url: String, reason: String },

    #[error("Invalid listen address '{0}'")]
    InvalidListenAddress(String),

    #[error("{0} is not set; it must carry the gateway port when not bypassing the external controller")]
    MissingExternalPort(String),

    #[error("Invalid port '{value}' in {var}")]
    InvalidExternalPort { var: String, value: String },

    #[error("Invalid connectivity check URL '{url}': {reason}")]
    InvalidCheckUrl { url: String, reason: String },

    #[error("Invalid header set: {0}")]
    InvalidHeader(String),
}

/// Connectivity gate settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// Endpoint polled until it answers
    pub check_url: String,
    pub interval_ms: u64,
    /// Give up after this many seconds; unset waits forever
    pub timeout_secs: Option<u64>,
    pub skip: bool,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            check_url: "https://google.com/".to_string(),
            interval_ms: 1000,
            timeout_secs: None,
            skip: false,
        }
    }
}

/// Complete harness configuration as written in config files
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Base URL of the real API; request paths are appended to its path
    pub upstream_url: String,

    /// Interface the gateway binds
    pub listen_host: String,

    /// Fixed local port
    pub port: u16,

    /// Listen on `port` directly instead of the externally supplied port
    pub bypass_external_controller: bool,

    pub external_port_var: String,

    /// Dump requests and responses
    pub debug: bool,

    /// Include request bodies in dumps
    pub dump_bodies: bool,

    /// Append dumps to this file instead of stderr
    pub dump_file: Option<PathBuf>,

    /// Pause between catalog entries
    pub delay_ms: u64,

    /// Stop at the first failing entry
    pub fail_fast: bool,

    /// HTTP timeout in seconds
    pub timeout_secs: u64,

    /// Wait after the run so the last response can travel back through an external recorder
    pub drain_ms: u64,

    pub connectivity: ConnectivityConfig,

    /// Headers set on every outbound request
    pub headers: BTreeMap<String, String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            upstream_url: DEFAULT_UPSTREAM.to_string(),
            listen_host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            bypass_external_controller: false,
            external_port_var: DEFAULT_EXTERNAL_PORT_VAR.to_string(),
            debug: false,
            dump_bodies: false,
            dump_file: None,
            delay_ms: 3000,
            fail_fast: false,
            timeout_secs: 30,
            drain_ms: 1000,
            connectivity: ConnectivityConfig::default(),
            headers: HeaderSet::desktop_client().to_pairs(),
        }
    }
}

impl HarnessConfig {
    /// Overlay values picked up from the environment
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(upstream) = &env.upstream {
            self.upstream_url = upstream.clone();
        }
        if let Some(host) = &env.listen_host {
            self.listen_host = host.clone();
        }
        if let Some(port) = env.port {
            self.port = port;
        }
        if let Some(bypass) = env.bypass {
            self.bypass_external_controller = bypass;
        }
        if let Some(debug) = env.debug {
            self.debug = debug;
        }
        if let Some(dump_bodies) = env.dump_bodies {
            self.dump_bodies = dump_bodies;
        }
        if let Some(dump_file) = &env.dump_file {
            self.dump_file = Some(PathBuf::from(dump_file));
        }
        if let Some(delay_ms) = env.delay_ms {
            self.delay_ms = delay_ms;
        }
        if let Some(fail_fast) = env.fail_fast {
            self.fail_fast = fail_fast;
        }
        if let Some(timeout) = env.timeout {
            self.timeout_secs = timeout;
        }
        if let Some(check_url) = &env.check_url {
            self.connectivity.check_url = check_url.clone();
        }
    }

    /// Resolve into runtime settings; `lookup` reads the external port variable
    pub fn validate<F>(&self, lookup: F) -> Result<Settings, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let upstream = parse_upstream(&self.upstream_url)?;

        let host: IpAddr = self
            .listen_host
            .parse()
            .map_err(|_| ConfigError::InvalidListenAddress(self.listen_host.clone()))?;

        let listen_port = if self.bypass_external_controller {
            self.port
        } else {
            let var = &self.external_port_var;
            let value = lookup(var).ok_or_else(|| ConfigError::MissingExternalPort(var.clone()))?;
            value
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidExternalPort {
                    var: var.clone(),
                    value: value.clone(),
                })?
        };

        let target = Url::parse(&format!("http://localhost:{}/", self.port))
            .map_err(|e| ConfigError::InvalidListenAddress(e.to_string()))?;

        let check_url =
            Url::parse(&self.connectivity.check_url).map_err(|e| ConfigError::InvalidCheckUrl {
                url: self.connectivity.check_url.clone(),
                reason: e.to_string(),
            })?;

        let headers = HeaderSet::from_pairs(&self.headers)
            .map_err(|e| ConfigError::InvalidHeader(e.to_string()))?;

        Ok(Settings {
            proxy: ProxyConfig {
                listen_addr: SocketAddr::new(host, listen_port),
                upstream,
                bypass_external_controller: self.bypass_external_controller,
                timeout_secs: self.timeout_secs,
            },
            runner: RunnerConfig {
                timeout_secs: self.timeout_secs,
                drain: Duration::from_millis(self.drain_ms),
                ..RunnerConfig::new(target)
                    .with_delay(Duration::from_millis(self.delay_ms))
                    .fail_fast(self.fail_fast)
            },
            connectivity: ConnectivitySettings {
                check_url,
                interval: Duration::from_millis(self.connectivity.interval_ms),
                timeout: self.connectivity.timeout_secs.map(Duration::from_secs),
                skip: self.connectivity.skip,
            },
            headers,
            debug: self.debug,
            dump_bodies: self.dump_bodies,
            dump_file: self.dump_file.clone(),
        })
    }
}

/// Parse the upstream base URL; it must be absolute http(s) with a host
pub fn parse_upstream(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUpstream {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}

/// Gateway configuration, fixed for the life of the process
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyConfig {
    pub listen_addr: SocketAddr,
    pub upstream: Url,
    pub bypass_external_controller: bool,
    pub timeout_secs: u64,
}

impl ProxyConfig {
    pub fn new(listen_addr: SocketAddr, upstream: Url) -> Self {
        Self {
            listen_addr,
            upstream,
            bypass_external_controller: true,
            timeout_secs: 30,
        }
    }
}

/// Test runner configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Address every catalog path is resolved against
    pub target: Url,
    pub delay: Duration,
    pub fail_fast: bool,
    pub timeout_secs: u64,
    pub drain: Duration,
}

impl RunnerConfig {
    pub fn new(target: Url) -> Self {
        Self {
            target,
            delay: Duration::from_secs(3),
            fail_fast: false,
            timeout_secs: 30,
            drain: Duration::from_secs(1),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }
}

/// Connectivity gate runtime settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectivitySettings {
    pub check_url: Url,
    pub interval: Duration,
    pub timeout: Option<Duration>,
    pub skip: bool,
}

/// Everything validated from a [`HarnessConfig`]
#[derive(Clone, Debug)]
pub struct Settings {
    pub proxy: ProxyConfig,
    pub runner: RunnerConfig,
    pub connectivity: ConnectivitySettings,
    pub headers: HeaderSet,
    pub debug: bool,
    pub dump_bodies: bool,
    pub dump_file: Option<PathBuf>,
}

impl Settings {
    /// Transport policy shared by the gateway and the runner's client
    pub fn transport_policy(&self) -> anyhow::Result<TransportPolicy> {
        let mut policy = TransportPolicy::new(self.headers.clone())
            .with_debug(self.debug)
            .with_dump_bodies(self.dump_bodies);

        if let Some(path) = &self.dump_file {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open dump file: {}", path.display()))?;
            policy = policy.with_sink(DumpSink::from_writer(file));
        }
        Ok(policy)
    }
}
