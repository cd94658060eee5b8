//! Contract Proxy - recording proxy gateway and contract replay harness
//!
//! Replays a fixed catalog of API calls through a local proxy gateway that
//! forwards them to the real upstream API with a uniform header policy, so an
//! external recording tool sitting in front of the gateway can observe the
//! traffic and derive an API contract from it.
//!
//! ## Features
//!
//! - Built-in 25-entry catalog for the CurseForge v2 API, or a catalog file
//! - Uniform desktop-client header set on every outbound request
//! - Request/response dumps for debugging
//! - Connectivity gate before any traffic is sent
//! - Multiple report formats (Table, JSON, Summary)
//!
//! ## Usage
//!
//! ```bash
//! # Replay the built-in catalog, gateway listening on the local port
//! contract-proxy run --bypass
//!
//! # Behind a recorder that hands the gateway its port in OPTIC_API_PORT
//! OPTIC_API_PORT=41234 contract-proxy run
//!
//! # Only the addon endpoints, no pauses, stop at the first failure
//! contract-proxy run --bypass --only addon --delay-ms 0 --fail-fast
//!
//! # Just the gateway
//! contract-proxy serve --bypass --debug
//!
//! # List the catalog
//! contract-proxy list
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

mod catalog;
mod cli;
mod config;
mod connectivity;
mod executor;
mod gateway;
mod http;
mod models;
mod output;
mod utils;

#[cfg(test)]
mod test_support;

use cli::Args;
use config::{EnvConfig, HarnessConfig, Settings};
use connectivity::ConnectivityGate;
use executor::TestRunner;
use gateway::{Gateway, GatewayError, ListenerState};
use http::HttpClient;
use models::TestDefinition;
use output::{OutputFormat, ResultFormatter};
use utils::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logger(if args.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    });

    match args.command {
        cli::Command::Run(run_args) => {
            run_replay(run_args, args.config.as_deref()).await?;
        }
        cli::Command::Serve(serve_args) => {
            serve(serve_args, args.config.as_deref()).await?;
        }
        cli::Command::List(list_args) => {
            list_catalog(list_args)?;
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args, args.config.as_deref())?;
        }
    }

    Ok(())
}

/// Defaults, then the config file, then `CONTRACT_PROXY_*` variables
fn load_harness_config(path: Option<&Path>) -> Result<HarnessConfig> {
    let env = EnvConfig::load();
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| env.config_file.as_ref().map(PathBuf::from));

    let mut config = config::load_config(path.as_deref())?;
    config.apply_env(&env);
    Ok(config)
}

fn validate(config: &HarnessConfig) -> Result<Settings> {
    let settings = config
        .validate(|var| std::env::var(var).ok())
        .context("Invalid configuration")?;
    Ok(settings)
}

fn select_catalog(path: Option<&Path>, only: Option<&str>) -> Result<Vec<TestDefinition>> {
    let catalog = match path {
        Some(path) => catalog::load(path)?,
        None => catalog::builtin(),
    };

    match only {
        Some(needle) => {
            let filtered = catalog::filter(catalog, needle);
            if filtered.is_empty() {
                anyhow::bail!("No tests match '{needle}'");
            }
            Ok(filtered)
        }
        None => Ok(catalog),
    }
}

async fn run_replay(args: cli::RunArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = load_harness_config(config_path)?;
    args.apply(&mut config);
    let settings = validate(&config)?;

    let catalog = select_catalog(args.catalog.as_deref(), args.only.as_deref())?;
    let format = OutputFormat::from_str(&args.format).unwrap_or(OutputFormat::Table);

    if settings.connectivity.skip {
        info!("Skipping connectivity check");
    } else {
        ConnectivityGate::from_settings(&settings.connectivity)?
            .wait_for_connectivity()
            .await?;
    }

    let policy = settings.transport_policy()?;
    let proxy = Arc::new(settings.proxy.clone());
    let mut handle = Gateway::new(proxy, policy.clone())?.spawn();
    handle.wait_ready().await?;

    let runner_config = settings.runner.clone();
    let client = HttpClient::with_timeout(policy, runner_config.timeout_secs)?
        .base_url(runner_config.target.clone());
    info!("Replaying through {}", runner_config.target);

    let drain = runner_config.drain;
    let runner = TestRunner::new(client, runner_config);
    let result = runner.run(&catalog).await;

    // Let the last exchange finish passing through an external recorder
    tokio::time::sleep(drain).await;
    let gateway_result = handle.shutdown().await;

    let formatter = ResultFormatter::new(format);
    println!("{}", formatter.format_result(&result));

    if let Some(path) = &args.output {
        output::write_report_to_file(path, &result, format)?;
        info!("Report saved to {}", path);
    }

    let failures = result.errors.len();
    for e in result.into_errors() {
        error!("{}", e);
    }

    replay_outcome(failures, catalog.len(), gateway_result)
}

/// Fold test failures and a fatal gateway error into the command result
fn replay_outcome(
    failures: usize,
    total: usize,
    gateway: std::result::Result<(), GatewayError>,
) -> Result<()> {
    match gateway {
        Err(e) if failures > 0 => {
            Err(e).with_context(|| format!("{failures} of {total} tests failed"))
        }
        Err(e) => Err(e.into()),
        Ok(()) if failures > 0 => anyhow::bail!("{failures} of {total} tests failed"),
        Ok(()) => Ok(()),
    }
}

async fn serve(args: cli::ServeArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = load_harness_config(config_path)?;
    args.proxy.apply(&mut config);
    let settings = validate(&config)?;

    let proxy = Arc::new(settings.proxy.clone());
    let mut handle = Gateway::new(proxy, settings.transport_policy()?)?.spawn();
    let addr = handle.wait_ready().await?;
    info!("Serving on {}, press Ctrl-C to stop", addr);

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            info!("Shutting down gateway");
        }
        _ = handle.stopped() => {
            warn!("Gateway stopped on its own");
        }
    }

    if let ListenerState::Listening(addr) = handle.state() {
        info!("Closing listener on {}", addr);
    }

    handle.shutdown().await?;
    Ok(())
}

fn list_catalog(args: cli::ListArgs) -> Result<()> {
    let catalog = select_catalog(args.catalog.as_deref(), args.only.as_deref())?;
    let format = OutputFormat::from_str(&args.format).unwrap_or(OutputFormat::Table);

    if format == OutputFormat::Table {
        println!("\nTest Catalog ({} total)\n", catalog.len());
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
    print!("{}", ResultFormatter::new(format).format_catalog(&catalog));
    if format != OutputFormat::Table {
        println!();
    }

    Ok(())
}

fn manage_config(args: cli::ConfigArgs, config_path: Option<&Path>) -> Result<()> {
    match args.action {
        cli::ConfigAction::Show { format } => {
            let config = load_harness_config(config_path)?;
            let output = if format == "json" {
                serde_json::to_string_pretty(&config)?
            } else {
                serde_yaml::to_string(&config)?
            };
            println!("{output}");
        }

        cli::ConfigAction::Init { output, force } => {
            let path = Path::new(&output);
            if path.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {output}. Use --force to overwrite."
                );
            }

            config::save_config(&HarnessConfig::default(), path)?;
            println!("✓ Configuration file created: {output}");
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Env => {
            config::print_env_help();
            if let Some(found) = config::find_config_file() {
                println!();
                println!("Config file in use: {}", found.display());
            }
        }
    }

    Ok(())
}
