//! Connectivity gate
//!
//! Blocks startup until the machine can reach the internet, e.g. while a
//! firewall prompt for the process is still pending.

use anyhow::{Context, Result};
use reqwest::Client;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info};
use url::Url;

use crate::config::ConnectivitySettings;

/// Only the bounded variant can fail
#[derive(Error, Debug)]
pub enum ConnectivityError {
    #[error("No connectivity to {url} after {waited_secs}s")]
    Timeout { url: String, waited_secs: u64 },
}

/// Polls a well-known endpoint until one attempt gets an HTTP response
pub struct ConnectivityGate {
    client: Client,
    check_url: Url,
    interval: Duration,
    timeout: Option<Duration>,
}

impl ConnectivityGate {
    pub fn new(check_url: Url) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create connectivity check client")?;

        Ok(Self {
            client,
            check_url,
            interval: Duration::from_secs(1),
            timeout: None,
        })
    }

    pub fn from_settings(settings: &ConnectivitySettings) -> Result<Self> {
        Ok(Self::new(settings.check_url.clone())?
            .interval(settings.interval)
            .timeout(settings.timeout))
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Bound the wait; `None` waits forever
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Single attempt; any status counts as reachable
    pub async fn is_reachable(&self) -> bool {
        match self.client.get(self.check_url.clone()).send().await {
            Ok(response) => {
                debug!("Connectivity check answered with {}", response.status());
                true
            }
            Err(e) => {
                debug!("Connectivity check failed: {}", e);
                false
            }
        }
    }

    /// Return once the check endpoint is reachable
    pub async fn wait_for_connectivity(&self) -> Result<(), ConnectivityError> {
        let start = Instant::now();
        info!("Waiting for connectivity to {}", self.check_url);

        loop {
            if self.is_reachable().await {
                info!(
                    "Connectivity confirmed after {}ms",
                    start.elapsed().as_millis()
                );
                return Ok(());
            }

            if let Some(timeout) = self.timeout {
                if start.elapsed() >= timeout {
                    return Err(ConnectivityError::Timeout {
                        url: self.check_url.to_string(),
                        waited_secs: start.elapsed().as_secs(),
                    });
                }
            }

            sleep(self.interval).await;
        }
    }
}
