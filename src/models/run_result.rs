//! Run outcome models
//!
//! Per-test outcomes and the ordered error list a replay run produces.

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use super::test_definition::{method_serde, TestDefinition};

/// Why a single catalog entry failed
#[derive(Error, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// Network-level failure: DNS, refused connection, timeout
    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("non-success status code: {code}, body: {body}")]
    NonSuccessStatus { code: u16, body: String },

    /// The payload could not be encoded as JSON
    #[error("payload encoding failed: {message}")]
    Payload { message: String },

    /// Debug capture of the exchange could not be written
    #[error("diagnostic dump failed: {message}")]
    Diagnostic { message: String },
}

/// A failure attached to the catalog entry that triggered it
#[derive(Error, Clone, Debug, PartialEq, Eq, Serialize)]
#[error("{name} [{method} {path}]: {kind}")]
pub struct TestError {
    pub index: usize,
    pub name: String,
    #[serde(with = "method_serde")]
    pub method: Method,
    pub path: String,
    pub kind: FailureKind,
}

impl TestError {
    pub fn new(index: usize, definition: &TestDefinition, kind: FailureKind) -> Self {
        Self {
            index,
            name: definition.name.clone(),
            method: definition.method.clone(),
            path: definition.path.clone(),
            kind,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match &self.kind {
            FailureKind::NonSuccessStatus { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Classification of one executed entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Pass,
    Fail,
    Error,
}

impl OutcomeStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            OutcomeStatus::Pass => "✓",
            OutcomeStatus::Fail => "✗",
            OutcomeStatus::Error => "!",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Pass => write!(f, "PASS"),
            OutcomeStatus::Fail => write!(f, "FAIL"),
            OutcomeStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// What happened to a single catalog entry
#[derive(Clone, Debug, Serialize)]
pub struct TestOutcome {
    pub index: usize,
    pub name: String,
    #[serde(with = "method_serde")]
    pub method: Method,
    pub path: String,
    pub status: OutcomeStatus,
    pub status_code: Option<u16>,
    pub duration_ms: u64,
}

impl TestOutcome {
    pub fn new(
        index: usize,
        definition: &TestDefinition,
        status: OutcomeStatus,
        status_code: Option<u16>,
        duration_ms: u64,
    ) -> Self {
        Self {
            index,
            name: definition.name.clone(),
            method: definition.method.clone(),
            path: definition.path.clone(),
            status,
            status_code,
            duration_ms,
        }
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{} {}] [{}ms]",
            self.status.symbol(),
            self.name,
            self.method,
            self.path,
            self.duration_ms
        )?;
        if let Some(code) = self.status_code {
            write!(f, " - {code}")?;
        }
        Ok(())
    }
}

/// Result of one pass over the catalog
#[derive(Clone, Debug, Serialize)]
pub struct RunResult {
    pub started_at: DateTime<Utc>,
    /// Entries in the catalog handed to the runner
    pub total: usize,
    pub outcomes: Vec<TestOutcome>,
    /// Failures in the order they were encountered
    pub errors: Vec<TestError>,
    pub total_duration_ms: u64,
    /// Set when fail-fast stopped the run before the catalog was exhausted
    pub aborted: bool,
}

impl RunResult {
    pub fn new(total: usize) -> Self {
        Self {
            started_at: Utc::now(),
            total,
            outcomes: Vec::with_capacity(total),
            errors: Vec::new(),
            total_duration_ms: 0,
            aborted: false,
        }
    }

    pub fn record(&mut self, outcome: TestOutcome, error: Option<TestError>) {
        self.outcomes.push(outcome);
        if let Some(error) = error {
            self.errors.push(error);
        }
    }

    pub fn executed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn passed(&self) -> usize {
        self.count(OutcomeStatus::Pass)
    }

    pub fn failed(&self) -> usize {
        self.count(OutcomeStatus::Fail)
    }

    pub fn errored(&self) -> usize {
        self.count(OutcomeStatus::Error)
    }

    fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && !self.aborted
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.passed() as f64 / self.total as f64) * 100.0
        }
    }

    pub fn into_errors(self) -> Vec<TestError> {
        self.errors
    }
}
