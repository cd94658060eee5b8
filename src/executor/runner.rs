//! Test execution runner
//!
//! Replays catalog entries one at a time through the gateway.

use std::time::Instant;
use tracing::{error, info, warn};

use crate::config::RunnerConfig;
use crate::http::{HttpClient, HttpError, HttpRequest};
use crate::models::{FailureKind, OutcomeStatus, RunResult, TestDefinition, TestError, TestOutcome};

/// Sequential replay of a test catalog
pub struct TestRunner {
    client: HttpClient,
    config: RunnerConfig,
}

impl TestRunner {
    /// `client` must already point at the gateway
    pub fn new(client: HttpClient, config: RunnerConfig) -> Self {
        Self { client, config }
    }

    /// Run a single catalog entry
    pub async fn run_test(
        &self,
        index: usize,
        definition: &TestDefinition,
    ) -> (TestOutcome, Option<TestError>) {
        info!("Running test: {}", definition.path);
        let start = Instant::now();

        let mut request = HttpRequest::new(definition.method.clone(), definition.path.clone());
        if let Some(payload) = &definition.payload {
            request = match request.json(payload) {
                Ok(request) => request,
                Err(e) => {
                    let kind = FailureKind::Payload {
                        message: e.to_string(),
                    };
                    return errored(index, definition, start, kind);
                }
            };
        }

        match self.client.send(request).await {
            Ok(response) if response.is_success() => {
                let outcome = TestOutcome::new(
                    index,
                    definition,
                    OutcomeStatus::Pass,
                    Some(response.status.as_u16()),
                    elapsed_ms(start),
                );
                (outcome, None)
            }
            Ok(response) => {
                let code = response.status.as_u16();
                let kind = FailureKind::NonSuccessStatus {
                    code,
                    body: response.body_text(),
                };
                let outcome = TestOutcome::new(
                    index,
                    definition,
                    OutcomeStatus::Fail,
                    Some(code),
                    elapsed_ms(start),
                );
                (outcome, Some(TestError::new(index, definition, kind)))
            }
            Err(HttpError::Policy(e)) => {
                let kind = FailureKind::Diagnostic {
                    message: e.to_string(),
                };
                errored(index, definition, start, kind)
            }
            Err(e) => {
                let kind = FailureKind::Transport {
                    message: e.to_string(),
                };
                errored(index, definition, start, kind)
            }
        }
    }

    /// Run every entry in order, pausing between entries
    pub async fn run(&self, catalog: &[TestDefinition]) -> RunResult {
        info!("Defined {} tests", catalog.len());

        let start = Instant::now();
        let mut result = RunResult::new(catalog.len());

        for (index, definition) in catalog.iter().enumerate() {
            if index > 0 && !self.config.delay.is_zero() {
                tokio::time::sleep(self.config.delay).await;
            }

            let (outcome, failure) = self.run_test(index, definition).await;
            info!("  {}", outcome);

            let failed = failure.is_some();
            if let Some(e) = &failure {
                error!("{}", e);
            }
            result.record(outcome, failure);

            if failed && self.config.fail_fast {
                let remaining = catalog.len() - index - 1;
                if remaining > 0 {
                    warn!("Fail-fast: skipping {} remaining tests", remaining);
                    result.aborted = true;
                }
                break;
            }
        }

        result.total_duration_ms = elapsed_ms(start);
        info!(
            "Run completed in {}ms - Pass: {}/{} ({:.1}%)",
            result.total_duration_ms,
            result.passed(),
            result.total,
            result.pass_rate()
        );

        result
    }
}

fn errored(
    index: usize,
    definition: &TestDefinition,
    start: Instant,
    kind: FailureKind,
) -> (TestOutcome, Option<TestError>) {
    let outcome = TestOutcome::new(index, definition, OutcomeStatus::Error, None, elapsed_ms(start));
    (outcome, Some(TestError::new(index, definition, kind)))
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
