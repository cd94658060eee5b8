//! Data models for the replay harness
//!
//! Catalog entries, per-test outcomes and the run result.

mod run_result;
mod test_definition;

pub use run_result::{FailureKind, OutcomeStatus, RunResult, TestError, TestOutcome};
pub use test_definition::TestDefinition;
