//! Test execution engine
//!
//! Provides sequential replay of a test catalog.

mod runner;

pub use runner::TestRunner;
