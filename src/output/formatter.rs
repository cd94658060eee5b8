//! Output formatters for run reports
//!
//! Provides JSON, Table, and summary output formats.

use std::io::Write;

use crate::models::{OutcomeStatus, RunResult, TestDefinition, TestOutcome};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn status_label(&self, status: OutcomeStatus) -> String {
        let label = format!("{} {:5}", status.symbol(), status);
        if !self.colorize {
            return label;
        }
        match status {
            OutcomeStatus::Pass => format!("\x1b[32m{label}\x1b[0m"),
            OutcomeStatus::Fail | OutcomeStatus::Error => format!("\x1b[31m{label}\x1b[0m"),
        }
    }

    fn format_outcome_table(&self, outcome: &TestOutcome) -> String {
        let code = outcome
            .status_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{:2}. {:32} {} {:>3} [{:>6}ms]",
            outcome.index + 1,
            outcome.name,
            self.status_label(outcome.status),
            code,
            outcome.duration_ms
        )
    }

    /// Format the report of one run
    pub fn format_result(&self, result: &RunResult) -> String {
        match self.format {
            OutputFormat::Table => self.format_result_table(result),
            OutputFormat::Json => serde_json::to_string(result).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(result).unwrap_or_default(),
            OutputFormat::Summary => self.format_result_brief(result),
        }
    }

    fn format_result_table(&self, result: &RunResult) -> String {
        let mut output = String::new();

        // Header
        output.push_str("\n╔══════════════════════════════════════════════════════════════╗\n");
        output.push_str(&format!(
            "║  Replay started {:45} ║\n",
            result.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");

        for outcome in &result.outcomes {
            output.push_str(&format!("  {}\n", self.format_outcome_table(outcome)));
        }

        // Errors in encounter order
        if !result.errors.is_empty() {
            output.push_str("╠══════════════════════════════════════════════════════════════╣\n");
            for error in &result.errors {
                output.push_str(&format!("  {:2}. {}\n", error.index + 1, error));
            }
        }

        // Footer
        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");

        let pass_str = if self.colorize {
            format!("\x1b[32m{}\x1b[0m", result.passed())
        } else {
            result.passed().to_string()
        };
        let fail_str = if self.colorize && result.failed() > 0 {
            format!("\x1b[31m{}\x1b[0m", result.failed())
        } else {
            result.failed().to_string()
        };

        output.push_str(&format!(
            "║  Total: {:2} | Run: {:2} | Pass: {} | Fail: {} | Error: {:2}\n",
            result.total,
            result.executed(),
            pass_str,
            fail_str,
            result.errored()
        ));
        output.push_str(&format!(
            "║  Pass Rate: {:5.1}% | Duration: {:6}ms\n",
            result.pass_rate(),
            result.total_duration_ms
        ));
        if result.aborted {
            output.push_str("║  Stopped early after the first failure\n");
        }
        output.push_str("╚══════════════════════════════════════════════════════════════╝\n");

        output
    }

    fn format_result_brief(&self, result: &RunResult) -> String {
        let mut brief = format!(
            "{}/{} passed ({:.1}%), {} errors in {}ms",
            result.passed(),
            result.total,
            result.pass_rate(),
            result.errors.len(),
            result.total_duration_ms
        );
        if result.aborted {
            brief.push_str(" (aborted)");
        }
        brief
    }

    /// Format a catalog listing
    pub fn format_catalog(&self, catalog: &[TestDefinition]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string(catalog).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(catalog).unwrap_or_default(),
            OutputFormat::Summary => format!("{} tests", catalog.len()),
            OutputFormat::Table => {
                let mut output = String::new();
                for (i, def) in catalog.iter().enumerate() {
                    let payload = if def.has_payload() { " +json" } else { "" };
                    output.push_str(&format!(
                        "{:2}. {:32} {:6} {}{}\n",
                        i + 1,
                        def.name,
                        def.method.as_str(),
                        def.path,
                        payload
                    ));
                }
                output
            }
        }
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

/// Write a run report to a file
pub fn write_report_to_file(path: &str, result: &RunResult, format: OutputFormat) -> anyhow::Result<()> {
    let formatter = ResultFormatter::new(format).no_color();
    let content = formatter.format_result(result);

    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FailureKind, TestError};
    use serde_json::json;

    fn sample() -> RunResult {
        let ok = TestDefinition::get("Get Addon", "addon/310806");
        let missing = TestDefinition::get("Missing Addon", "addon/999999");

        let mut result = RunResult::new(2);
        result.record(TestOutcome::new(0, &ok, OutcomeStatus::Pass, Some(200), 12), None);
        result.record(
            TestOutcome::new(1, &missing, OutcomeStatus::Fail, Some(404), 8),
            Some(TestError::new(
                1,
                &missing,
                FailureKind::NonSuccessStatus {
                    code: 404,
                    body: "not found".to_string(),
                },
            )),
        );
        result.total_duration_ms = 20;
        result
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("TABLE"), Some(OutputFormat::Table));
        assert_eq!(OutputFormat::from_str("csv"), None);
    }

    #[test]
    fn test_formatter_creation() {
        let formatter = ResultFormatter::new(OutputFormat::Json).no_color();
        assert_eq!(formatter.format, OutputFormat::Json);
        assert!(!formatter.colorize);
    }

    #[test]
    fn test_table_lists_outcomes_and_errors() {
        let output = ResultFormatter::new(OutputFormat::Table)
            .no_color()
            .format_result(&sample());

        assert!(output.contains("Get Addon"));
        assert!(output.contains("✗ FAIL"));
        assert!(output.contains("non-success status code: 404, body: not found"));
        assert!(output.contains("Pass Rate:  50.0%"));
        assert!(!output.contains("\x1b["));
    }

    #[test]
    fn test_summary_format() {
        let output = ResultFormatter::new(OutputFormat::Summary).format_result(&sample());
        assert_eq!(output, "1/2 passed (50.0%), 1 errors in 20ms");
    }

    #[test]
    fn test_json_report_is_structured() {
        let output = ResultFormatter::new(OutputFormat::Json).format_result(&sample());
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["total"], 2);
        assert_eq!(value["outcomes"][0]["status"], "pass");
        assert_eq!(value["errors"][0]["kind"]["kind"], "non_success_status");
        assert_eq!(value["errors"][0]["kind"]["code"], 404);
        assert_eq!(value["errors"][0]["method"], "GET");
    }

    #[test]
    fn test_catalog_table() {
        let catalog = vec![
            TestDefinition::get("Get Game Info", "game/432"),
            TestDefinition::post("Get Multiple Addons", "addon", json!([1, 2])),
        ];
        let output = ResultFormatter::new(OutputFormat::Table).format_catalog(&catalog);

        assert_eq!(output.lines().count(), 2);
        assert!(output.contains("POST"));
        assert!(output.contains("+json"));
    }

    #[test]
    fn test_write_report_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        write_report_to_file(path.to_str().unwrap(), &sample(), OutputFormat::Json).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with('{'));
    }
}
