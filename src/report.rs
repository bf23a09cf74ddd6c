//! Batch result aggregation and rendering
//!
//! Reduces a batch's outcomes to pass/error counts, the mean build time and
//! the batch wall clock, then renders the per-server table and summary the
//! run prints on completion. The table goes to stdout as product output —
//! it is not logging.

use crate::task::BuildOutcome;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::time::Duration;

/// Placeholder for absent column values
const EMPTY_CELL: &str = "-";

/// Aggregate report over one batch of build outcomes
#[derive(Debug, Clone)]
pub struct BuildReport {
    outcomes: Vec<BuildOutcome>,
    wall_clock: Duration,
    started_at: DateTime<Utc>,
    fault_overrides_pass: bool,
}

impl BuildReport {
    /// Build a report over `outcomes`, with `wall_clock` measured from batch
    /// submission to the last outcome collected
    pub fn new(outcomes: Vec<BuildOutcome>, wall_clock: Duration) -> Self {
        Self {
            outcomes,
            wall_clock,
            started_at: Utc::now() - wall_clock,
            fault_overrides_pass: false,
        }
    }

    /// Count a provider-reported fault as a failure even when the build
    /// wait succeeded. Off by default, matching the tool this one replaces:
    /// a faulted but completed build still counts as passed.
    pub fn with_fault_override(mut self, fault_overrides_pass: bool) -> Self {
        self.fault_overrides_pass = fault_overrides_pass;
        self
    }

    /// Pass/fail of one outcome under the report's fault policy
    fn effective_passed(&self, outcome: &BuildOutcome) -> bool {
        if self.fault_overrides_pass && outcome.fault_message.is_some() {
            return false;
        }
        outcome.passed
    }

    /// Number of outcomes in the batch
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Builds that passed under the fault policy
    pub fn passed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| self.effective_passed(o))
            .count()
    }

    /// Builds that errored under the fault policy
    pub fn errored_count(&self) -> usize {
        self.total() - self.passed_count()
    }

    /// Mean build duration in seconds; `None` for an empty batch
    pub fn average_build_duration(&self) -> Option<f64> {
        if self.outcomes.is_empty() {
            return None;
        }
        let total: f64 = self.outcomes.iter().map(|o| o.build_duration).sum();
        Some(total / self.outcomes.len() as f64)
    }

    /// Batch wall-clock time
    pub fn wall_clock(&self) -> Duration {
        self.wall_clock
    }

    /// When the batch was submitted
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Render the results table and summary
    pub fn render(&self) -> String {
        let mut out = String::new();

        if self.outcomes.is_empty() {
            out.push_str("No servers were built.\n");
        } else {
            let _ = writeln!(
                out,
                "{:<38} {:<12} {:<15} {}",
                "Server Id", "Successful?", "Build Time (s)", "Faults"
            );
            let _ = writeln!(out, "{}", "-".repeat(96));
            for outcome in &self.outcomes {
                let _ = writeln!(
                    out,
                    "{:<38} {:<12} {:<15.2} {}",
                    outcome.server_id.as_deref().unwrap_or(EMPTY_CELL),
                    self.effective_passed(outcome),
                    outcome.build_duration,
                    outcome.fault_message.as_deref().unwrap_or(EMPTY_CELL),
                );
            }
        }

        let average = match self.average_build_duration() {
            Some(avg) => format!("{avg:.2}"),
            None => "no data".to_string(),
        };

        let _ = writeln!(out, "Servers built: {}", self.total());
        let _ = writeln!(out, "Passed: {}", self.passed_count());
        let _ = writeln!(out, "Errored: {}", self.errored_count());
        let _ = writeln!(out, "Average Build Time: {average}");
        let _ = write!(out, "Execution time: {:.2}", self.wall_clock.as_secs_f64());
        out
    }
}
