//! Non-fatal property checks
//!
//! A [`Verification`] records every check, so one mismatch does not hide the
//! next. [`Verification::finish`] turns the record into a single result.

use std::fmt;
use thiserror::Error;

/// Outcome of one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub name: String,
    pub expected: String,
    pub actual: String,
    pub passed: bool,
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {:?}, got {:?}",
            self.name, self.expected, self.actual
        )
    }
}

#[derive(Error, Debug)]
#[error("{} of {total} check(s) failed: {}", .failures.len(), join(.failures))]
pub struct VerificationError {
    pub failures: Vec<Check>,
    pub total: usize,
}

fn join(checks: &[Check]) -> String {
    checks
        .iter()
        .map(Check::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Collects check results
#[derive(Debug, Default)]
pub struct Verification {
    checks: Vec<Check>,
}

impl Verification {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record whether `actual` equals `expected`
    pub fn equal(
        &mut self,
        name: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> bool {
        let expected = expected.into();
        let actual = actual.into();
        let passed = expected == actual;
        self.record(name.into(), expected, actual, passed)
    }

    /// Record whether `actual` has non-whitespace content
    pub fn not_empty(&mut self, name: impl Into<String>, actual: impl Into<String>) -> bool {
        let actual = actual.into();
        let passed = !actual.trim().is_empty();
        self.record(name.into(), "<non-empty>".to_string(), actual, passed)
    }

    /// Record whether something that should exist does
    pub fn present(&mut self, name: impl Into<String>, present: bool) -> bool {
        let actual = if present { "present" } else { "missing" };
        self.record(name.into(), "present".to_string(), actual.to_string(), present)
    }

    fn record(&mut self, name: String, expected: String, actual: String, passed: bool) -> bool {
        if passed {
            tracing::info!(check = %name, actual = %actual, "Check passed");
        } else {
            tracing::error!(check = %name, expected = %expected, actual = %actual, "Check failed");
        }
        self.checks.push(Check {
            name,
            expected,
            actual,
            passed,
        });
        passed
    }

    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn finish(self) -> Result<Vec<Check>, VerificationError> {
        let total = self.checks.len();
        let failures: Vec<Check> = self.checks.iter().filter(|c| !c.passed).cloned().collect();
        if failures.is_empty() {
            Ok(self.checks)
        } else {
            Err(VerificationError { failures, total })
        }
    }
}
