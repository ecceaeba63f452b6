// SPDX-License-Identifier: AGPL-3.0-only

//! Pass/fail harness for validation binaries.
//!
//! A validation binary records named checks against the thresholds in
//! [`crate::tolerances`], prints one summary block, and exits 0 only when
//! every check passed.

use std::fmt::{self, Write};
use std::process;

use serde::Serialize;

use crate::tolerances::NEAR_ZERO_EXPECTED;

/// How the threshold of a [`Check`] was applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToleranceMode {
    /// |observed − expected| < tolerance
    Absolute,
    /// |observed − expected| / |expected| < tolerance
    Relative,
    /// observed < threshold
    UpperBound,
    /// observed > threshold
    LowerBound,
    /// Plain boolean.
    Flag,
}

impl fmt::Display for ToleranceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Absolute => "abs",
            Self::Relative => "rel",
            Self::UpperBound => "<",
            Self::LowerBound => ">",
            Self::Flag => "flag",
        })
    }
}

/// One recorded check.
#[derive(Clone, Debug, Serialize)]
pub struct Check {
    /// Label printed in the summary.
    pub label: String,
    /// Outcome.
    pub passed: bool,
    /// Measured value.
    pub observed: f64,
    /// Reference value or bound.
    pub expected: f64,
    /// Threshold applied.
    pub tolerance: f64,
    /// How `tolerance` was applied.
    pub mode: ToleranceMode,
}

/// Ordered list of checks for one binary.
#[derive(Debug, Default, Serialize)]
#[must_use]
pub struct ValidationHarness {
    /// Binary name.
    pub name: String,
    /// Checks in the order they were made.
    pub checks: Vec<Check>,
}

impl ValidationHarness {
    /// Empty harness for `name`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            checks: Vec::new(),
        }
    }

    fn push(&mut self, label: &str, passed: bool, values: [f64; 3], mode: ToleranceMode) {
        let [observed, expected, tolerance] = values;
        self.checks.push(Check {
            label: label.to_string(),
            passed,
            observed,
            expected,
            tolerance,
            mode,
        });
    }

    /// |observed − expected| < tolerance.
    pub fn check_abs(&mut self, label: &str, observed: f64, expected: f64, tolerance: f64) {
        let passed = (observed - expected).abs() < tolerance;
        self.push(label, passed, [observed, expected, tolerance], ToleranceMode::Absolute);
    }

    /// Relative error below `tolerance`; absolute when `expected` is ~0.
    pub fn check_rel(&mut self, label: &str, observed: f64, expected: f64, tolerance: f64) {
        let err = (observed - expected).abs();
        let passed = if expected.abs() > NEAR_ZERO_EXPECTED {
            err / expected.abs() < tolerance
        } else {
            err < tolerance
        };
        self.push(label, passed, [observed, expected, tolerance], ToleranceMode::Relative);
    }

    /// observed < threshold. Non-finite values fail.
    pub fn check_upper(&mut self, label: &str, observed: f64, threshold: f64) {
        let passed = observed < threshold;
        self.push(label, passed, [observed, threshold, threshold], ToleranceMode::UpperBound);
    }

    /// observed > threshold. Non-finite values fail.
    pub fn check_lower(&mut self, label: &str, observed: f64, threshold: f64) {
        let passed = observed > threshold;
        self.push(label, passed, [observed, threshold, threshold], ToleranceMode::LowerBound);
    }

    /// Boolean check.
    pub fn check_bool(&mut self, label: &str, passed: bool) {
        let value = f64::from(u8::from(passed));
        self.push(label, passed, [value, 1.0, 0.0], ToleranceMode::Flag);
    }

    /// Checks that passed.
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    /// Checks recorded.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.checks.len()
    }

    /// Whether every check passed (true when there are none).
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Summary block as printed by [`Self::finish`].
    #[must_use]
    pub fn summary(&self) -> String {
        let mut s = String::new();
        let _ = writeln!(
            s,
            "═══ {} validation: {}/{} checks passed ═══",
            self.name,
            self.passed_count(),
            self.total_count()
        );
        for c in &self.checks {
            let icon = if c.passed { "✓" } else { "✗" };
            let _ = writeln!(
                s,
                "  {icon} {}: observed={:.6e}, expected={:.6e}, tol={:.2e} ({})",
                c.label, c.observed, c.expected, c.tolerance, c.mode
            );
        }
        if self.all_passed() {
            s.push_str("ALL CHECKS PASSED");
        } else {
            let failed: Vec<&str> = self
                .checks
                .iter()
                .filter(|c| !c.passed)
                .map(|c| c.label.as_str())
                .collect();
            let _ = write!(s, "FAILED CHECKS: {}", failed.join(", "));
        }
        s
    }

    /// Print the summary and exit 0 (all passed) or 1.
    pub fn finish(&self) -> ! {
        println!();
        println!("{}", self.summary());
        process::exit(i32::from(!self.all_passed()));
    }
}
