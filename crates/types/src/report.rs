//! Verification report model
//!
//! A run produces one [`Report`] holding a flat list of named checks.
//! Checks are never removed or rolled up: the value of a run is the
//! complete set of defects in one pass.

use relcheck_errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Pass/fail/skip status of an individual check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    Skip,
}

/// One named verification outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Check {
    /// Stage this check belongs to ("Manifest hashes", "Zero packs", ...)
    pub name: String,
    /// Human-readable description naming the item checked
    pub description: String,
    pub status: CheckStatus,
    /// Free-text diagnostic, e.g. the list of mismatching paths
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

/// Aggregated results of a verification run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Report {
    pub name: String,
    pub description: String,
    pub passed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub total: u64,
    pub checks: Vec<Check>,
}

impl Report {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    /// Record a passing or failing check depending on `ok`.
    pub fn ok(&mut self, ok: bool, name: impl Into<String>, description: impl Into<String>) {
        let status = if ok {
            CheckStatus::Pass
        } else {
            CheckStatus::Fail
        };
        self.add(Check {
            name: name.into(),
            description: description.into(),
            status,
            diagnostic: None,
        });
    }

    /// Record a failing check carrying a diagnostic.
    pub fn fail_with(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        diagnostic: impl Into<String>,
    ) {
        self.add(Check {
            name: name.into(),
            description: description.into(),
            status: CheckStatus::Fail,
            diagnostic: Some(diagnostic.into()),
        });
    }

    /// Record a skipped check.
    pub fn skip(&mut self, name: impl Into<String>, description: impl Into<String>) {
        self.add(Check {
            name: name.into(),
            description: description.into(),
            status: CheckStatus::Skip,
            diagnostic: None,
        });
    }

    /// Append a check and update the counters.
    pub fn add(&mut self, check: Check) {
        self.total += 1;
        match check.status {
            CheckStatus::Pass => self.passed += 1,
            CheckStatus::Fail => self.failed += 1,
            CheckStatus::Skip => self.skipped += 1,
        }
        self.checks.push(check);
    }

    /// Whether any check failed
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Render the report as human-readable text.
    ///
    /// Passing checks are summarized by the counters; failing checks are
    /// listed individually with their diagnostics.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Test Suite:  {}", self.name);
        if !self.description.is_empty() {
            let _ = writeln!(out, "             {}", self.description);
        }
        let _ = writeln!(out, "Total:       {}", self.total);
        let _ = writeln!(out, "Passed:      {}", self.passed);
        let _ = writeln!(out, "Failed:      {}", self.failed);
        let _ = writeln!(out, "Skipped:     {}", self.skipped);

        for check in &self.checks {
            if check.status != CheckStatus::Fail {
                continue;
            }
            let _ = writeln!(out, "\nFAIL: {}\t{}", check.name, check.description);
            if let Some(diag) = &check.diagnostic {
                let _ = writeln!(out, "{diag}");
            }
        }
        out
    }

    /// Render the report as a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_track_statuses() {
        let mut report = Report::new("updatecontent", "content checks");
        report.ok(true, "Manifest hashes", "Manifest.core hash matches MoM");
        report.ok(false, "Manifest hashes", "Manifest.editors hash matches MoM");
        report.skip("Delta packs", "no delta pack from 90 for os-core");

        assert_eq!(report.total, 3);
        assert_eq!(report.passed, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 1);
        assert!(report.has_failures());
    }

    #[test]
    fn text_output_lists_only_failures() {
        let mut report = Report::new("updatecontent", "");
        report.ok(true, "File hashes", "file hashes for os-core match manifest");
        report.fail_with(
            "File hashes",
            "file hashes for editors match manifest",
            "mismatched hashes:\n/usr/bin/vim",
        );

        let text = report.render_text();
        assert!(text.contains("FAIL: File hashes"));
        assert!(text.contains("/usr/bin/vim"));
        assert!(!text.contains("os-core"));
    }

    #[test]
    fn json_round_trip() {
        let mut report = Report::new("updatecontent", "content checks");
        report.ok(false, "Zero packs", "zero pack content correct for os-core");

        let json = report.render_json().unwrap();
        let back: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(back.failed, 1);
        assert_eq!(back.checks.len(), 1);
        assert_eq!(back.checks[0].status, CheckStatus::Fail);
    }
}
