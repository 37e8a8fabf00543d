//! Pin drift report for `check_pins`.
//!
//! Each local pin becomes one [`PinState`] row comparing what is pinned with
//! the latest upstream release and the upper-constraints version. A row is
//! *divergent* when either of those versions falls outside the pinned
//! specifier. Rows keep the pin file's order.
//!
//! Two renderings are available, mirroring the rest of the CLI: a colored
//! table for humans and pretty-printed JSON for scripts.
//!
//! ```text
//! Package                        Pinned               Latest       Constraint
//! ───────────────────────────────────────────────────────────────────────────
//! requests                       >=2.0,<3.0           2.31.0       2.31.0
//! pyopenssl                      ==23.1.0             24.0.0       23.2.0      *
//! ```

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;

use crate::constraints::Constraints;
use crate::requirements::PinRecord;
use crate::upstream::{LookupResult, VersionMap};
use crate::version::{SpecifierSet, Version};

/// Placeholder for a missing constraint.
const NO_CONSTRAINT: &str = "-";

/// Placeholder for an unresolved latest version.
const UNKNOWN: &str = "unknown";

/// One row of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PinState {
    pub name: String,
    /// Pinned specifier as written (empty when unconstrained)
    pub pinned: String,
    /// Latest upstream version, `None` when the lookup failed
    pub latest: Option<String>,
    /// Upper-constraints version, `None` when the package is not constrained
    pub constraint: Option<String>,
    pub divergent: bool,
}

/// Totals printed under the table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PinSummary {
    pub total: usize,
    pub divergent: usize,
    pub unknown: usize,
}

/// The complete report.
#[derive(Debug, Clone, Serialize)]
pub struct PinReport {
    /// Requirements reference the constraints came from
    pub constraints_ref: String,
    pub pins: Vec<PinState>,
    pub summary: PinSummary,
}

/// Whether `version` parses and falls outside `specifiers`.
///
/// Versions that do not parse are not comparable and never flag a pin.
fn excluded(specifiers: &SpecifierSet, version: &str) -> bool {
    match Version::parse(version) {
        Ok(version) => !specifiers.admits(&version),
        Err(e) => {
            tracing::debug!("Not comparing against '{version}': {e}");
            false
        }
    }
}

/// Divergence rule: the latest release or the constraint is not admitted by the pin.
#[must_use]
pub fn is_divergent(
    specifiers: &SpecifierSet,
    latest: Option<&str>,
    constraint: Option<&str>,
) -> bool {
    latest.is_some_and(|v| excluded(specifiers, v))
        || constraint.is_some_and(|v| excluded(specifiers, v))
}

impl PinReport {
    /// Build the report for `pins` (in file order).
    #[must_use]
    pub fn build(pins: &[PinRecord], latest: &VersionMap, constraints: &Constraints) -> Self {
        let rows: Vec<PinState> = pins
            .iter()
            .map(|pin| {
                let latest = match latest.get(&pin.name) {
                    LookupResult::Known(version) => Some(version),
                    LookupResult::Unknown(_) => None,
                };
                let constraint = constraints.version_of(&pin.name).map(str::to_string);
                let divergent =
                    is_divergent(&pin.specifiers, latest.as_deref(), constraint.as_deref());
                PinState {
                    name: pin.name.clone(),
                    pinned: pin.specifiers.to_string(),
                    latest,
                    constraint,
                    divergent,
                }
            })
            .collect();

        let summary = PinSummary {
            total: rows.len(),
            divergent: rows.iter().filter(|row| row.divergent).count(),
            unknown: rows.iter().filter(|row| row.latest.is_none()).count(),
        };

        Self {
            constraints_ref: constraints.reference().to_string(),
            pins: rows,
            summary,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable table followed by the summary.
    #[must_use]
    pub fn to_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<30} {:<20} {:<12} {:<12}",
            "Package".bold(),
            "Pinned".bold(),
            "Latest".bold(),
            "Constraint".bold()
        );
        let _ = writeln!(out, "{}", "─".repeat(75));

        for row in &self.pins {
            let name = if row.divergent { row.name.yellow() } else { row.name.normal() };
            let pinned = if row.pinned.is_empty() { "(any)" } else { row.pinned.as_str() };
            let latest =
                row.latest.as_deref().map_or_else(|| UNKNOWN.bright_black(), |v| v.normal());
            let constraint = row.constraint.as_deref().unwrap_or(NO_CONSTRAINT);
            let marker = if row.divergent { "*".red().bold() } else { "".normal() };
            let _ = writeln!(
                out,
                "{name:<30} {pinned:<20} {latest:<12} {constraint:<12} {marker}"
            );
        }

        let _ = writeln!(out, "\n{}", "Summary:".bold());
        let _ = writeln!(out, "  Constraints ref: {}", self.constraints_ref);
        let _ = writeln!(out, "  Total pins: {}", self.summary.total);
        if self.summary.divergent > 0 {
            let _ = writeln!(
                out,
                "  {} pin(s) diverge from upstream or constraints",
                self.summary.divergent.to_string().yellow()
            );
        } else {
            let _ = writeln!(out, "  {}", "All pins agree with upstream and constraints".green());
        }
        if self.summary.unknown > 0 {
            let _ = writeln!(
                out,
                "  {} pin(s) could not be resolved upstream",
                self.summary.unknown.to_string().bright_black()
            );
        }
        out
    }
}
