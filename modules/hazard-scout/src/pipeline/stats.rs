use std::fmt;

use hazard_common::{ErrorKind, HazardError};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Classify,
    Expand,
    Aggregate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Fetch => "fetch",
            Stage::Classify => "classify",
            Stage::Expand => "expand",
            Stage::Aggregate => "aggregate",
        };
        f.write_str(s)
    }
}

/// One unit of work (query, page, post, location) that did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFailure {
    pub unit: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome counts for one stage run.
///
/// `succeeded` counts records written: posts stored, posts classified,
/// comments stored, incidents created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSummary {
    pub stage: Stage,
    pub succeeded: usize,
    pub skipped_duplicate: usize,
    /// Locations with no verified evidence. Aggregation only.
    pub no_signal: usize,
    pub failed: Vec<UnitFailure>,
}

impl StageSummary {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            succeeded: 0,
            skipped_duplicate: 0,
            no_signal: 0,
            failed: Vec::new(),
        }
    }

    pub fn record_failure(&mut self, unit: impl Into<String>, err: &HazardError) {
        self.failed.push(UnitFailure {
            unit: unit.into(),
            kind: err.kind(),
            message: err.to_string(),
        });
    }

    /// True when at least one unit failed.
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Fold another run of the same stage into this one.
    pub fn merge(&mut self, other: StageSummary) {
        self.succeeded += other.succeeded;
        self.skipped_duplicate += other.skipped_duplicate;
        self.no_signal += other.no_signal;
        self.failed.extend(other.failed);
    }

    pub fn failures_of(&self, kind: ErrorKind) -> impl Iterator<Item = &UnitFailure> {
        self.failed.iter().filter(move |f| f.kind == kind)
    }
}

impl fmt::Display for StageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}]", self.stage)?;
        writeln!(f, "  Succeeded:          {}", self.succeeded)?;
        writeln!(f, "  Skipped duplicate:  {}", self.skipped_duplicate)?;
        if self.stage == Stage::Aggregate {
            writeln!(f, "  No signal:          {}", self.no_signal)?;
        }
        writeln!(f, "  Failed:             {}", self.failed.len())?;
        for failure in &self.failed {
            writeln!(
                f,
                "    - {} ({}): {}",
                failure.unit, failure.kind, failure.message
            )?;
        }
        Ok(())
    }
}

/// Per-stage summaries for one end-to-end run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub stages: Vec<StageSummary>,
}

impl RunReport {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            stages: Vec::new(),
        }
    }

    pub fn push(&mut self, summary: StageSummary) {
        self.stages.push(summary);
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageSummary> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    pub fn is_partial(&self) -> bool {
        self.stages.iter().any(StageSummary::is_partial)
    }

    pub fn total_failures(&self) -> usize {
        self.stages.iter().map(|s| s.failed.len()).sum()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Hazard Run {} ===", self.run_id)?;
        for stage in &self.stages {
            write!(f, "{stage}")?;
        }
        if self.is_partial() {
            writeln!(f, "Partial run: {} unit(s) failed", self.total_failures())?;
        } else {
            writeln!(f, "All units completed")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_make_summary_partial() {
        let mut summary = StageSummary::new(Stage::Fetch);
        summary.succeeded = 4;
        assert!(!summary.is_partial());

        summary.record_failure("query \"tsunami Puri\"", &HazardError::Transport("timeout".into()));
        assert!(summary.is_partial());
        assert_eq!(summary.failed[0].kind, ErrorKind::Transport);
        assert_eq!(summary.failures_of(ErrorKind::Schema).count(), 0);

        let rendered = summary.to_string();
        assert!(rendered.contains("[fetch]"));
        assert!(rendered.contains("tsunami Puri"));
        assert!(rendered.contains("transport"));
    }

    #[test]
    fn report_looks_up_stages() {
        let mut report = RunReport::new(Uuid::new_v4());
        report.push(StageSummary::new(Stage::Fetch));
        let mut classify = StageSummary::new(Stage::Classify);
        classify.record_failure("page 2", &HazardError::Schema("missing id 7".into()));
        report.push(classify);

        assert!(report.is_partial());
        assert_eq!(report.total_failures(), 1);
        assert!(report.stage(Stage::Expand).is_none());
        assert_eq!(report.stage(Stage::Classify).unwrap().failed.len(), 1);
        assert!(report.to_string().contains("Partial run"));
    }
}
