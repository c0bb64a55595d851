//! Per-fixture outcomes and file-level result sets

use crate::verifier::Assertion;
use std::fmt;

/// Stage of one fixture run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Writing preconditions and building the request
    Preparing,
    /// Waiting on the VM
    Executing,
    /// Comparing results
    Verifying,
    /// Finished, every assertion evaluated
    Done,
    /// Finished early
    Failed,
}

impl Stage {
    /// Whether no further transition is allowed
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Preparing => "preparing",
            Stage::Executing => "executing",
            Stage::Verifying => "verifying",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What happened to one sub-test
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeKind {
    /// Every declared expectation matched
    Passed,
    /// At least one assertion failed
    AssertionFailed(Vec<Assertion>),
    /// Preparation aborted the fixture
    SetupFailed(String),
    /// The VM or state container failed
    CollaboratorFailed(String),
    /// Filtered out or not applicable
    Skipped(String),
}

/// Outcome of one sub-test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Fixture (file-level test) name
    pub fixture: String,
    /// Sub-test name
    pub sub_test: String,
    /// Result
    pub kind: OutcomeKind,
}

impl Outcome {
    /// Create an outcome
    pub fn new(fixture: impl Into<String>, sub_test: impl Into<String>, kind: OutcomeKind) -> Self {
        Self {
            fixture: fixture.into(),
            sub_test: sub_test.into(),
            kind,
        }
    }

    /// Skipped outcome
    pub fn skipped(fixture: impl Into<String>, sub_test: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::new(fixture, sub_test, OutcomeKind::Skipped(reason.to_string()))
    }

    /// Whether the sub-test passed
    pub fn passed(&self) -> bool {
        matches!(self.kind, OutcomeKind::Passed)
    }

    /// Whether the sub-test was skipped
    pub fn is_skipped(&self) -> bool {
        matches!(self.kind, OutcomeKind::Skipped(_))
    }

    /// Whether the sub-test counts against the exit status
    pub fn failed(&self) -> bool {
        !self.passed() && !self.is_skipped()
    }

    /// Human-readable summary
    pub fn message(&self) -> String {
        match &self.kind {
            OutcomeKind::Passed => "passed".to_string(),
            OutcomeKind::AssertionFailed(failures) => failures
                .iter()
                .map(|a| match &a.diff {
                    Some(diff) => format!("{}: {}", a.check, diff),
                    None => a.check.to_string(),
                })
                .collect::<Vec<_>>()
                .join("; "),
            OutcomeKind::SetupFailed(msg) => format!("setup failed: {}", msg),
            OutcomeKind::CollaboratorFailed(msg) => format!("collaborator failed: {}", msg),
            OutcomeKind::Skipped(reason) => format!("skipped: {}", reason),
        }
    }

    /// Emit the per-fixture result line
    pub fn log(&self) {
        match &self.kind {
            OutcomeKind::Passed => tracing::info!("PASS: {}", self.label()),
            OutcomeKind::Skipped(_) => tracing::debug!("SKIP: {} - {}", self.label(), self.message()),
            _ => tracing::warn!("FAIL: {} - {}", self.label(), self.message()),
        }
    }

    /// `fixture` alone, or `fixture/sub_test` when they differ
    pub fn label(&self) -> String {
        if self.fixture == self.sub_test {
            self.fixture.clone()
        } else {
            format!("{}/{}", self.fixture, self.sub_test)
        }
    }
}

/// Outcomes of one fixture file
#[derive(Debug, Clone)]
pub struct FileResults {
    /// File path
    pub file: String,
    /// Outcomes in execution order
    pub outcomes: Vec<Outcome>,
}

impl FileResults {
    /// Create new results
    pub fn new(file: String) -> Self {
        Self {
            file,
            outcomes: Vec::new(),
        }
    }

    /// Passed sub-tests
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    /// Failed sub-tests, setup and collaborator failures included
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.failed()).count()
    }

    /// Skipped sub-tests
    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_skipped()).count()
    }

    /// Total executed tests
    pub fn executed(&self) -> usize {
        self.passed() + self.failed()
    }

    /// Total tests including skipped
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }
}
