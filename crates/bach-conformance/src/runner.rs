//! Test session driver and statistics

use crate::config::RunConfig;
use crate::dispatcher::{Category, Dispatcher};
use crate::error::ConformanceResult;
use crate::outcome::{FileResults, OutcomeKind};
use crate::pipeline::Collaborators;
use crate::verifier::ReportingSink;
use std::time::{Duration, Instant};

/// Aggregated test statistics
#[derive(Debug, Default)]
pub struct TestStats {
    /// Total tests selected
    pub total: usize,
    /// Tests passed
    pub passed: usize,
    /// Tests failed (assertions or collaborator errors)
    pub failed: usize,
    /// Tests aborted during preparation
    pub setup_failed: usize,
    /// Tests skipped
    pub skipped: usize,
    /// Total execution time
    pub duration: Duration,
    /// Failed test names with reasons
    pub failures: Vec<(String, String)>,
}

impl TestStats {
    /// Create empty stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the outcomes of one file
    pub fn add_file_results(&mut self, results: &FileResults) {
        for outcome in &results.outcomes {
            self.total += 1;
            match outcome.kind {
                OutcomeKind::Passed => self.passed += 1,
                OutcomeKind::Skipped(_) => self.skipped += 1,
                OutcomeKind::SetupFailed(_) => self.setup_failed += 1,
                OutcomeKind::AssertionFailed(_) | OutcomeKind::CollaboratorFailed(_) => self.failed += 1,
            }
            if outcome.failed() {
                self.failures.push((outcome.label(), outcome.message()));
            }
        }
    }

    /// Fold another set of statistics into this one
    pub fn merge(&mut self, other: TestStats) {
        self.total += other.total;
        self.passed += other.passed;
        self.failed += other.failed;
        self.setup_failed += other.setup_failed;
        self.skipped += other.skipped;
        self.duration += other.duration;
        self.failures.extend(other.failures);
    }

    /// Whether every selected fixture passed or was skipped
    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.setup_failed == 0
    }

    /// Process exit status for the session
    pub fn exit_code(&self) -> i32 {
        if self.all_passed() {
            0
        } else {
            1
        }
    }

    /// Pass rate as percentage
    pub fn pass_rate(&self) -> f64 {
        let executed = self.passed + self.failed + self.setup_failed;
        if executed == 0 {
            return 100.0;
        }
        (self.passed as f64 / executed as f64) * 100.0
    }

    /// Print summary
    pub fn print_summary(&self) {
        println!("\n========================================");
        println!("Test Summary");
        println!("========================================");
        println!("Total:   {}", self.total);
        println!("Passed:  {}", self.passed);
        println!("Failed:  {}", self.failed);
        println!("Setup:   {}", self.setup_failed);
        println!("Skipped: {}", self.skipped);
        println!("Pass Rate: {:.2}%", self.pass_rate());
        println!("Duration: {:.2}s", self.duration.as_secs_f64());

        if !self.failures.is_empty() {
            println!("\nFailed tests:");
            for (name, reason) in &self.failures {
                println!("  - {}: {}", name, reason);
            }
        }
    }
}

/// One test session: a fixed configuration and its collaborators
pub struct TestSession {
    config: RunConfig,
    collaborators: Collaborators,
}

impl TestSession {
    /// Create a session
    pub fn new(config: RunConfig, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
        }
    }

    /// Session configuration
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run one category
    pub fn run_category(&mut self, category: Category) -> ConformanceResult<TestStats> {
        let mut stats = TestStats::new();
        let start = Instant::now();
        let mut sink = ReportingSink::new();

        let results = Dispatcher::new(&self.config).run_category(category, &mut self.collaborators, &mut sink)?;
        for file in &results {
            stats.add_file_results(file);
        }
        tracing::debug!(
            "{}: {} assertions passed, {} failed",
            category,
            sink.passed(),
            sink.failed()
        );

        stats.duration = start.elapsed();
        Ok(stats)
    }

    /// Run categories in the given order
    ///
    /// A dispatch error stops the session; fixture failures do not.
    pub fn run(&mut self, categories: &[Category]) -> ConformanceResult<TestStats> {
        let mut combined = TestStats::new();
        for &category in categories {
            combined.merge(self.run_category(category)?);
        }
        Ok(combined)
    }

    /// State, then block, then opcode when enabled
    pub fn run_all(&mut self) -> ConformanceResult<TestStats> {
        let order = Category::session_order(self.config.opcode_enabled());
        self.run(&order)
    }

    /// The configured custom fixture file
    pub fn run_custom(&mut self) -> ConformanceResult<TestStats> {
        self.run(&[Category::CustomFile])
    }
}
