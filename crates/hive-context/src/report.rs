//! Outcome of best-effort scope teardown.

use hive_core::{ContainerError, ErrorCollector};

/// What happened while destroying one or more scopes.
///
/// Teardown never stops at the first failure, so the report carries every
/// contained error alongside the number of instances destroyed cleanly.
#[derive(Debug, Default)]
pub struct DestructionReport {
    destroyed: usize,
    failures: ErrorCollector,
}

impl DestructionReport {
    /// An empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_destroyed(&mut self) {
        self.destroyed += 1;
    }

    pub(crate) fn record_failure(&mut self, error: impl Into<ContainerError>) {
        self.failures.collect(error);
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: DestructionReport) {
        self.destroyed += other.destroyed;
        self.failures.absorb(other.failures);
    }

    /// Instances whose destroy callback completed successfully.
    #[must_use]
    pub fn destroyed(&self) -> usize {
        self.destroyed
    }

    /// Contained failures.
    #[must_use]
    pub fn failures(&self) -> &[ContainerError] {
        self.failures.errors()
    }

    /// `true` when no failure was recorded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !self.failures.has_errors()
    }

    /// Take the failures, leaving the report clean.
    pub fn take_failures(&mut self) -> Vec<ContainerError> {
        self.failures.flush()
    }
}
