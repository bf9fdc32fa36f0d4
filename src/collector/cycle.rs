//! One collection cycle: key export first, then each enabled category in order

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::keys::KeyExporter;
use super::stats::{StatCategory, StatsCollector};
use crate::config::FailurePolicy;
use crate::publisher::Publisher;

/// Outcome of one cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Events handed to the publisher
    pub published: usize,
    /// Steps (key export or category) that failed
    pub failed: usize,
    /// Categories not attempted because an earlier step failed or the
    /// collector was stopped mid-cycle
    pub skipped: usize,
}

/// Work the scheduler runs on every tick
pub trait CollectionCycle: Send + Sync {
    fn run_cycle(&self) -> impl Future<Output = CycleReport> + Send;
}

pub struct CycleRunner {
    stats: StatsCollector,
    keys: KeyExporter,
    categories: Vec<StatCategory>,
    patterns: Vec<String>,
    policy: FailurePolicy,
    publisher: Arc<dyn Publisher>,
    shutdown: CancellationToken,
}

impl CycleRunner {
    pub fn new(
        stats: StatsCollector,
        keys: KeyExporter,
        categories: Vec<StatCategory>,
        patterns: Vec<String>,
        policy: FailurePolicy,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        CycleRunner {
            stats,
            keys,
            categories,
            patterns,
            policy,
            publisher,
            shutdown: CancellationToken::new(),
        }
    }

    /// Stop between steps once `shutdown` fires. A step already in flight
    /// finishes; a failure it hits after the stop is not reported as an error.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn categories(&self) -> &[StatCategory] {
        &self.categories
    }

    fn stopped(&self, report: &mut CycleReport, remaining: usize) -> bool {
        if !self.shutdown.is_cancelled() {
            return false;
        }
        report.skipped += remaining;
        debug!(skipped = remaining, "Collector stopped, ending cycle early");
        true
    }
}

impl CollectionCycle for CycleRunner {
    async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        if !self.patterns.is_empty() {
            if self.stopped(&mut report, self.categories.len()) {
                return report;
            }
            match self.keys.export(&self.patterns).await {
                Ok(event) => {
                    self.publisher.publish(event);
                    report.published += 1;
                }
                Err(e) => {
                    if self.stopped(&mut report, self.categories.len()) {
                        return report;
                    }
                    error!(patterns = ?self.patterns, error = %e, "Error exporting keys");
                    report.failed += 1;
                    if self.policy == FailurePolicy::AbortCycle {
                        report.skipped = self.categories.len();
                        return report;
                    }
                }
            }
        }

        for (i, category) in self.categories.iter().enumerate() {
            let remaining = self.categories.len() - i;
            if self.stopped(&mut report, remaining) {
                break;
            }
            match self.stats.collect(*category).await {
                Ok(event) => {
                    self.publisher.publish(event);
                    report.published += 1;
                }
                Err(e) => {
                    if self.stopped(&mut report, remaining) {
                        break;
                    }
                    error!(category = %category, error = %e, "Error reading {} stats", category);
                    report.failed += 1;
                    if self.policy == FailurePolicy::AbortCycle {
                        report.skipped = remaining - 1;
                        break;
                    }
                }
            }
        }

        report
    }
}
