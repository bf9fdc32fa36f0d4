//! Collection engine
//!
//! - `info_parser`: INFO bulk reply -> field map
//! - `stats`: one `INFO <category>` query per call
//! - `keys`: pattern enumeration + batch value fetch
//! - `cycle`: one tick's worth of work, in a fixed order
//! - `scheduler`: the ticking loop
//!
//! `Collector` ties them to a connection pool and a publisher behind the
//! lifecycle the host drives: `new`, `start`, `run`, `stop`, `cleanup`.

mod cycle;
mod info_parser;
mod keys;
mod scheduler;
mod stats;

pub use cycle::{CollectionCycle, CycleReport, CycleRunner};
pub use info_parser::{parse_info_reply, ParsedStats};
pub use keys::{KeyExporter, SCAN_BATCH};
pub use scheduler::{Scheduler, SchedulerState, SchedulerStats};
pub use stats::{StatCategory, StatsCollector};

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::client::{ConnectSettings, ConnectionPool};
use crate::config::CollectorConfig;
use crate::error::{CollectorError, Result};
use crate::publisher::Publisher;

/// One collector instance: owns its config, pool and stop signal
pub struct Collector {
    config: CollectorConfig,
    shutdown: CancellationToken,
    scheduler: Scheduler,
    pool: Option<Arc<ConnectionPool>>,
    cycle: Option<CycleRunner>,
}

impl Collector {
    /// Validate the config. Nothing is dialed yet.
    pub fn new(config: CollectorConfig) -> Result<Self> {
        config.validate()?;
        config.log_summary();

        let shutdown = CancellationToken::new();
        let scheduler = Scheduler::new(config.period, shutdown.clone());

        Ok(Collector {
            config,
            shutdown,
            scheduler,
            pool: None,
            cycle: None,
        })
    }

    /// Create the pool and connect the publisher.
    ///
    /// When authentication is enabled one connection is dialed and
    /// authenticated up front, so a bad secret or unreachable server aborts
    /// startup instead of failing every cycle.
    pub async fn start(&mut self, publisher: Arc<dyn Publisher>) -> Result<()> {
        let pool = ConnectionPool::new(ConnectSettings::from_config(&self.config), self.config.max_conn);

        if self.config.auth.required {
            pool.warm_up().await?;
            info!("Authenticated against {}", self.config.address());
        }

        let cycle = CycleRunner::new(
            StatsCollector::new(pool.clone()),
            KeyExporter::new(pool.clone()),
            self.config.enabled_categories(),
            self.config.keys.clone(),
            self.config.failure_policy,
            publisher,
        )
        .with_shutdown(self.shutdown.clone());

        self.pool = Some(pool);
        self.cycle = Some(cycle);
        Ok(())
    }

    /// Block until `stop` is called
    pub async fn run(&self) -> Result<SchedulerStats> {
        let cycle = self.cycle.as_ref().ok_or(CollectorError::NotStarted)?;

        info!(
            address = %self.config.address(),
            period = ?self.config.period,
            categories = cycle.categories().len(),
            patterns = self.config.keys.len(),
            "Collector running"
        );

        Ok(self.scheduler.run(cycle).await)
    }

    /// Signal the loop to exit and close the pool.
    ///
    /// Meant to be called once. A second call finds the token already
    /// cancelled and the pool already closed, and does nothing.
    pub fn stop(&self) {
        self.scheduler.stop();
        if let Some(pool) = &self.pool {
            pool.close_all();
        }
    }

    /// No-op: every resource is released by `stop`. Kept as a separate hook
    /// because hosts call both.
    pub fn cleanup(&self) {}

    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn pool(&self) -> Option<&Arc<ConnectionPool>> {
        self.pool.as_ref()
    }

    /// Token that fires when the collector is stopped
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}
