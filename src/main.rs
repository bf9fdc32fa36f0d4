//! redis-telemetry: periodic INFO / key collector for one Redis server
//!
//! Usage:
//!   redis-telemetry [CONFIG_PATH]
//!
//! The config path falls back to `REDIS_TELEMETRY_CONFIG`, then
//! `redis-telemetry.toml`. A missing file means all defaults. Events are
//! written to stdout as JSON lines; logs go to stderr (`RUST_LOG` filters,
//! `REDIS_TELEMETRY_LOG_FORMAT=json` switches to JSON logs).

use std::path::PathBuf;
use std::sync::Arc;

use redis_telemetry::{Collector, CollectorConfig, JsonLinesPublisher};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

const DEFAULT_CONFIG_PATH: &str = "redis-telemetry.toml";

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("REDIS_TELEMETRY_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn config_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("REDIS_TELEMETRY_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
        .into()
}

fn load_config() -> Result<CollectorConfig, Box<dyn std::error::Error>> {
    let path = config_path();
    if path.exists() {
        info!("Loading config from {}", path.display());
        Ok(CollectorConfig::load(&path)?)
    } else {
        warn!("Config file {} not found, using defaults", path.display());
        Ok(CollectorConfig::default())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = load_config()?;
    let mut collector = Collector::new(config)?;
    collector.start(Arc::new(JsonLinesPublisher::stdout())).await?;

    let collector = Arc::new(collector);
    let runner = {
        let collector = collector.clone();
        tokio::spawn(async move { collector.run().await })
    };

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Interrupt received, stopping collector"),
        Err(e) => error!("Failed to listen for interrupt: {}", e),
    }

    collector.stop();
    let stats = runner.await??;
    collector.cleanup();

    info!(cycles = stats.cycles, overruns = stats.overruns, "Collector exited");
    Ok(())
}
