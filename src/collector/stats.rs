use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::info_parser::parse_info_reply;
use crate::client::ConnectionPool;
use crate::error::Result;
use crate::event::Event;

/// An INFO section the collector can query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatCategory {
    Server,
    Clients,
    Memory,
    Persistence,
    Stats,
    Replication,
    Cpu,
    Commandstats,
    Cluster,
    Keyspace,
}

impl StatCategory {
    /// Every category, in collection order. Under the abort-cycle failure
    /// policy this order decides which categories a failure skips.
    pub const ALL: [StatCategory; 10] = [
        StatCategory::Server,
        StatCategory::Clients,
        StatCategory::Memory,
        StatCategory::Persistence,
        StatCategory::Stats,
        StatCategory::Replication,
        StatCategory::Cpu,
        StatCategory::Commandstats,
        StatCategory::Cluster,
        StatCategory::Keyspace,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StatCategory::Server => "server",
            StatCategory::Clients => "clients",
            StatCategory::Memory => "memory",
            StatCategory::Persistence => "persistence",
            StatCategory::Stats => "stats",
            StatCategory::Replication => "replication",
            StatCategory::Cpu => "cpu",
            StatCategory::Commandstats => "commandstats",
            StatCategory::Cluster => "cluster",
            StatCategory::Keyspace => "keyspace",
        }
    }
}

impl fmt::Display for StatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        StatCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown stat category: {}", s))
    }
}

/// Issues one `INFO <category>` per call
#[derive(Clone)]
pub struct StatsCollector {
    pool: Arc<ConnectionPool>,
}

impl StatsCollector {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        StatsCollector { pool }
    }

    /// Query one category and wrap the parsed reply in an event
    pub async fn collect(&self, category: StatCategory) -> Result<Event> {
        let raw = self.fetch(category).await?;
        let stats = parse_info_reply(&raw);
        debug!(category = %category, fields = stats.len(), "Parsed INFO reply");
        Ok(Event::stats(category, stats))
    }

    async fn fetch(&self, category: StatCategory) -> Result<String> {
        let mut conn = self.pool.acquire().await?;
        let reply = conn.execute(&["INFO", category.as_str()]).await?;
        self.pool.release(conn);
        Ok(reply.into_text("INFO")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_names_round_trip() {
        for category in StatCategory::ALL {
            assert_eq!(category.as_str().parse::<StatCategory>().unwrap(), category);
            assert_eq!(category.to_string(), category.as_str());
        }
        assert_eq!("CPU".parse::<StatCategory>().unwrap(), StatCategory::Cpu);
        assert!("errorstats".parse::<StatCategory>().is_err());
    }

    #[test]
    fn test_collection_order() {
        let names: Vec<&str> = StatCategory::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(
            names,
            [
                "server",
                "clients",
                "memory",
                "persistence",
                "stats",
                "replication",
                "cpu",
                "commandstats",
                "cluster",
                "keyspace"
            ]
        );
    }
}
