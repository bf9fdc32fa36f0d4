pub mod client;
pub mod collector;
pub mod config;
pub mod error;
pub mod event;
pub mod publisher;

pub use client::{ConnectionPool, RespParser, RespValue};
pub use collector::{parse_info_reply, Collector, ParsedStats, StatCategory};
pub use config::{CollectorConfig, FailurePolicy};
pub use error::{CollectorError, ConfigError, ConnectionError, ParseError, QueryError};
pub use event::{Event, Payload};
pub use publisher::{ChannelPublisher, JsonLinesPublisher, Publisher};
