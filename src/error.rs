//! Error types for the collector
//!
//! Four kinds of failure, each with its own scope:
//! - `ConfigError`: fatal at startup, the collector never starts
//! - `ConnectionError`: dial/auth/transport failure of one pooled connection
//! - `QueryError`: the server rejected a command or answered with the wrong shape
//! - `ParseError`: the server sent a malformed RESP frame
//!
//! Only `ConfigError` and startup-time connection failures are fatal. Everything
//! else is scoped to the category or export step that hit it.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Top-level collector error
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("query error: {0}")]
    Query(#[from] QueryError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("collector is not started")]
    NotStarted,
}

impl CollectorError {
    /// Whether the connection that produced this error must be thrown away.
    ///
    /// A server error reply leaves the stream in a clean state, anything at the
    /// transport or framing level does not.
    pub fn poisons_connection(&self) -> bool {
        matches!(self, CollectorError::Connection(_) | CollectorError::Parse(_))
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Connection-related errors
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to connect to {addr}: {source}")]
    Dial { addr: String, source: io::Error },

    #[error("unsupported network kind: {0}")]
    UnsupportedNetwork(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("connection closed by server")]
    Closed,

    #[error("round trip timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection pool is closed")]
    PoolClosed,
}

/// Command-level errors
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("{command} rejected by server: {message}")]
    Server { command: String, message: String },

    #[error("unexpected reply to {command}: {reply}")]
    UnexpectedReply { command: String, reply: String },

    #[error("{command} returned a non-UTF-8 value: {value}")]
    InvalidUtf8 { command: String, value: String },

    #[error("{command} returned {actual} values for {expected} keys")]
    ReplyMismatch {
        command: String,
        expected: usize,
        actual: usize,
    },
}

/// Malformed RESP framing
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unknown RESP type byte: {0:#04x}")]
    UnknownType(u8),

    #[error("invalid length: {0}")]
    InvalidLength(String),

    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    #[error("missing CRLF after bulk payload")]
    MissingTerminator,
}

pub type Result<T> = std::result::Result<T, CollectorError>;
