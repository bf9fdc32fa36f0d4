//! Minimal RESP client: just enough for INFO, AUTH, SCAN and MGET

mod connection;
mod pool;
mod resp;

pub use connection::{ConnectSettings, Connection};
pub use pool::{ConnectionPool, PooledConnection};
pub use resp::{RespParser, RespValue};
