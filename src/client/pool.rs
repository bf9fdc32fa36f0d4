//! Bounded, lazily-filled connection pool
//!
//! A semaphore caps the number of checked-out connections at `max_size`;
//! an `ArrayQueue` holds the idle ones. Connections are dialed (and
//! authenticated) only when no idle connection is available.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam::queue::ArrayQueue;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use super::connection::{ConnectSettings, Connection};
use super::resp::RespValue;
use crate::error::{ConnectionError, Result};

pub struct ConnectionPool {
    settings: ConnectSettings,
    idle: ArrayQueue<Connection>,
    permits: Arc<Semaphore>,
    max_size: usize,
    closed: AtomicBool,
}

impl ConnectionPool {
    pub fn new(settings: ConnectSettings, max_size: usize) -> Arc<Self> {
        let max_size = max_size.max(1);
        Arc::new(ConnectionPool {
            settings,
            idle: ArrayQueue::new(max_size),
            permits: Arc::new(Semaphore::new(max_size)),
            max_size,
            closed: AtomicBool::new(false),
        })
    }

    /// Check out a connection, waiting for a free slot if all are in use.
    ///
    /// A fresh connection completes its AUTH handshake before it is handed
    /// out; a failed handshake discards it and fails the acquire.
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledConnection> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ConnectionError::PoolClosed)?;

        if self.is_closed() {
            return Err(ConnectionError::PoolClosed.into());
        }

        let conn = match self.idle.pop() {
            Some(conn) => conn,
            None => self.connect().await?,
        };

        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(self),
            _permit: permit,
        })
    }

    async fn connect(&self) -> Result<Connection> {
        let mut conn = Connection::dial(&self.settings).await?;
        if let Some(secret) = &self.settings.secret {
            conn.authenticate(secret).await?;
        }
        Ok(conn)
    }

    /// Return a connection to the idle set
    pub fn release(&self, conn: PooledConnection) {
        drop(conn);
    }

    /// Close a connection instead of returning it
    pub fn discard(&self, mut conn: PooledConnection) {
        conn.conn = None;
    }

    /// Dial one connection and put it back, so startup fails fast on a bad
    /// address or secret.
    pub async fn warm_up(self: &Arc<Self>) -> Result<()> {
        let conn = self.acquire().await?;
        self.release(conn);
        Ok(())
    }

    /// Close every idle connection and refuse further acquires.
    ///
    /// Connections checked out at this point are closed when released.
    /// Calling this again is a no-op.
    pub fn close_all(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.permits.close();

        let mut closed = 0usize;
        while let Some(conn) = self.idle.pop() {
            drop(conn);
            closed += 1;
        }
        info!("Connection pool closed ({} idle connections dropped)", closed);
    }

    fn put_back(&self, conn: Connection) {
        if self.is_closed() {
            return;
        }
        if self.idle.push(conn).is_err() {
            debug!("Idle queue full, dropping connection");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    /// Slots that can be acquired without waiting
    pub fn available(&self) -> usize {
        if self.is_closed() {
            0
        } else {
            self.permits.available_permits()
        }
    }
}

/// A checked-out connection. Dropping it releases it back to the pool.
pub struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<ConnectionPool>,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Run one command. Transport and framing errors discard the connection.
    pub async fn execute(&mut self, args: &[&str]) -> Result<RespValue> {
        let conn = self.conn.as_mut().ok_or(ConnectionError::Closed)?;
        let result = conn.execute(args).await;

        if let Err(e) = &result {
            if e.poisons_connection() {
                warn!(peer = %conn.peer(), error = %e, "Discarding broken connection");
                self.conn = None;
            }
        }
        result
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.put_back(conn);
        }
    }
}
