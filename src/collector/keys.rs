//! Key export: enumerate keys by pattern, then fetch their values in one batch
//!
//! Enumeration walks `SCAN <cursor> MATCH <pattern>` until the cursor wraps
//! to 0. Values come from a single `MGET` per pattern and are paired with the
//! keys by position, so the reply length is checked against the request
//! before zipping. Key names are decoded strictly: a key that is not valid
//! UTF-8 cannot be sent back in MGET unchanged, so it fails the export.
//! Any failure aborts the export for the whole cycle: a partial key set that
//! silently misses keys is worse than no event.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::client::{ConnectionPool, RespValue};
use crate::error::{QueryError, Result};
use crate::event::Event;

/// COUNT hint passed to SCAN
pub const SCAN_BATCH: usize = 100;

#[derive(Clone)]
pub struct KeyExporter {
    pool: Arc<ConnectionPool>,
}

impl KeyExporter {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        KeyExporter { pool }
    }

    /// Export every pattern's key/value pairs as one flat event
    pub async fn export(&self, patterns: &[String]) -> Result<Event> {
        let mut values = BTreeMap::new();

        for pattern in patterns {
            let keys = self.enumerate(pattern).await.inspect_err(|e| {
                warn!(pattern = %pattern, error = %e, "Key enumeration failed");
            })?;

            if keys.is_empty() {
                debug!(pattern = %pattern, "No keys matched");
                continue;
            }

            let fetched = self.fetch_values(&keys).await.inspect_err(|e| {
                warn!(pattern = %pattern, keys = keys.len(), error = %e, "Batch fetch failed");
            })?;

            let mut missing = 0usize;
            for (key, value) in keys.into_iter().zip(fetched) {
                match value {
                    Some(value) => {
                        values.insert(key, value);
                    }
                    None => missing += 1,
                }
            }
            if missing > 0 {
                debug!(pattern = %pattern, missing, "Keys without a string value were skipped");
            }
        }

        Ok(Event::keys(values))
    }

    /// All keys matching `pattern`, de-duplicated in first-seen order
    pub async fn enumerate(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        let count = SCAN_BATCH.to_string();
        let mut cursor = "0".to_string();
        let mut seen = HashSet::new();
        let mut keys = Vec::new();

        loop {
            let reply = conn
                .execute(&["SCAN", cursor.as_str(), "MATCH", pattern, "COUNT", count.as_str()])
                .await?;
            let (next, batch) = parse_scan_reply(reply)?;

            for key in batch {
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }

            if next == "0" {
                break;
            }
            cursor = next;
        }

        self.pool.release(conn);
        Ok(keys)
    }

    /// `MGET` for all keys in one round trip, nil values as `None`
    pub async fn fetch_values(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        let mut args = Vec::with_capacity(keys.len() + 1);
        args.push("MGET");
        args.extend(keys.iter().map(String::as_str));

        let mut conn = self.pool.acquire().await?;
        let reply = conn.execute(&args).await?;
        self.pool.release(conn);

        let values = reply.into_array("MGET")?;
        if values.len() != keys.len() {
            return Err(QueryError::ReplyMismatch {
                command: "MGET".to_string(),
                expected: keys.len(),
                actual: values.len(),
            }
            .into());
        }

        let mut fetched = Vec::with_capacity(values.len());
        for value in values {
            fetched.push(value.into_optional_text("MGET")?);
        }
        Ok(fetched)
    }
}

/// `[cursor, [key, ...]]`
fn parse_scan_reply(reply: RespValue) -> std::result::Result<(String, Vec<String>), QueryError> {
    let mut parts = reply.into_array("SCAN")?;
    if parts.len() != 2 {
        return Err(QueryError::UnexpectedReply {
            command: "SCAN".to_string(),
            reply: format!("array({})", parts.len()),
        });
    }

    let batch = parts.pop().map(|v| v.into_array("SCAN")).transpose()?.unwrap_or_default();
    let cursor = parts.pop().map(|v| v.into_text("SCAN")).transpose()?.unwrap_or_default();

    let keys = batch
        .into_iter()
        .map(|v| v.into_utf8_text("SCAN"))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok((cursor, keys))
}
