//! In-process fake Redis for integration tests
//!
//! Speaks just enough RESP for the collector: AUTH, INFO, SCAN, MGET, PING.
//! State is shared behind a mutex so tests can change it while a collector
//! is running against it.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use parking_lot::Mutex;
use redis_telemetry::{CollectorConfig, RespParser, RespValue, StatCategory};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Default)]
pub struct FakeState {
    /// INFO body per section name
    pub sections: HashMap<String, String>,
    /// String keys
    pub strings: BTreeMap<String, String>,
    /// Keys that exist but hold a non-string type (MGET answers nil)
    pub other_keys: HashSet<String>,
    /// Binary key names, returned by SCAN as-is
    pub raw_keys: Vec<Vec<u8>>,
    pub password: Option<String>,
    pub failing_sections: HashSet<String>,
    pub fail_scan: bool,
    /// Drop the last MGET value to simulate a reordering/short reply
    pub truncate_mget: bool,
    /// Keys per SCAN page
    pub scan_page: usize,
    /// Sleep before answering each command
    pub delay: Duration,
    /// Every command received, by name
    pub commands: Vec<String>,
}

pub struct FakeRedis {
    /// TCP address, or the socket path for `start_unix`
    pub addr: Option<SocketAddr>,
    pub socket_path: Option<PathBuf>,
    pub state: Arc<Mutex<FakeState>>,
    pub connections: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl FakeRedis {
    pub async fn start() -> Self {
        Self::start_with(FakeState {
            sections: default_sections(),
            scan_page: 2,
            ..FakeState::default()
        })
        .await
    }

    pub async fn start_with(state: FakeState) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(state));
        let connections = Arc::new(AtomicUsize::new(0));

        let task = {
            let state = state.clone();
            let connections = connections.clone();
            tokio::spawn(async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        break;
                    };
                    connections.fetch_add(1, Ordering::SeqCst);
                    let state = state.clone();
                    tokio::spawn(handle_connection(stream, state));
                }
            })
        };

        FakeRedis {
            addr: Some(addr),
            socket_path: None,
            state,
            connections,
            task,
        }
    }

    /// Same server behind a Unix domain socket at `path`
    #[cfg(unix)]
    pub async fn start_unix(path: &Path) -> Self {
        let listener = tokio::net::UnixListener::bind(path).unwrap();
        let state = Arc::new(Mutex::new(FakeState {
            sections: default_sections(),
            scan_page: 2,
            ..FakeState::default()
        }));
        let connections = Arc::new(AtomicUsize::new(0));

        let task = {
            let state = state.clone();
            let connections = connections.clone();
            tokio::spawn(async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        break;
                    };
                    connections.fetch_add(1, Ordering::SeqCst);
                    let state = state.clone();
                    tokio::spawn(handle_connection(stream, state));
                }
            })
        };

        FakeRedis {
            addr: None,
            socket_path: Some(path.to_path_buf()),
            state,
            connections,
            task,
        }
    }

    /// Defaults pointed at this server, with a short period for tests
    pub fn config(&self) -> CollectorConfig {
        let base = CollectorConfig {
            period: Duration::from_secs(1),
            timeout: Duration::from_secs(2),
            ..CollectorConfig::default()
        };
        match (&self.addr, &self.socket_path) {
            (Some(addr), _) => CollectorConfig {
                host: addr.ip().to_string(),
                port: addr.port(),
                ..base
            },
            (None, Some(path)) => CollectorConfig {
                host: path.to_string_lossy().into_owned(),
                network: "unix".to_string(),
                ..base
            },
            (None, None) => base,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().commands.clone()
    }

    pub fn set_string(&self, key: &str, value: &str) {
        self.state
            .lock()
            .strings
            .insert(key.to_string(), value.to_string());
    }
}

impl Drop for FakeRedis {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn default_sections() -> HashMap<String, String> {
    let mut sections = HashMap::new();
    for category in StatCategory::ALL {
        let body = match category {
            StatCategory::Server => {
                "# Server\r\nredis_version:7.2.4\r\nredis_mode:standalone\r\ntcp_port:6379\r\n"
            }
            StatCategory::Clients => "# Clients\r\nconnected_clients:3\r\nblocked_clients:0\r\n",
            StatCategory::Memory => "# Memory\r\nused_memory:1048576\r\nused_memory_human:1.00M\r\n",
            StatCategory::Persistence => "# Persistence\r\nloading:0\r\nrdb_changes_since_last_save:4\r\n",
            StatCategory::Stats => "# Stats\r\ntotal_connections_received:12\r\ntotal_commands_processed:99\r\n",
            StatCategory::Replication => "# Replication\r\nrole:master\r\nconnected_slaves:0\r\n",
            StatCategory::Cpu => "# CPU\r\nused_cpu_sys:0.50\r\nused_cpu_user:1.25\r\n",
            StatCategory::Commandstats => {
                "# Commandstats\r\ncmdstat_info:calls=10,usec=100,usec_per_call=10.00\r\n"
            }
            StatCategory::Cluster => "# Cluster\r\ncluster_enabled:0\r\n",
            StatCategory::Keyspace => "# Keyspace\r\ndb0:keys=2,expires=0,avg_ttl=0\r\n",
        };
        sections.insert(category.as_str().to_string(), body.to_string());
    }
    sections
}

async fn handle_connection<S>(mut stream: S, state: Arc<Mutex<FakeState>>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buffer = BytesMut::with_capacity(4096);
    let mut authed = false;

    loop {
        let request = loop {
            match RespParser::parse(&buffer) {
                Ok(Some((value, consumed))) => {
                    let _ = buffer.split_to(consumed);
                    break value;
                }
                Ok(None) => match stream.read_buf(&mut buffer).await {
                    Ok(0) | Err(_) => return,
                    Ok(_) => {}
                },
                Err(_) => return,
            }
        };

        let args = request_args(request);
        let delay = state.lock().delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let reply = respond(&args, &state, &mut authed);
        if stream.write_all(&RespParser::encode(&reply)).await.is_err() {
            return;
        }
    }
}

fn request_args(request: RespValue) -> Vec<String> {
    match request {
        RespValue::Array(Some(parts)) => parts
            .into_iter()
            .filter_map(|p| match p {
                RespValue::BulkString(Some(data)) => Some(String::from_utf8_lossy(&data).into_owned()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn respond(args: &[String], state: &Mutex<FakeState>, authed: &mut bool) -> RespValue {
    let mut state = state.lock();
    let Some(name) = args.first().map(|s| s.to_ascii_uppercase()) else {
        return RespValue::Error("ERR empty command".to_string());
    };
    state.commands.push(name.clone());

    if name == "AUTH" {
        return match (&state.password, args.get(1)) {
            (Some(expected), Some(given)) if expected == given => {
                *authed = true;
                RespValue::SimpleString("OK".to_string())
            }
            (None, _) => RespValue::Error(
                "ERR AUTH <password> called without any password configured".to_string(),
            ),
            _ => RespValue::Error("WRONGPASS invalid username-password pair".to_string()),
        };
    }

    if state.password.is_some() && !*authed {
        return RespValue::Error("NOAUTH Authentication required.".to_string());
    }

    match name.as_str() {
        "PING" => RespValue::SimpleString("PONG".to_string()),
        "INFO" => {
            let section = args.get(1).map(|s| s.to_ascii_lowercase()).unwrap_or_default();
            if state.failing_sections.contains(&section) {
                return RespValue::Error(format!("ERR injected failure for {}", section));
            }
            let body = state.sections.get(&section).cloned().unwrap_or_default();
            bulk(&body)
        }
        "SCAN" => {
            if state.fail_scan {
                return RespValue::Error("ERR injected SCAN failure".to_string());
            }
            let cursor: usize = args.get(1).and_then(|c| c.parse().ok()).unwrap_or(0);
            let pattern = option_value(args, "MATCH").unwrap_or("*");

            let mut all: Vec<&[u8]> = state
                .strings
                .keys()
                .chain(state.other_keys.iter())
                .map(|k| k.as_bytes())
                .chain(state.raw_keys.iter().map(Vec::as_slice))
                .filter(|k| glob_match(pattern, &String::from_utf8_lossy(k)))
                .collect();
            all.sort();

            let page = state.scan_page.max(1);
            let end = (cursor + page).min(all.len());
            let batch = all.get(cursor..end).unwrap_or(&[]);
            let next = if end >= all.len() { 0 } else { end };

            RespValue::Array(Some(vec![
                bulk(&next.to_string()),
                RespValue::Array(Some(
                    batch
                        .iter()
                        .map(|k| RespValue::BulkString(Some(k.to_vec())))
                        .collect(),
                )),
            ]))
        }
        "MGET" => {
            let mut values: Vec<RespValue> = args[1..]
                .iter()
                .map(|k| match state.strings.get(k) {
                    Some(v) => bulk(v),
                    None => RespValue::BulkString(None),
                })
                .collect();
            if state.truncate_mget {
                values.pop();
            }
            RespValue::Array(Some(values))
        }
        other => RespValue::Error(format!("ERR unknown command '{}'", other)),
    }
}

fn bulk(s: &str) -> RespValue {
    RespValue::BulkString(Some(s.as_bytes().to_vec()))
}

fn option_value<'a>(args: &'a [String], option: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a.eq_ignore_ascii_case(option))
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// Glob with `*` and `?`
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let (mut star, mut mark) = (None, 0);

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}
