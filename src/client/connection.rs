use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use super::resp::{RespParser, RespValue};
use crate::config::CollectorConfig;
use crate::error::{CollectorError, ConnectionError, Result};

trait Stream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Stream for T {}

/// Where and how to dial
#[derive(Clone)]
pub struct ConnectSettings {
    pub network: String,
    pub address: String,
    pub secret: Option<String>,
    pub timeout: Duration,
}

impl ConnectSettings {
    pub fn from_config(config: &CollectorConfig) -> Self {
        ConnectSettings {
            network: config.network.clone(),
            address: config.address(),
            secret: config.auth.secret().map(str::to_string),
            timeout: config.timeout,
        }
    }
}

/// A single link to the server. Never shared: one request at a time.
pub struct Connection {
    stream: Box<dyn Stream>,
    buffer: BytesMut,
    timeout: Duration,
    peer: String,
}

impl Connection {
    /// Open a stream to the configured address
    pub async fn dial(settings: &ConnectSettings) -> Result<Self> {
        let stream = tokio::time::timeout(settings.timeout, Self::open(settings))
            .await
            .map_err(|_| ConnectionError::Timeout(settings.timeout))??;

        debug!("Connected to {} over {}", settings.address, settings.network);

        Ok(Connection {
            stream,
            buffer: BytesMut::with_capacity(16 * 1024),
            timeout: settings.timeout,
            peer: settings.address.clone(),
        })
    }

    async fn open(settings: &ConnectSettings) -> Result<Box<dyn Stream>> {
        let dial_err = |source| ConnectionError::Dial {
            addr: settings.address.clone(),
            source,
        };

        match settings.network.as_str() {
            "tcp" | "tcp4" | "tcp6" => {
                let want_v4 = settings.network == "tcp4";
                let want_v6 = settings.network == "tcp6";
                let mut last_err = None;

                for addr in tokio::net::lookup_host(&settings.address)
                    .await
                    .map_err(dial_err)?
                {
                    if (want_v4 && !addr.is_ipv4()) || (want_v6 && !addr.is_ipv6()) {
                        continue;
                    }
                    match TcpStream::connect(addr).await {
                        Ok(stream) => {
                            stream.set_nodelay(true).map_err(dial_err)?;
                            return Ok(Box::new(stream));
                        }
                        Err(e) => last_err = Some(e),
                    }
                }

                let source = last_err.unwrap_or_else(|| {
                    std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("no {} address found", settings.network),
                    )
                });
                Err(dial_err(source).into())
            }
            #[cfg(unix)]
            "unix" => {
                let stream = tokio::net::UnixStream::connect(&settings.address)
                    .await
                    .map_err(dial_err)?;
                Ok(Box::new(stream))
            }
            other => Err(ConnectionError::UnsupportedNetwork(other.to_string()).into()),
        }
    }

    /// Send `AUTH <secret>`; anything but +OK is a failed handshake
    pub async fn authenticate(&mut self, secret: &str) -> Result<()> {
        match self.execute(&["AUTH", secret]).await? {
            RespValue::SimpleString(s) if s == "OK" => {
                debug!("AUTH OK on {}", self.peer);
                Ok(())
            }
            RespValue::Error(e) => Err(ConnectionError::Auth(e).into()),
            other => Err(ConnectionError::Auth(format!("unexpected reply {}", other.summary())).into()),
        }
    }

    /// One request/response round trip, bounded by the configured timeout
    pub async fn execute(&mut self, args: &[&str]) -> Result<RespValue> {
        let timeout = self.timeout;
        tokio::time::timeout(timeout, self.round_trip(args))
            .await
            .map_err(|_| CollectorError::from(ConnectionError::Timeout(timeout)))?
    }

    async fn round_trip(&mut self, args: &[&str]) -> Result<RespValue> {
        let request = RespParser::encode_command(args);
        self.stream
            .write_all(&request)
            .await
            .map_err(ConnectionError::Io)?;
        self.stream.flush().await.map_err(ConnectionError::Io)?;
        self.read_reply().await
    }

    async fn read_reply(&mut self) -> Result<RespValue> {
        loop {
            if let Some((value, consumed)) = RespParser::parse(&self.buffer)? {
                let _ = self.buffer.split_to(consumed);
                return Ok(value);
            }

            let n = self
                .stream
                .read_buf(&mut self.buffer)
                .await
                .map_err(ConnectionError::Io)?;
            if n == 0 {
                return Err(ConnectionError::Closed.into());
            }
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }
}
