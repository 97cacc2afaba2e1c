// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! TCP transport with the main repeater's telnet login.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::error::ProtocolError;
use crate::protocol::{Connector, LineReader, LineWriter};

/// Command prompt printed by the repeater after login and after each line
/// until it is disabled.
const PROMPT: &str = "GNET> ";
const LOGIN_PROMPT: &str = "login: ";
const PASSWORD_PROMPT: &str = "ssword: ";

/// Turns off the `GNET>` prompt for the rest of the session.
const DISABLE_PROMPT: &str = "#MONITORING,12,2";

/// Repeater login settings.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use radiora_lib::protocol::TelnetConfig;
///
/// let config = TelnetConfig::new("192.168.1.20")
///     .with_credentials("lutron", "integration")
///     .with_timeout(Duration::from_secs(10));
///
/// assert_eq!(config.port, 23);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelnetConfig {
    /// Repeater host name or IP address.
    pub host: String,
    /// Telnet port (default 23).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Integration login user.
    #[serde(default = "default_username")]
    pub username: String,
    /// Integration login password.
    #[serde(default = "default_password")]
    pub password: String,
    /// Deadline for connecting, each login step and each write.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

fn default_port() -> u16 {
    23
}

fn default_username() -> String {
    "lutron".to_string()
}

fn default_password() -> String {
    "integration".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(40)
}

impl TelnetConfig {
    /// Creates a configuration with the factory integration credentials.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            username: default_username(),
            password: default_password(),
            timeout: default_timeout(),
        }
    }

    /// Sets the telnet port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the integration login.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Sets the connect, login and write deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`Connector`] that dials the repeater over TCP and logs in.
#[derive(Debug, Clone)]
pub struct TelnetConnector {
    config: TelnetConfig,
}

impl TelnetConnector {
    /// Creates a connector for the given repeater.
    #[must_use]
    pub fn new(config: TelnetConfig) -> Self {
        Self { config }
    }

    /// Returns the repeater settings.
    #[must_use]
    pub fn config(&self) -> &TelnetConfig {
        &self.config
    }
}

impl Connector for TelnetConnector {
    type Reader = TelnetReader;
    type Writer = TelnetWriter;

    async fn connect(&self) -> Result<(TelnetReader, TelnetWriter), ProtocolError> {
        let config = &self.config;
        if config.host.is_empty() {
            return Err(ProtocolError::InvalidAddress("host is required".to_string()));
        }

        tracing::debug!(host = %config.host, port = config.port, "Dialing repeater");
        let stream = with_timeout(
            config.timeout,
            TcpStream::connect((config.host.as_str(), config.port)),
        )
        .await?;
        stream.set_nodelay(true)?;

        let (read, write) = stream.into_split();
        let mut reader = TelnetReader {
            inner: BufReader::new(read),
            timeout: config.timeout,
        };
        let mut writer = TelnetWriter {
            inner: write,
            timeout: config.timeout,
        };

        login(&mut reader, &mut writer, config).await?;
        tracing::info!(host = %config.host, "Logged in to repeater");
        Ok((reader, writer))
    }
}

async fn login(
    reader: &mut TelnetReader,
    writer: &mut TelnetWriter,
    config: &TelnetConfig,
) -> Result<(), ProtocolError> {
    reader.expect(&[LOGIN_PROMPT]).await?;
    writer.write_line(&config.username).await?;
    reader.expect(&[PASSWORD_PROMPT]).await?;
    writer.write_line(&config.password).await?;

    // A rejected login goes straight back to the login prompt.
    if reader.expect(&[PROMPT, LOGIN_PROMPT]).await? != 0 {
        return Err(ProtocolError::AuthenticationFailed);
    }
    writer.write_line(DISABLE_PROMPT).await
}

/// Inbound half of a telnet session.
#[derive(Debug)]
pub struct TelnetReader {
    inner: BufReader<OwnedReadHalf>,
    timeout: Duration,
}

impl TelnetReader {
    /// Skips input until one of `prompts` has been read, returning its
    /// index.
    async fn expect(&mut self, prompts: &[&str]) -> Result<usize, ProtocolError> {
        let inner = &mut self.inner;
        let scan = async move {
            let mut seen = Vec::new();
            loop {
                seen.push(inner.read_u8().await?);
                if let Some(i) = prompts.iter().position(|p| seen.ends_with(p.as_bytes())) {
                    return Ok::<_, std::io::Error>(i);
                }
                if seen.len() > 512 {
                    seen.drain(..256);
                }
            }
        };
        with_timeout(self.timeout, scan).await
    }
}

impl LineReader for TelnetReader {
    async fn read_line(&mut self) -> Result<String, ProtocolError> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if self.inner.read_until(b'\n', &mut buf).await? == 0 {
                return Err(ProtocolError::ConnectionFailed(
                    "repeater closed the connection".to_string(),
                ));
            }
            let line = String::from_utf8_lossy(&buf).replace(PROMPT, "");
            let line = line.trim();
            if !line.is_empty() {
                return Ok(line.to_string());
            }
        }
    }
}

/// Outbound half of a telnet session.
#[derive(Debug)]
pub struct TelnetWriter {
    inner: OwnedWriteHalf,
    timeout: Duration,
}

impl LineWriter for TelnetWriter {
    async fn write_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        let mut buf = Vec::with_capacity(line.len() + 2);
        buf.extend_from_slice(line.as_bytes());
        buf.extend_from_slice(b"\r\n");
        with_timeout(self.timeout, self.inner.write_all(&buf)).await
    }
}

async fn with_timeout<T>(
    limit: Duration,
    operation: impl Future<Output = std::io::Result<T>>,
) -> Result<T, ProtocolError> {
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result.map_err(ProtocolError::from),
        Err(_) => Err(ProtocolError::Timeout(
            u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        )),
    }
}
