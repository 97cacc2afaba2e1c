// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Telnet connection builder.

use std::time::Duration;

use crate::connection::{Connection, ConnectionConfig, ReconnectionPolicy};
use crate::error::Error;
use crate::protocol::{TelnetConfig, TelnetConnector};

/// Builder for telnet connections.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use radiora_lib::{Connection, ReconnectionPolicy};
///
/// # async fn example() -> radiora_lib::Result<()> {
/// let conn = Connection::builder("192.168.1.20")
///     .with_credentials("lutron", "integration")
///     .with_timeout(Duration::from_secs(10))
///     .with_reconnection(ReconnectionPolicy::new().with_max_retries(20))
///     .connect()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionBuilder {
    telnet: TelnetConfig,
    config: ConnectionConfig,
}

impl ConnectionBuilder {
    pub(crate) fn new(host: impl Into<String>) -> Self {
        Self {
            telnet: TelnetConfig::new(host),
            config: ConnectionConfig::default(),
        }
    }

    /// Sets the telnet port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.telnet = self.telnet.with_port(port);
        self
    }

    /// Sets the integration login.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.telnet = self.telnet.with_credentials(username, password);
        self
    }

    /// Sets the connect, login and write deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.telnet = self.telnet.with_timeout(timeout);
        self
    }

    /// Sets the outbound queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.config = self.config.with_queue_capacity(capacity);
        self
    }

    /// Sets the reconnection policy.
    #[must_use]
    pub fn with_reconnection(mut self, policy: ReconnectionPolicy) -> Self {
        self.config = self.config.with_reconnection(policy);
        self
    }

    /// Returns the telnet settings.
    #[must_use]
    pub fn telnet_config(&self) -> &TelnetConfig {
        &self.telnet
    }

    /// Connects and logs in.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The host is empty or unreachable
    /// - The repeater rejects the login
    /// - Any step exceeds the timeout
    pub async fn connect(self) -> Result<Connection, Error> {
        tracing::debug!(host = %self.telnet.host, port = self.telnet.port, "Connecting");
        Connection::with_connector(TelnetConnector::new(self.telnet), self.config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_settings() {
        let builder = ConnectionBuilder::new("repeater.local")
            .with_port(2323)
            .with_credentials("admin", "secret")
            .with_timeout(Duration::from_secs(5))
            .with_queue_capacity(10);

        let telnet = builder.telnet_config();
        assert_eq!(telnet.port, 2323);
        assert_eq!(telnet.username, "admin");
        assert_eq!(telnet.timeout, Duration::from_secs(5));
        assert_eq!(builder.config.queue_capacity, 10);
        assert!(!builder.config.reconnection.enabled);
    }

    #[tokio::test]
    async fn empty_host_fails_to_connect() {
        let result = ConnectionBuilder::new("").connect().await;
        assert!(matches!(result, Err(Error::Protocol(_))));
    }
}
