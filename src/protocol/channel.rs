// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory transport.
//!
//! A [`ChannelConnector`] hands out sessions offered through its paired
//! [`ChannelRepeater`]. The far end of each session is a
//! [`RemoteSession`], which sees every line the driver writes and can
//! inject events or a link failure. Use it to run the driver over a link
//! this crate does not know about, or to script a repeater in tests.
//!
//! # Examples
//!
//! ```
//! use radiora_lib::protocol::ChannelConnector;
//! use radiora_lib::{Connection, ConnectionConfig};
//!
//! # async fn example() -> radiora_lib::Result<()> {
//! let (connector, repeater) = ChannelConnector::new();
//! let mut remote = repeater.accept();
//! let conn = Connection::with_connector(connector, ConnectionConfig::default()).await?;
//!
//! let _level = conn.dimmer(8).level().await;
//! remote.send("~OUTPUT,8,1,40.00");
//! # Ok(())
//! # }
//! ```

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::ProtocolError;
use crate::protocol::{Connector, LineReader, LineWriter};

type Inbound = Result<String, ProtocolError>;

/// Creates a connected reader/writer pair and its far end.
#[must_use]
pub fn channel_session() -> (ChannelReader, ChannelWriter, RemoteSession) {
    let (to_client, inbound) = mpsc::unbounded_channel();
    let (outbound, from_client) = mpsc::unbounded_channel();
    (
        ChannelReader { rx: inbound },
        ChannelWriter { tx: outbound },
        RemoteSession {
            to_client,
            from_client,
        },
    )
}

/// Inbound half of an in-memory session.
#[derive(Debug)]
pub struct ChannelReader {
    rx: mpsc::UnboundedReceiver<Inbound>,
}

impl LineReader for ChannelReader {
    async fn read_line(&mut self) -> Result<String, ProtocolError> {
        match self.rx.recv().await {
            Some(line) => line,
            None => Err(ProtocolError::ChannelClosed(
                "remote session dropped".to_string(),
            )),
        }
    }
}

/// Outbound half of an in-memory session.
#[derive(Debug)]
pub struct ChannelWriter {
    tx: mpsc::UnboundedSender<String>,
}

impl LineWriter for ChannelWriter {
    async fn write_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        self.tx
            .send(line.to_string())
            .map_err(|_| ProtocolError::ChannelClosed("remote session dropped".to_string()))
    }
}

/// The repeater side of an in-memory session.
///
/// Dropping it ends the session with a read failure on the driver side.
#[derive(Debug)]
pub struct RemoteSession {
    to_client: mpsc::UnboundedSender<Inbound>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl RemoteSession {
    /// Delivers a line to the driver as if the repeater had sent it.
    pub fn send(&self, line: impl Into<String>) {
        let _ = self.to_client.send(Ok(line.into()));
    }

    /// Breaks the session with the given reason.
    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self
            .to_client
            .send(Err(ProtocolError::ConnectionFailed(reason.into())));
    }

    /// Waits for the next line written by the driver.
    ///
    /// Returns `None` once the driver has dropped its writer.
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Returns the next line already written by the driver, if any.
    pub fn try_recv(&mut self) -> Option<String> {
        self.from_client.try_recv().ok()
    }
}

/// [`Connector`] handing out sessions offered by a [`ChannelRepeater`].
#[derive(Debug)]
pub struct ChannelConnector {
    sessions: Mutex<mpsc::UnboundedReceiver<(ChannelReader, ChannelWriter)>>,
}

impl ChannelConnector {
    /// Creates a connector and the repeater handle that feeds it.
    #[must_use]
    pub fn new() -> (Self, ChannelRepeater) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                sessions: Mutex::new(rx),
            },
            ChannelRepeater { sessions: tx },
        )
    }
}

impl Connector for ChannelConnector {
    type Reader = ChannelReader;
    type Writer = ChannelWriter;

    async fn connect(&self) -> Result<(ChannelReader, ChannelWriter), ProtocolError> {
        let next = self.sessions.lock().try_recv();
        next.map_err(|_| ProtocolError::ConnectionFailed("no session offered".to_string()))
    }
}

/// Offers sessions to a [`ChannelConnector`].
#[derive(Debug, Clone)]
pub struct ChannelRepeater {
    sessions: mpsc::UnboundedSender<(ChannelReader, ChannelWriter)>,
}

impl ChannelRepeater {
    /// Queues a session for the connector's next `connect` and returns its
    /// repeater side.
    #[must_use]
    pub fn accept(&self) -> RemoteSession {
        let (reader, writer, remote) = channel_session();
        let _ = self.sessions.send((reader, writer));
        remote
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lines_flow_both_ways() {
        let (mut reader, mut writer, mut remote) = channel_session();

        writer.write_line("?OUTPUT,8,1").await.unwrap();
        assert_eq!(remote.recv().await.as_deref(), Some("?OUTPUT,8,1"));

        remote.send("~OUTPUT,8,1,0.00");
        assert_eq!(reader.read_line().await.unwrap(), "~OUTPUT,8,1,0.00");
    }

    #[tokio::test]
    async fn fail_and_drop_end_the_session() {
        let (mut reader, mut writer, remote) = channel_session();

        remote.fail("cable pulled");
        assert!(matches!(
            reader.read_line().await,
            Err(ProtocolError::ConnectionFailed(_))
        ));

        drop(remote);
        assert!(reader.read_line().await.is_err());
        assert!(writer.write_line("#OUTPUT,8,1,0").await.is_err());
    }

    #[tokio::test]
    async fn connector_uses_offered_sessions_in_order() {
        let (connector, repeater) = ChannelConnector::new();
        assert!(connector.connect().await.is_err());

        let mut first = repeater.accept();
        let _second = repeater.accept();

        let (_reader, mut writer) = connector.connect().await.unwrap();
        writer.write_line("#MONITORING,5,1").await.unwrap();
        assert_eq!(first.try_recv().as_deref(), Some("#MONITORING,5,1"));

        assert!(connector.connect().await.is_ok());
        assert!(connector.connect().await.is_err());
    }
}
