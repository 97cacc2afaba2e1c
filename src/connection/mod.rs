// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connections to a main repeater.
//!
//! A [`Connection`] logs in, enables monitoring and then keeps every device
//! handle it has given out in sync with what the repeater reports.
//!
//! ```no_run
//! use radiora_lib::Connection;
//!
//! # async fn example() -> radiora_lib::Result<()> {
//! let conn = Connection::connect("192.168.1.20", "lutron", "integration").await?;
//!
//! let mut changes = conn.monitor_dimmers();
//! while let Some(change) = changes.recv().await {
//!     println!("dimmer {} is at {}", change.dimmer.id(), change.level);
//! }
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "tcp")]
mod builder;
mod config;
mod controller;
mod outbox;
mod registry;

#[cfg(feature = "tcp")]
pub use builder::ConnectionBuilder;
pub use config::{ConnectionConfig, ReconnectionPolicy};

pub(crate) use outbox::{LineQueue, Outbox};
pub(crate) use registry::Registry;

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::device::{Dimmer, HybridKeypad, Keypad, LevelChange, Switch};
use crate::error::Error;
use crate::protocol::Connector;

use controller::{Controller, establish};

/// Link state of a [`Connection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Logged in and monitoring.
    Connected,
    /// The session broke and the repeater is being redialed.
    Reconnecting {
        /// Redial attempt, starting at 1.
        attempt: u32,
    },
    /// The connection is over; every operation resolves as unknown.
    Disconnected,
}

impl ConnectionState {
    /// Returns true if the connection is logged in.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// A live connection to a main repeater.
///
/// Clones share the connection. It is closed by [`close`](Self::close) or
/// when the last clone is dropped; device handles outlive it but every
/// operation on them then resolves as unknown.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    registry: Arc<Registry>,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    _close_on_drop: DropGuard,
}

impl Connection {
    /// Connects to a repeater over telnet on the default port.
    ///
    /// # Errors
    ///
    /// Returns error if the repeater cannot be reached, rejects the login,
    /// or the session breaks while monitoring is enabled.
    #[cfg(feature = "tcp")]
    pub async fn connect(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, Error> {
        Self::builder(host)
            .with_credentials(username, password)
            .connect()
            .await
    }

    /// Starts configuring a telnet connection.
    #[cfg(feature = "tcp")]
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConnectionBuilder {
        ConnectionBuilder::new(host)
    }

    /// Connects through any transport.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if the connector fails or the session breaks while
    /// monitoring is enabled.
    pub async fn with_connector<C: Connector>(
        connector: C,
        config: ConnectionConfig,
    ) -> Result<Self, Error> {
        let session = establish(&connector, &[]).await?;

        let (outbox, requests) = Outbox::new(config.effective_queue_capacity());
        let registry = Arc::new(Registry::new(outbox, Handle::current()));
        let (state_tx, state) = watch::channel(ConnectionState::Connected);
        let cancel = CancellationToken::new();

        let controller = Controller::new(
            connector,
            config.reconnection,
            Arc::clone(&registry),
            requests,
            state_tx,
            cancel.clone(),
        );
        tokio::spawn(controller.run(session));
        tracing::info!("Connected to repeater");

        Ok(Self {
            inner: Arc::new(ConnectionInner {
                registry,
                state,
                _close_on_drop: cancel.clone().drop_guard(),
                cancel,
            }),
        })
    }

    /// Returns the dimmer with the given integration id.
    #[must_use]
    pub fn dimmer(&self, id: u32) -> Dimmer {
        self.inner.registry.dimmer(id)
    }

    /// Returns the switched output with the given integration id.
    #[must_use]
    pub fn switch(&self, id: u32) -> Switch {
        Switch::new(self.dimmer(id))
    }

    /// Returns the keypad with the given integration id.
    #[must_use]
    pub fn keypad(&self, id: u32) -> Keypad {
        self.inner.registry.keypad(id)
    }

    /// Returns the hybrid keypad with the given integration id.
    #[must_use]
    pub fn hybrid_keypad(&self, id: u32) -> HybridKeypad {
        HybridKeypad::new(self.dimmer(id), self.keypad(id))
    }

    /// Delivers the level changes of every dimmer, including dimmers
    /// created later, into `sink`.
    pub fn add_dimmer_monitor(&self, sink: mpsc::UnboundedSender<LevelChange>) {
        self.inner.registry.add_dimmer_monitor(sink);
    }

    /// Streams the level changes of every dimmer.
    #[must_use]
    pub fn monitor_dimmers(&self) -> mpsc::UnboundedReceiver<LevelChange> {
        let (sink, changes) = mpsc::unbounded_channel();
        self.add_dimmer_monitor(sink);
        changes
    }

    /// Returns the current link state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.state.borrow().clone()
    }

    /// Watches the link state.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.clone()
    }

    /// Closes the connection and waits until every pending operation has
    /// been resolved.
    pub async fn close(&self) {
        self.inner.cancel.cancel();
        let mut state = self.inner.state.clone();
        // An error means the controller is already gone.
        let _ = state
            .wait_for(|state| *state == ConnectionState::Disconnected)
            .await;
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}
