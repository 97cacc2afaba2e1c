// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration protocol encoding and the transports that carry it.
//!
//! The main repeater speaks a line-oriented text protocol:
//!
//! - Commands: `#<CATEGORY>,<id>,<args>`
//! - Queries: `?<CATEGORY>,<id>,<args>`
//! - Events: `~<CATEGORY>,<id>,<args>`
//!
//! The connection controller only needs a way to read terminated lines and
//! write terminated lines; anything implementing [`LineReader`],
//! [`LineWriter`] and [`Connector`] can carry a session.
//!
//! # Transports
//!
//! - [`TelnetConnector`]: TCP session with the repeater's login handshake
//!   (requires the `tcp` feature)
//! - [`ChannelConnector`]: in-memory session, for bridging other links and
//!   for tests

mod channel;
mod command;
mod event;
#[cfg(feature = "tcp")]
mod telnet;

pub use channel::{
    ChannelConnector, ChannelReader, ChannelRepeater, ChannelWriter, RemoteSession, channel_session,
};
pub use command::{Category, Command, Operation, SESSION_SETUP};
pub use event::{Event, parse_event};
#[cfg(feature = "tcp")]
pub use telnet::{TelnetConfig, TelnetConnector, TelnetReader, TelnetWriter};

use std::future::Future;

use crate::error::ProtocolError;

/// Inbound half of a repeater session.
pub trait LineReader: Send + 'static {
    /// Returns the next non-empty line with its terminator removed.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` once the link has failed; the session is
    /// over after the first error.
    fn read_line(&mut self) -> impl Future<Output = Result<String, ProtocolError>> + Send;
}

/// Outbound half of a repeater session.
pub trait LineWriter: Send + 'static {
    /// Writes one line, adding the terminator.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the link has failed.
    fn write_line(&mut self, line: &str) -> impl Future<Output = Result<(), ProtocolError>> + Send;
}

/// Establishes logged-in repeater sessions.
///
/// The connection calls [`connect`](Connector::connect) once when it is
/// created and again for every redial allowed by its
/// [`ReconnectionPolicy`](crate::ReconnectionPolicy).
pub trait Connector: Send + Sync + 'static {
    /// Inbound half produced by this connector.
    type Reader: LineReader;
    /// Outbound half produced by this connector.
    type Writer: LineWriter;

    /// Opens a session that is ready to accept integration commands.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the link or the login fails.
    fn connect(
        &self,
    ) -> impl Future<Output = Result<(Self::Reader, Self::Writer), ProtocolError>> + Send;
}
